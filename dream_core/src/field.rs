//! Scalar fields sampled on a regular lattice.
//!
//! A field stores one value per lattice point. Point `(ix, iy, iz)` lives at
//! `min + (max - min) * (i / (n - 1))` per axis, and the flat storage index is
//! `ix + nx * (iy + ny * iz)` (x varies fastest).

use alloc::vec::Vec;

use crate::error::DreamCoreError;
use crate::types::Point3;

/// Read access to a lattice-sampled scalar field.
///
/// Isosurface extraction only needs this trait, so callers can expose their own
/// storage without copying into a [`DenseField`].
pub trait ScalarField {
    /// Number of lattice points along each axis.
    fn resolution(&self) -> [usize; 3];

    /// World-space bounds `(min, max)` covered by the lattice.
    fn bounds(&self) -> (Point3, Point3);

    /// Field value at a lattice point.
    fn value(&self, ix: usize, iy: usize, iz: usize) -> f32;

    /// World-space position of a lattice point.
    #[inline]
    fn position(&self, ix: usize, iy: usize, iz: usize) -> Point3 {
        let [nx, ny, nz] = self.resolution();
        let (min, max) = self.bounds();
        let step = |i: usize, n: usize| if n > 1 { i as f32 / (n - 1) as f32 } else { 0.0 };
        Point3::new(
            min.x + (max.x - min.x) * step(ix, nx),
            min.y + (max.y - min.y) * step(iy, ny),
            min.z + (max.z - min.z) * step(iz, nz),
        )
    }
}

/// A field that owns its samples.
#[derive(Debug, Clone, PartialEq)]
pub struct DenseField {
    resolution: [usize; 3],
    min: Point3,
    max: Point3,
    values: Vec<f32>,
}

impl DenseField {
    /// Wrap existing samples, stored x-fastest.
    pub fn new(
        resolution: [usize; 3],
        min: Point3,
        max: Point3,
        values: Vec<f32>,
    ) -> Result<Self, DreamCoreError> {
        Self::check_layout(resolution, min, max)?;
        let expected = resolution[0] * resolution[1] * resolution[2];
        if values.len() != expected {
            return Err(DreamCoreError::SampleCountMismatch {
                expected,
                got: values.len(),
            });
        }
        Ok(Self {
            resolution,
            min,
            max,
            values,
        })
    }

    /// Sample a function at every lattice point.
    pub fn from_fn<F>(
        resolution: [usize; 3],
        min: Point3,
        max: Point3,
        mut f: F,
    ) -> Result<Self, DreamCoreError>
    where
        F: FnMut(Point3) -> f32,
    {
        Self::check_layout(resolution, min, max)?;
        let mut field = Self {
            resolution,
            min,
            max,
            values: Vec::with_capacity(resolution[0] * resolution[1] * resolution[2]),
        };
        for iz in 0..resolution[2] {
            for iy in 0..resolution[1] {
                for ix in 0..resolution[0] {
                    let p = field.position(ix, iy, iz);
                    field.values.push(f(p));
                }
            }
        }
        Ok(field)
    }

    fn check_layout(resolution: [usize; 3], min: Point3, max: Point3) -> Result<(), DreamCoreError> {
        let smallest = resolution.iter().copied().min().unwrap_or(0);
        if smallest < 2 {
            return Err(DreamCoreError::ResolutionTooSmall {
                resolution: smallest,
            });
        }
        if !(min.x < max.x && min.y < max.y && min.z < max.z) {
            return Err(DreamCoreError::DegenerateBounds);
        }
        Ok(())
    }

    /// Flat storage index of a lattice point.
    #[inline]
    pub fn index(&self, ix: usize, iy: usize, iz: usize) -> usize {
        ix + self.resolution[0] * (iy + self.resolution[1] * iz)
    }

    /// All samples, x-fastest.
    #[inline]
    pub fn values(&self) -> &[f32] {
        &self.values
    }
}

impl ScalarField for DenseField {
    #[inline]
    fn resolution(&self) -> [usize; 3] {
        self.resolution
    }

    #[inline]
    fn bounds(&self) -> (Point3, Point3) {
        (self.min, self.max)
    }

    #[inline]
    fn value(&self, ix: usize, iy: usize, iz: usize) -> f32 {
        self.values[self.index(ix, iy, iz)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloc::vec;

    #[test]
    fn test_positions_span_bounds() {
        let field =
            DenseField::from_fn([3, 3, 3], Point3::splat(-1.0), Point3::splat(1.0), |p| p.x).unwrap();

        assert_eq!(field.position(0, 0, 0), Point3::splat(-1.0));
        assert_eq!(field.position(2, 2, 2), Point3::splat(1.0));
        assert_eq!(field.position(1, 1, 1), Point3::ZERO);
        assert_eq!(field.value(2, 0, 0), 1.0);
        assert_eq!(field.value(0, 2, 2), -1.0);
    }

    #[test]
    fn test_x_fastest_layout() {
        let field = DenseField::new(
            [2, 2, 2],
            Point3::ZERO,
            Point3::splat(1.0),
            (0..8).map(|i| i as f32).collect(),
        )
        .unwrap();

        assert_eq!(field.value(1, 0, 0), 1.0);
        assert_eq!(field.value(0, 1, 0), 2.0);
        assert_eq!(field.value(0, 0, 1), 4.0);
    }

    #[test]
    fn test_invalid_layouts() {
        let err = DenseField::new([1, 2, 2], Point3::ZERO, Point3::splat(1.0), vec![0.0; 4]);
        assert_eq!(err, Err(DreamCoreError::ResolutionTooSmall { resolution: 1 }));

        let err = DenseField::new([2, 2, 2], Point3::ZERO, Point3::splat(1.0), vec![0.0; 7]);
        assert_eq!(
            err,
            Err(DreamCoreError::SampleCountMismatch { expected: 8, got: 7 })
        );

        let err = DenseField::new([2, 2, 2], Point3::splat(1.0), Point3::ZERO, vec![0.0; 8]);
        assert_eq!(err, Err(DreamCoreError::DegenerateBounds));
    }
}
