//! Comprehensive test suite for dream_core.
//!
//! # Test Categories
//!
//! 1. **Field Layout** - Lattice positions, storage order, custom fields
//! 2. **Isosurface Properties** - Closed, outward, and accurate surfaces
//! 3. **Boundary Conditions** - Surfaces touching the lattice border
//! 4. **Triangle Queries** - Closest points on degenerate input

use dream_core::prelude::*;

// =============================================================================
// Test Helpers
// =============================================================================

/// Field backed by a closure, to check that extraction only needs the trait.
struct AnalyticField<F: Fn(Point3) -> f32> {
    n: usize,
    f: F,
}

impl<F: Fn(Point3) -> f32> ScalarField for AnalyticField<F> {
    fn resolution(&self) -> [usize; 3] {
        [self.n; 3]
    }

    fn bounds(&self) -> (Point3, Point3) {
        (Point3::splat(-1.0), Point3::splat(1.0))
    }

    fn value(&self, ix: usize, iy: usize, iz: usize) -> f32 {
        (self.f)(self.position(ix, iy, iz))
    }
}

fn bounding_box(mesh: &IsoMesh) -> (Point3, Point3) {
    let mut min = Point3::splat(f32::MAX);
    let mut max = Point3::splat(f32::MIN);
    for v in mesh.vertices.iter() {
        min = min.min(*v);
        max = max.max(*v);
    }
    (min, max)
}

// =============================================================================
// 1. Field Layout
// =============================================================================

#[test]
fn dense_field_matches_analytic_field() {
    let f = |p: Point3| p.x * 2.0 - p.y + p.z * p.z;
    let dense = DenseField::from_fn([9, 9, 9], Point3::splat(-1.0), Point3::splat(1.0), f).unwrap();
    let analytic = AnalyticField { n: 9, f };

    for (ix, iy, iz) in [(0, 0, 0), (3, 5, 8), (8, 8, 8), (4, 0, 2)] {
        assert_eq!(dense.value(ix, iy, iz), analytic.value(ix, iy, iz));
    }

    let a = extract_isosurface(&dense, 0.1, Inside::Below);
    let b = extract_isosurface(&analytic, 0.1, Inside::Below);
    assert_eq!(a, b);
}

#[test]
fn anisotropic_resolution() {
    let field = DenseField::from_fn(
        [5, 9, 3],
        Point3::new(0.0, 0.0, 0.0),
        Point3::new(1.0, 2.0, 4.0),
        |p| p.y,
    )
    .unwrap();

    assert_eq!(field.values().len(), 5 * 9 * 3);
    assert_eq!(field.position(4, 8, 2), Point3::new(1.0, 2.0, 4.0));
    assert!((field.value(0, 4, 0) - 1.0).abs() < 1e-6);
}

// =============================================================================
// 2. Isosurface Properties
// =============================================================================

#[test]
fn plane_surface_lies_on_plane() {
    let field = AnalyticField {
        n: 8,
        f: |p: Point3| p.z - 0.1,
    };
    let mesh = extract_isosurface(&field, 0.0, Inside::Below);

    assert!(!mesh.is_empty());
    for v in mesh.vertices.iter() {
        assert!((v.z - 0.1).abs() < 1e-5);
    }

    // Inside is below the plane, so every face points up.
    for t in mesh.triangles.iter() {
        let a = mesh.vertices[t[0] as usize];
        let b = mesh.vertices[t[1] as usize];
        let c = mesh.vertices[t[2] as usize];
        let n = (b - a).cross(c - a);
        assert!(n.z >= 0.0);
    }
}

#[test]
fn vertices_are_shared() {
    let field = AnalyticField {
        n: 12,
        f: |p: Point3| p.length() - 0.6,
    };
    let mesh = extract_isosurface(&field, 0.0, Inside::Below);

    // A closed genus-0 triangle mesh satisfies V - E + F = 2 with E = 3F/2.
    let v = mesh.vertex_count() as i64;
    let f = mesh.triangle_count() as i64;
    assert_eq!(v - 3 * f / 2 + f, 2);
}

#[test]
fn level_selects_shell() {
    let field =
        DenseField::from_fn([21, 21, 21], Point3::splat(-1.0), Point3::splat(1.0), |p| {
            1.0 - p.length()
        })
        .unwrap();

    let (min, max) = bounding_box(&extract_isosurface(&field, 0.5, Inside::Above));
    assert!((max.x - 0.5).abs() < 0.03);
    assert!((min.x + 0.5).abs() < 0.03);

    let (min, max) = bounding_box(&extract_isosurface(&field, 0.25, Inside::Above));
    assert!((max.y - 0.75).abs() < 0.03);
    assert!((min.y + 0.75).abs() < 0.03);
}

// =============================================================================
// 3. Boundary Conditions
// =============================================================================

#[test]
fn surface_clipped_by_lattice_is_open() {
    // A sphere larger than the box leaves a surface only where it crosses.
    let field = AnalyticField {
        n: 10,
        f: |p: Point3| p.length() - 1.2,
    };
    let mesh = extract_isosurface(&field, 0.0, Inside::Below);
    assert!(!mesh.is_empty());
    for v in mesh.vertices.iter() {
        assert!((v.length() - 1.2).abs() < 0.05);
    }
}

#[test]
fn everything_inside_is_empty() {
    let field = AnalyticField {
        n: 4,
        f: |_| 10.0,
    };
    assert!(extract_isosurface(&field, 0.0, Inside::Above).is_empty());
}

// =============================================================================
// 4. Triangle Queries
// =============================================================================

#[test]
fn closest_point_on_degenerate_triangle() {
    let a = Point3::new(0.0, 0.0, 0.0);
    let b = Point3::new(1.0, 0.0, 0.0);
    let hit = closest_point_on_triangle(Point3::new(0.5, 1.0, 0.0), a, b, b);

    assert!(hit.point.y.abs() < 1e-6);
    assert!(hit.point.x >= 0.0 && hit.point.x <= 1.0);
}

#[test]
fn hash_is_stable_for_prompts() {
    let a = fnv1a_64("a dslr photo of a hamburger".as_bytes());
    let b = fnv1a_64("a dslr photo of a hamburger".as_bytes());
    assert_eq!(a, b);
    assert_ne!(fnv1a_64(b"front"), fnv1a_64(b"back"));
}
