//! Point-triangle queries.

use crate::types::Point3;

/// Closest point on a triangle together with its barycentric coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrianglePoint {
    /// Position on the triangle.
    pub point: Point3,
    /// Weights of the three triangle vertices, summing to one.
    pub barycentric: [f32; 3],
}

impl TrianglePoint {
    #[inline]
    fn new(point: Point3, barycentric: [f32; 3]) -> Self {
        Self { point, barycentric }
    }

    /// Blend three per-vertex vectors with the barycentric weights.
    #[inline]
    pub fn blend(&self, n0: Point3, n1: Point3, n2: Point3) -> Point3 {
        let [w0, w1, w2] = self.barycentric;
        n0 * w0 + n1 * w1 + n2 * w2
    }
}

/// Closest point on triangle `abc` to `p`.
///
/// Walks the Voronoi regions of the vertices, then the edges, then the face.
pub fn closest_point_on_triangle(p: Point3, a: Point3, b: Point3, c: Point3) -> TrianglePoint {
    let ab = b - a;
    let ac = c - a;

    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return TrianglePoint::new(a, [1.0, 0.0, 0.0]);
    }

    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return TrianglePoint::new(b, [0.0, 1.0, 0.0]);
    }

    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return TrianglePoint::new(a + ab * v, [1.0 - v, v, 0.0]);
    }

    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return TrianglePoint::new(c, [0.0, 0.0, 1.0]);
    }

    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return TrianglePoint::new(a + ac * w, [1.0 - w, 0.0, w]);
    }

    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return TrianglePoint::new(b + (c - b) * w, [0.0, 1.0 - w, w]);
    }

    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    TrianglePoint::new(a + ab * v + ac * w, [1.0 - v - w, v, w])
}
