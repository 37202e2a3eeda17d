//! Lookup tables for marching tetrahedra.

/// Offsets of the 8 cube corners from the cell origin.
///
/// Corner `i` sits at `(i & 1, (i >> 1) & 1, (i >> 2) & 1)`, so corner 0 is the
/// origin and corner 7 is the opposite vertex.
pub const CORNER_OFFSETS: [(usize, usize, usize); 8] = [
    (0, 0, 0),
    (1, 0, 0),
    (0, 1, 0),
    (1, 1, 0),
    (0, 0, 1),
    (1, 0, 1),
    (0, 1, 1),
    (1, 1, 1),
];

/// Split of a cube into six tetrahedra that all share the 0-7 diagonal.
///
/// Every cube uses the same split, so face diagonals agree between neighbours
/// and the extracted surface has no cracks.
pub const CUBE_TETRAHEDRA: [[usize; 4]; 6] = [
    [0, 1, 3, 7],
    [0, 1, 5, 7],
    [0, 2, 3, 7],
    [0, 2, 6, 7],
    [0, 4, 5, 7],
    [0, 4, 6, 7],
];
