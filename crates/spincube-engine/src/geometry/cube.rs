/// Floats per logical vertex in [`CUBE_VERTICES`].
pub const FLOATS_PER_VERTEX: u8 = 3;

/// Vertices drawn per face as one triangle fan.
pub const VERTICES_PER_FACE: u32 = 4;

/// Faces present in [`CUBE_VERTICES`]: front then back.
///
/// Only two opposite faces are defined; the four side faces are not part of the mesh.
pub const CUBE_FACES: u32 = 2;

/// Positions of a unit cube centered at the origin, front quad then back quad.
#[rustfmt::skip]
pub const CUBE_VERTICES: [f32; 24] = [
    // front (z = +0.5)
    -0.5, -0.5,  0.5,
     0.5, -0.5,  0.5,
     0.5,  0.5,  0.5,
    -0.5,  0.5,  0.5,
    // back (z = -0.5)
    -0.5, -0.5, -0.5,
     0.5, -0.5, -0.5,
     0.5,  0.5, -0.5,
    -0.5,  0.5, -0.5,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn vertex_count_matches_faces() {
        let vertices = CUBE_VERTICES.len() as u32 / FLOATS_PER_VERTEX as u32;
        assert_eq!(vertices, CUBE_FACES * VERTICES_PER_FACE);
    }

    #[test]
    fn faces_sit_on_opposite_planes() {
        let z = |v: usize| CUBE_VERTICES[v * 3 + 2];
        assert!((0..4).all(|v| z(v) == 0.5));
        assert!((4..8).all(|v| z(v) == -0.5));
    }
}
