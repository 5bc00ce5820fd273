use std::f64::consts::PI;

use super::Matrix4;

/// Perspective projection for a symmetric frustum.
///
/// Maps view-space z in `[-near, -far]` to clip-space `[-1, 1]` after the divide,
/// with `w = -z`. Requires `far > near > 0` and `aspect > 0`; other inputs yield a
/// degenerate matrix and are not corrected.
pub fn perspective(fov_degrees: f64, aspect: f64, near: f64, far: f64) -> Matrix4 {
    let top = near * (fov_degrees * PI / 360.0).tan();
    let right = top * aspect;
    let depth = far - near;

    let mut m = [0.0f32; 16];
    m[0] = (near / right) as f32;
    m[5] = (near / top) as f32;
    m[10] = (-(far + near) / depth) as f32;
    m[11] = -1.0;
    m[14] = (-(2.0 * far * near) / depth) as f32;
    m[15] = 0.0;
    Matrix4(m)
}

/// Rotation by `angle` radians about the axis `(x, y, z)`, via Rodrigues' formula.
///
/// The axis is used as given. A non-unit axis produces a matrix that also scales and
/// shears; callers that want a pure rotation must pass a unit vector.
///
/// Elements are laid out in the order below and uploaded without transposition, so
/// the vertex stage (`M * v`) sees the transpose of the textbook matrix.
pub fn rotation(angle: f64, x: f64, y: f64, z: f64) -> Matrix4 {
    let c = angle.cos();
    let s = angle.sin();
    let t = 1.0 - c;

    let m = [
        c + t * x * x,
        t * x * y - z * s,
        t * x * z + y * s,
        0.0,
        t * y * x + z * s,
        c + t * y * y,
        t * y * z - x * s,
        0.0,
        t * z * x - y * s,
        t * z * y + x * s,
        c + t * z * z,
        0.0,
        0.0,
        0.0,
        0.0,
        1.0,
    ];

    Matrix4(m.map(|v| v as f32))
}

#[cfg(test)]
mod tests {
    use glam::{Mat3, Mat4, Vec4};

    use super::*;

    const EPS: f32 = 1e-5;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() <= EPS
    }

    fn mat(m: Matrix4) -> Mat4 {
        Mat4::from_cols_array(m.as_array())
    }

    /// Upper 3x3 block has unit, mutually perpendicular columns.
    fn is_orthonormal(m: Matrix4, eps: f32) -> bool {
        let b = Mat3::from_mat4(mat(m));
        (b.transpose() * b).abs_diff_eq(Mat3::IDENTITY, eps)
    }

    // ── perspective ───────────────────────────────────────────────────────

    #[test]
    fn perspective_depth_terms() {
        for &(fov, aspect, near, far) in &[
            (45.0, 800.0 / 600.0, 0.1, 100.0),
            (90.0, 1.0, 1.0, 10.0),
            (30.0, 0.5, 0.01, 1000.0),
        ] {
            let m = perspective(fov, aspect, near, far);
            assert!(close(m[10], (-(far + near) / (far - near)) as f32));
            assert_eq!(m[11], -1.0);
            assert!(close(m[14], (-(2.0 * far * near) / (far - near)) as f32));
            assert_eq!(m[15], 0.0);
        }
    }

    #[test]
    fn perspective_800x600_scale_terms() {
        let near = 0.1;
        let aspect = 800.0 / 600.0;
        let m = perspective(45.0, aspect, near, 100.0);

        let top = near * (45.0f64 * PI / 360.0).tan();
        let right = top * aspect;
        assert!(close(m[0], (near / right) as f32));
        assert!(close(m[0], 1.810_660_2));
        assert!(close(m[5], 2.414_213_5));
    }

    #[test]
    fn perspective_maps_near_and_far_planes() {
        let m = mat(perspective(45.0, 1.0, 0.1, 100.0));

        let near = m.mul_vec4(Vec4::new(0.0, 0.0, -0.1, 1.0));
        assert!(close(near.w, 0.1));
        assert!(close(near.z / near.w, -1.0));

        let far = m.mul_vec4(Vec4::new(0.0, 0.0, -100.0, 1.0));
        assert!(close(far.w, 100.0));
        assert!(close(far.z / far.w, 1.0));
    }

    #[test]
    fn perspective_only_writes_known_elements() {
        let m = perspective(60.0, 1.5, 0.5, 50.0);
        for i in [1, 2, 3, 4, 6, 7, 8, 9, 12, 13] {
            assert_eq!(m[i], 0.0, "element {i}");
        }
    }

    // ── rotation ──────────────────────────────────────────────────────────

    #[test]
    fn zero_angle_is_identity_for_any_axis() {
        for &(x, y, z) in &[(1.0, 1.0, 0.0), (0.0, 0.0, 1.0), (3.0, -2.0, 7.5), (0.0, 0.0, 0.0)] {
            assert_eq!(rotation(0.0, x, y, z), Matrix4::IDENTITY);
        }
    }

    #[test]
    fn unit_x_axis_rows_reproduce_x_rotation() {
        let angle = 0.7f64;
        let m = rotation(angle, 1.0, 0.0, 0.0);
        let (c, s) = (angle.cos() as f32, angle.sin() as f32);
        let (x, y, z) = (0.3f32, -1.2f32, 2.0f32);

        // Rows are laid out consecutively: element [r * 4 + k].
        let row = |r: usize| m[r * 4] * x + m[r * 4 + 1] * y + m[r * 4 + 2] * z;
        assert!(close(row(0), x));
        assert!(close(row(1), y * c - z * s));
        assert!(close(row(2), y * s + z * c));
        assert!(is_orthonormal(m, 1e-6));
    }

    #[test]
    fn gpu_applies_the_transpose() {
        let angle = 0.7f64;
        let m = mat(rotation(angle, 1.0, 0.0, 0.0));
        let p = m.mul_vec4(Vec4::new(0.0, 1.0, 0.0, 1.0));
        assert!(close(p.y, angle.cos() as f32));
        assert!(close(p.z, -angle.sin() as f32));

        let textbook = Mat4::from_axis_angle(glam::Vec3::X, angle as f32);
        assert!(m.abs_diff_eq(textbook.transpose(), 1e-6));
    }

    #[test]
    fn non_unit_axis_is_not_normalized() {
        let m = rotation(PI, 1.0, 1.0, 0.0);
        assert!(!is_orthonormal(m, 1e-3));
        assert!(close(m[0], 1.0));
        assert!(close(m[1], 2.0));
        assert!(close(m[4], 2.0));
        assert!(close(m[10], -1.0));
    }

    #[test]
    fn one_second_of_spin_matches_rodrigues() {
        // 1000 ms at 0.001 rad/ms.
        let angle = 1000.0 * 0.001;
        let m = rotation(angle, 1.0, 1.0, 0.0);
        let (c, s) = ((1.0f64).cos() as f32, (1.0f64).sin() as f32);
        let t = 1.0 - c;

        let expected = Mat4::from_cols_array(&[
            1.0, t, s, 0.0, //
            t, 1.0, -s, 0.0, //
            -s, s, c, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ]);
        assert!(mat(m).abs_diff_eq(expected, 1e-6));
    }

    #[test]
    fn angle_wraps_through_trig_periodicity() {
        let a = rotation(0.25, 0.0, 0.0, 1.0);
        let b = rotation(0.25 + 2.0 * PI, 0.0, 0.0, 1.0);
        assert!(mat(a).abs_diff_eq(mat(b), 1e-6));
    }
}
