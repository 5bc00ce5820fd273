use crate::device::ClearColor;

/// Render loop parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct LoopConfig {
    /// Vertical field of view, in degrees.
    pub fov_degrees: f64,

    /// Near clip plane distance. Must be positive and below `far`.
    pub near: f64,

    /// Far clip plane distance.
    pub far: f64,

    /// Radians of rotation per second of elapsed time.
    pub rotation_speed: f64,

    /// Rotation axis, used as given (not normalized).
    pub rotation_axis: [f64; 3],

    pub clear_color: ClearColor,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            fov_degrees: 45.0,
            near: 0.1,
            far: 100.0,
            rotation_speed: 1.0,
            rotation_axis: [1.0, 1.0, 0.0],
            clear_color: ClearColor::BLACK,
        }
    }
}
