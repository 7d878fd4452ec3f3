use crate::config::{PARALLAX_AMPLITUDE, PARALLAX_SMOOTHING};
use crate::math::add;
use crate::state::Cursor;

/// Perspective camera looking down -Z; it never rotates
#[derive(Clone, Debug)]
pub struct PerspectiveCamera {
    /// Vertical field of view in degrees
    pub fov: f64,
    pub aspect: f64,
    pub near: f64,
    pub far: f64,
    /// Position relative to the rig
    pub position: [f64; 3],
    focal_x: f64,
    focal_y: f64,
}

impl PerspectiveCamera {
    pub fn new(fov: f64, aspect: f64, near: f64, far: f64) -> Self {
        let mut camera = PerspectiveCamera {
            fov,
            aspect,
            near,
            far,
            position: [0.0; 3],
            focal_x: 0.0,
            focal_y: 0.0,
        };
        camera.update_projection_matrix();
        camera
    }

    /// Recomputes the projection after `fov` or `aspect` changed
    pub fn update_projection_matrix(&mut self) {
        self.focal_y = 1.0 / (self.fov.to_radians() / 2.0).tan();
        self.focal_x = self.focal_y / self.aspect;
    }

    /// Projects a camera-space point to normalized device coordinates
    pub fn project(&self, view: &[f64; 3]) -> Option<[f64; 2]> {
        let depth = -view[2];
        if depth < self.near || depth > self.far {
            return None;
        }
        Some([
            view[0] * self.focal_x / depth,
            view[1] * self.focal_y / depth,
        ])
    }

    /// Camera-space ray through a point in normalized device coordinates
    pub fn ray_direction(&self, ndc: [f64; 2]) -> [f64; 3] {
        [ndc[0] / self.focal_x, ndc[1] / self.focal_y, -1.0]
    }

    /// Pixels per world unit at `depth` for a surface `height` pixels tall
    pub fn pixels_per_unit(&self, depth: f64, height: f64) -> f64 {
        self.focal_y * height / (2.0 * depth)
    }
}

/// Group carrying the camera; its position is the parallax offset
#[derive(Clone, Debug)]
pub struct CameraRig {
    pub position: [f64; 3],
    pub camera: PerspectiveCamera,
}

impl CameraRig {
    pub fn new(camera: PerspectiveCamera) -> Self {
        CameraRig {
            position: [0.0; 3],
            camera,
        }
    }

    pub fn world_position(&self) -> [f64; 3] {
        add(&self.position, &self.camera.position)
    }

    /// Target the rig drifts towards for a given cursor
    pub fn parallax_target(cursor: &Cursor) -> [f64; 2] {
        [cursor.x * PARALLAX_AMPLITUDE, -cursor.y * PARALLAX_AMPLITUDE]
    }

    /// First-order low-pass step towards the cursor target
    pub fn follow_cursor(&mut self, cursor: &Cursor, delta: f64) {
        let target = CameraRig::parallax_target(cursor);
        for axis in 0..2 {
            self.position[axis] += (target[axis] - self.position[axis]) * PARALLAX_SMOOTHING * delta;
        }
    }
}
