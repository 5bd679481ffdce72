use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Projection settings validated at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Projection {
    /// Vertical field of view in degrees.
    pub fov_degrees: f32,
    pub aspect: f32,
    pub near: f32,
    pub far: f32,
}

impl Default for Projection {
    fn default() -> Self {
        Self {
            fov_degrees: 75.0,
            aspect: 16.0 / 9.0,
            near: 0.1,
            far: 1000.0,
        }
    }
}

/// Rejected camera configurations. Surfaced at setup time so a bad clip
/// range never reaches the GPU.
#[derive(Debug, Error, PartialEq)]
pub enum CameraError {
    #[error("field of view must be inside (0, 180) degrees, got {0}")]
    FieldOfView(f32),
    #[error("aspect ratio must be positive, got {0}")]
    Aspect(f32),
    #[error("clip planes must satisfy 0 < near < far, got near={near} far={far}")]
    ClipPlanes { near: f32, far: f32 },
}

/// Perspective camera. The transform (position/target) is written by the
/// orbit controls; the aspect ratio is written on viewport resize.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Camera {
    projection: Projection,
    pub position: Vec3,
    pub target: Vec3,
    pub up: Vec3,
}

impl Camera {
    /// Validates the projection and places the camera at `position`
    /// looking at `target`.
    pub fn new(projection: Projection, position: Vec3, target: Vec3) -> Result<Self, CameraError> {
        if !(projection.fov_degrees > 0.0 && projection.fov_degrees < 180.0) {
            return Err(CameraError::FieldOfView(projection.fov_degrees));
        }
        if !(projection.aspect > 0.0) {
            return Err(CameraError::Aspect(projection.aspect));
        }
        if !(projection.near > 0.0 && projection.far > projection.near) {
            return Err(CameraError::ClipPlanes {
                near: projection.near,
                far: projection.far,
            });
        }
        Ok(Self {
            projection,
            position,
            target,
            up: Vec3::Y,
        })
    }

    pub fn projection(&self) -> Projection {
        self.projection
    }

    /// Updates the aspect ratio after a viewport resize. Degenerate sizes
    /// are ignored so a minimised window cannot poison the projection.
    pub fn set_viewport(&mut self, width: u32, height: u32) {
        if width > 0 && height > 0 {
            self.projection.aspect = width as f32 / height as f32;
        }
    }

    pub fn view_matrix(&self) -> Mat4 {
        Mat4::look_at_rh(self.position, self.target, self.up)
    }

    pub fn projection_matrix(&self) -> Mat4 {
        Mat4::perspective_rh(
            self.projection.fov_degrees.to_radians(),
            self.projection.aspect,
            self.projection.near,
            self.projection.far,
        )
    }

    pub fn view_projection(&self) -> Mat4 {
        self.projection_matrix() * self.view_matrix()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_the_demo_projection() {
        let camera = Camera::new(Projection::default(), Vec3::new(0.0, 0.0, 40.0), Vec3::ZERO)
            .expect("valid projection");
        let vp = camera.view_projection();
        assert!(!vp.col(0).x.is_nan());
    }

    #[test]
    fn rejects_non_positive_clip_planes() {
        let projection = Projection {
            near: 0.0,
            ..Projection::default()
        };
        assert_eq!(
            Camera::new(projection, Vec3::Z, Vec3::ZERO),
            Err(CameraError::ClipPlanes {
                near: 0.0,
                far: 1000.0
            })
        );
    }

    #[test]
    fn rejects_inverted_clip_planes() {
        let projection = Projection {
            near: 10.0,
            far: 1.0,
            ..Projection::default()
        };
        assert!(matches!(
            Camera::new(projection, Vec3::Z, Vec3::ZERO),
            Err(CameraError::ClipPlanes { .. })
        ));
    }

    #[test]
    fn rejects_out_of_range_fov() {
        for fov in [0.0, -10.0, 180.0, f32::NAN] {
            let projection = Projection {
                fov_degrees: fov,
                ..Projection::default()
            };
            assert!(Camera::new(projection, Vec3::Z, Vec3::ZERO).is_err());
        }
    }

    #[test]
    fn resize_ignores_zero_height() {
        let mut camera =
            Camera::new(Projection::default(), Vec3::Z, Vec3::ZERO).expect("valid projection");
        camera.set_viewport(1280, 720);
        let aspect = camera.projection().aspect;
        camera.set_viewport(1280, 0);
        assert_eq!(camera.projection().aspect, aspect);
    }
}
