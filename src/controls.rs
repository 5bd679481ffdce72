use glam::{Vec2, Vec3};
use serde::{Deserialize, Serialize};

use crate::camera::Camera;

/// Tuning knobs for the orbit controls.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrbitSettings {
    /// Radians of orbit per pixel of drag.
    pub rotate_speed: f32,
    /// World units of pan per pixel of drag, scaled by the orbit radius.
    pub pan_speed: f32,
    /// Radius multiplier applied per zoom step; values below one zoom in.
    pub zoom_step: f32,
    pub min_radius: f32,
    pub max_radius: f32,
    /// Polar clamp keeps the camera off the poles so it can never flip.
    pub min_polar: f32,
    pub max_polar: f32,
    /// Fraction of the buffered gesture consumed per tick. `None` applies
    /// gestures 1:1 on the next tick, as the original demo did.
    pub damping: Option<f32>,
}

impl Default for OrbitSettings {
    fn default() -> Self {
        Self {
            rotate_speed: 0.005,
            pan_speed: 0.001,
            zoom_step: 0.95,
            min_radius: 0.5,
            max_radius: 500.0,
            min_polar: 0.01,
            max_polar: std::f32::consts::PI - 0.01,
            damping: None,
        }
    }
}

/// Which drag gesture is in flight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DragGesture {
    Orbit,
    Pan,
}

/// Orbit-style camera controls.
///
/// Event handlers only accumulate into a pending-gesture buffer; the
/// camera transform is written exclusively inside [`OrbitControls::update`],
/// which the frame driver calls once per tick. That keeps all camera
/// mutation serialised with the render loop.
#[derive(Debug, Clone, PartialEq)]
pub struct OrbitControls {
    settings: OrbitSettings,
    target: Vec3,
    azimuth: f32,
    polar: f32,
    radius: f32,
    drag: Option<(DragGesture, Vec2)>,
    pending_orbit: Vec2,
    pending_pan: Vec2,
    pending_zoom: f32,
}

impl OrbitControls {
    /// Binds the controls to a camera, deriving the spherical orbit state
    /// from the camera's current position relative to its target.
    pub fn new(camera: &Camera, settings: OrbitSettings) -> Self {
        let offset = camera.position - camera.target;
        let radius = offset
            .length()
            .clamp(settings.min_radius, settings.max_radius);
        let polar = if radius > 0.0 {
            (offset.y / radius)
                .clamp(-1.0, 1.0)
                .acos()
                .clamp(settings.min_polar, settings.max_polar)
        } else {
            std::f32::consts::FRAC_PI_2
        };
        let azimuth = offset.z.atan2(offset.x);
        Self {
            settings,
            target: camera.target,
            azimuth,
            polar,
            radius,
            drag: None,
            pending_orbit: Vec2::ZERO,
            pending_pan: Vec2::ZERO,
            pending_zoom: 0.0,
        }
    }

    /// Starts a drag gesture at the given cursor position.
    pub fn begin_drag(&mut self, gesture: DragGesture, cursor: Vec2) {
        self.drag = Some((gesture, cursor));
    }

    /// Feeds a cursor move; a no-op unless a drag is in flight.
    pub fn drag_to(&mut self, cursor: Vec2) {
        if let Some((gesture, last)) = &mut self.drag {
            let delta = cursor - *last;
            *last = cursor;
            match gesture {
                DragGesture::Orbit => self.pending_orbit += delta,
                DragGesture::Pan => self.pending_pan += delta,
            }
        }
    }

    pub fn end_drag(&mut self) {
        self.drag = None;
    }

    /// Buffers wheel input; positive steps zoom in.
    pub fn zoom_by(&mut self, steps: f32) {
        self.pending_zoom += steps;
    }

    pub fn has_pending_input(&self) -> bool {
        self.pending_orbit != Vec2::ZERO
            || self.pending_pan != Vec2::ZERO
            || self.pending_zoom != 0.0
    }

    pub fn radius(&self) -> f32 {
        self.radius
    }

    pub fn polar(&self) -> f32 {
        self.polar
    }

    pub fn azimuth(&self) -> f32 {
        self.azimuth
    }

    pub fn target(&self) -> Vec3 {
        self.target
    }

    /// Folds the pending gesture buffer into the camera transform. Called
    /// once per frame-driver tick; with an empty buffer the camera is left
    /// untouched.
    pub fn update(&mut self, camera: &mut Camera) {
        if !self.has_pending_input() {
            return;
        }

        let (orbit, pan, zoom) = self.consume_pending();

        self.azimuth =
            (self.azimuth - orbit.x * self.settings.rotate_speed).rem_euclid(std::f32::consts::TAU);
        self.polar = (self.polar - orbit.y * self.settings.rotate_speed)
            .clamp(self.settings.min_polar, self.settings.max_polar);
        self.radius = (self.radius * self.settings.zoom_step.powf(zoom))
            .clamp(self.settings.min_radius, self.settings.max_radius);

        if pan != Vec2::ZERO {
            let forward = -self.offset().normalize_or_zero();
            let right = forward.cross(Vec3::Y).normalize_or_zero();
            let up = right.cross(forward);
            let scale = self.settings.pan_speed * self.radius;
            self.target += (right * -pan.x + up * pan.y) * scale;
        }

        camera.position = self.target + self.offset();
        camera.target = self.target;
    }

    fn consume_pending(&mut self) -> (Vec2, Vec2, f32) {
        match self.settings.damping {
            None => {
                let consumed = (self.pending_orbit, self.pending_pan, self.pending_zoom);
                self.pending_orbit = Vec2::ZERO;
                self.pending_pan = Vec2::ZERO;
                self.pending_zoom = 0.0;
                consumed
            }
            Some(factor) => {
                let factor = factor.clamp(0.0, 1.0);
                let consumed = (
                    self.pending_orbit * factor,
                    self.pending_pan * factor,
                    self.pending_zoom * factor,
                );
                self.pending_orbit = decay(self.pending_orbit * (1.0 - factor));
                self.pending_pan = decay(self.pending_pan * (1.0 - factor));
                self.pending_zoom = decay_scalar(self.pending_zoom * (1.0 - factor));
                consumed
            }
        }
    }

    fn offset(&self) -> Vec3 {
        self.radius
            * Vec3::new(
                self.polar.sin() * self.azimuth.cos(),
                self.polar.cos(),
                self.polar.sin() * self.azimuth.sin(),
            )
    }
}

const RESIDUE_EPSILON: f32 = 1e-4;

fn decay_scalar(value: f32) -> f32 {
    if value.abs() < RESIDUE_EPSILON {
        0.0
    } else {
        value
    }
}

fn decay(value: Vec2) -> Vec2 {
    Vec2::new(decay_scalar(value.x), decay_scalar(value.y))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Camera, Projection};

    fn demo_camera() -> Camera {
        Camera::new(Projection::default(), Vec3::new(0.0, 0.0, 40.0), Vec3::ZERO)
            .expect("valid projection")
    }

    #[test]
    fn binding_recovers_the_camera_position() {
        let camera = demo_camera();
        let controls = OrbitControls::new(&camera, OrbitSettings::default());
        assert!((controls.radius() - 40.0).abs() < 1e-4);
        let roundtrip = controls.target() + controls.offset();
        assert!((roundtrip - camera.position).length() < 1e-3);
    }

    #[test]
    fn update_without_input_leaves_the_camera_unchanged() {
        let mut camera = demo_camera();
        let before = camera;
        let mut controls = OrbitControls::new(&camera, OrbitSettings::default());
        for _ in 0..10 {
            controls.update(&mut camera);
        }
        assert_eq!(camera, before);
    }

    #[test]
    fn drag_orbits_the_camera() {
        let mut camera = demo_camera();
        let mut controls = OrbitControls::new(&camera, OrbitSettings::default());
        controls.begin_drag(DragGesture::Orbit, Vec2::ZERO);
        controls.drag_to(Vec2::new(100.0, 0.0));
        controls.end_drag();
        controls.update(&mut camera);
        assert!((camera.position.length() - 40.0).abs() < 1e-3);
        assert!((camera.position - Vec3::new(0.0, 0.0, 40.0)).length() > 1.0);
    }

    #[test]
    fn polar_angle_stops_at_the_clamp() {
        let settings = OrbitSettings::default();
        let mut camera = demo_camera();
        let mut controls = OrbitControls::new(&camera, settings);
        controls.begin_drag(DragGesture::Orbit, Vec2::ZERO);
        // Drag far enough to swing many times past the pole.
        controls.drag_to(Vec2::new(0.0, 1_000_000.0));
        controls.end_drag();
        controls.update(&mut camera);
        assert_eq!(controls.polar(), settings.min_polar);

        controls.begin_drag(DragGesture::Orbit, Vec2::ZERO);
        controls.drag_to(Vec2::new(0.0, -1_000_000.0));
        controls.end_drag();
        controls.update(&mut camera);
        assert_eq!(controls.polar(), settings.max_polar);
    }

    #[test]
    fn zoom_stops_at_the_radius_bounds() {
        let settings = OrbitSettings::default();
        let mut camera = demo_camera();
        let mut controls = OrbitControls::new(&camera, settings);

        controls.zoom_by(10_000.0);
        controls.update(&mut camera);
        assert_eq!(controls.radius(), settings.min_radius);

        controls.zoom_by(-10_000.0);
        controls.update(&mut camera);
        assert_eq!(controls.radius(), settings.max_radius);
    }

    #[test]
    fn pan_moves_the_target() {
        let mut camera = demo_camera();
        let mut controls = OrbitControls::new(&camera, OrbitSettings::default());
        controls.begin_drag(DragGesture::Pan, Vec2::ZERO);
        controls.drag_to(Vec2::new(50.0, -30.0));
        controls.end_drag();
        controls.update(&mut camera);
        assert_ne!(controls.target(), Vec3::ZERO);
        assert_eq!(camera.target, controls.target());
        // Orbit geometry is preserved while panning.
        assert!(((camera.position - camera.target).length() - 40.0).abs() < 1e-3);
    }

    #[test]
    fn damping_spreads_a_gesture_over_several_ticks() {
        let settings = OrbitSettings {
            damping: Some(0.5),
            ..OrbitSettings::default()
        };
        let mut camera = demo_camera();
        let mut controls = OrbitControls::new(&camera, settings);
        controls.begin_drag(DragGesture::Orbit, Vec2::ZERO);
        controls.drag_to(Vec2::new(100.0, 0.0));
        controls.end_drag();

        controls.update(&mut camera);
        let after_one = controls.azimuth();
        assert!(controls.has_pending_input());

        for _ in 0..64 {
            controls.update(&mut camera);
        }
        assert!(!controls.has_pending_input());
        assert_ne!(after_one, controls.azimuth());
    }

    #[test]
    fn cursor_moves_without_a_drag_are_ignored() {
        let mut camera = demo_camera();
        let before = camera;
        let mut controls = OrbitControls::new(&camera, OrbitSettings::default());
        controls.drag_to(Vec2::new(500.0, 500.0));
        controls.update(&mut camera);
        assert_eq!(camera, before);
    }
}
