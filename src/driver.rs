use std::f32::consts::TAU;

use glam::Vec3;
use log::warn;
use thiserror::Error;

use crate::camera::Camera;
use crate::controls::OrbitControls;
use crate::scene::Scene;

/// Failures reported by a [`RenderBackend`] draw.
#[derive(Debug, Error)]
pub enum DrawError {
    /// The backend can no longer produce frames. Fatal: the driver stops
    /// and the error is surfaced to the host.
    #[error("rendering context lost: {0}")]
    ContextLost(String),
    /// One frame could not be presented but the backend recovered. The
    /// driver logs it and keeps running.
    #[error("frame dropped: {0}")]
    FrameDropped(String),
}

/// The seam between the frame driver and the rasteriser: one synchronous
/// draw of a scene snapshot with the given camera.
pub trait RenderBackend {
    fn draw(&mut self, scene: &Scene, camera: &Camera) -> Result<(), DrawError>;
}

/// Backend that draws nothing. Used for headless runs and tests.
#[derive(Debug, Default)]
pub struct NullBackend;

impl RenderBackend for NullBackend {
    fn draw(&mut self, _scene: &Scene, _camera: &Camera) -> Result<(), DrawError> {
        Ok(())
    }
}

/// Drives the per-frame update cycle: advance animated transforms, fold
/// pending input into the camera, submit one draw.
///
/// The driver never schedules itself; the host (the winit loop, or a
/// plain `for` loop when headless) calls [`FrameDriver::tick`] and re-arms
/// the next tick only while [`FrameDriver::is_running`] holds.
#[derive(Debug)]
pub struct FrameDriver {
    running: bool,
    ticks: u64,
}

impl Default for FrameDriver {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDriver {
    pub fn new() -> Self {
        Self {
            running: true,
            ticks: 0,
        }
    }

    /// True while the loop should be re-armed for the next refresh.
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// Number of completed ticks.
    pub fn ticks(&self) -> u64 {
        self.ticks
    }

    /// Stops the loop; the current tick finishes, no further tick runs.
    pub fn stop(&mut self) {
        self.running = false;
    }

    /// Runs one tick. A fatal backend failure clears the running flag
    /// before the error is returned, so tick k+1 is never armed after a
    /// context loss during tick k.
    pub fn tick<B: RenderBackend>(
        &mut self,
        scene: &mut Scene,
        controls: &mut OrbitControls,
        camera: &mut Camera,
        backend: &mut B,
    ) -> Result<(), DrawError> {
        if !self.running {
            return Ok(());
        }

        advance_spins(scene);
        controls.update(camera);

        match backend.draw(scene, camera) {
            Ok(()) => {
                self.ticks += 1;
                Ok(())
            }
            Err(DrawError::FrameDropped(reason)) => {
                warn!("frame dropped: {reason}");
                self.ticks += 1;
                Ok(())
            }
            Err(err @ DrawError::ContextLost(_)) => {
                self.running = false;
                Err(err)
            }
        }
    }
}

/// Adds each animated renderable's per-tick spin to its rotation, wrapping
/// every component into `[0, 2π)` so rotations stay bounded over long runs.
pub fn advance_spins(scene: &mut Scene) {
    for renderable in scene.renderables_mut() {
        if !renderable.is_animated() {
            continue;
        }
        let rotation = renderable.transform.rotation + renderable.spin;
        renderable.transform.rotation = wrap_rotation(rotation);
    }
}

fn wrap_rotation(rotation: Vec3) -> Vec3 {
    Vec3::new(
        rotation.x.rem_euclid(TAU),
        rotation.y.rem_euclid(TAU),
        rotation.z.rem_euclid(TAU),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::camera::{Camera, Projection};
    use crate::controls::OrbitSettings;
    use crate::geometry::cuboid;
    use crate::scene::{Material, Renderable};

    struct FailingBackend {
        fail_at: u64,
        draws: u64,
    }

    impl RenderBackend for FailingBackend {
        fn draw(&mut self, _scene: &Scene, _camera: &Camera) -> Result<(), DrawError> {
            self.draws += 1;
            if self.draws >= self.fail_at {
                Err(DrawError::ContextLost("device removed".into()))
            } else {
                Ok(())
            }
        }
    }

    fn harness(spin: Vec3) -> (Scene, OrbitControls, Camera) {
        let mut scene = Scene::new();
        scene.add_renderable(
            Renderable::new("spinner", cuboid(1.0, 1.0, 1.0), Material::default())
                .with_spin(spin),
        );
        let camera = Camera::new(Projection::default(), Vec3::new(0.0, 0.0, 40.0), Vec3::ZERO)
            .expect("valid projection");
        let controls = OrbitControls::new(&camera, OrbitSettings::default());
        (scene, controls, camera)
    }

    fn rotation_after(ticks: u32, spin: Vec3) -> Vec3 {
        let (mut scene, mut controls, mut camera) = harness(spin);
        let mut driver = FrameDriver::new();
        let mut backend = NullBackend;
        for _ in 0..ticks {
            driver
                .tick(&mut scene, &mut controls, &mut camera, &mut backend)
                .expect("tick succeeds");
        }
        scene.renderables()[0].transform.rotation
    }

    fn assert_rotation_close(actual: Vec3, expected: Vec3) {
        let expected = wrap_rotation(expected);
        assert!(
            (actual - expected).length() < 1e-3,
            "expected {expected:?}, got {actual:?}"
        );
    }

    #[test]
    fn rotation_is_linear_in_tick_count() {
        let spin = Vec3::new(0.005, 0.005, 0.005);
        for n in [0u32, 1, 7, 50] {
            let expected = spin * n as f32;
            assert_rotation_close(rotation_after(n, spin), expected);
        }
    }

    #[test]
    fn two_hundred_ticks_of_the_cube_spin() {
        let rotation = rotation_after(200, Vec3::splat(0.005));
        assert_rotation_close(rotation, Vec3::splat(1.0));
    }

    #[test]
    fn one_hundred_ticks_of_the_torus_spin() {
        let rotation = rotation_after(100, Vec3::splat(-0.007));
        assert_rotation_close(rotation, Vec3::splat(-0.7));
    }

    #[test]
    fn rotations_stay_wrapped_over_long_runs() {
        let rotation = rotation_after(3000, Vec3::splat(0.005));
        assert!(rotation.min_element() >= 0.0);
        assert!(rotation.max_element() < TAU);
        // 3000 * 0.005 = 15 rad, wrapped past two full turns.
        assert_rotation_close(rotation, Vec3::splat(15.0 - 2.0 * TAU));
    }

    #[test]
    fn static_objects_are_never_touched() {
        let (mut scene, mut controls, mut camera) = harness(Vec3::ZERO);
        let before = scene.renderables()[0].transform;
        let mut driver = FrameDriver::new();
        let mut backend = NullBackend;
        for _ in 0..10 {
            driver
                .tick(&mut scene, &mut controls, &mut camera, &mut backend)
                .expect("tick succeeds");
        }
        assert_eq!(scene.renderables()[0].transform, before);
    }

    #[test]
    fn context_loss_halts_the_driver() {
        let (mut scene, mut controls, mut camera) = harness(Vec3::splat(0.005));
        let mut driver = FrameDriver::new();
        let mut backend = FailingBackend {
            fail_at: 3,
            draws: 0,
        };

        for _ in 0..2 {
            driver
                .tick(&mut scene, &mut controls, &mut camera, &mut backend)
                .expect("tick succeeds");
        }
        let err = driver
            .tick(&mut scene, &mut controls, &mut camera, &mut backend)
            .expect_err("context loss is fatal");
        assert!(matches!(err, DrawError::ContextLost(_)));
        assert!(!driver.is_running());

        // A further tick must be a no-op: no draw reaches the backend.
        driver
            .tick(&mut scene, &mut controls, &mut camera, &mut backend)
            .expect("stopped driver does nothing");
        assert_eq!(backend.draws, 3);
        assert_eq!(driver.ticks(), 2);
    }

    #[test]
    fn dropped_frames_do_not_stop_the_loop() {
        struct FlakyBackend;
        impl RenderBackend for FlakyBackend {
            fn draw(&mut self, _scene: &Scene, _camera: &Camera) -> Result<(), DrawError> {
                Err(DrawError::FrameDropped("surface timeout".into()))
            }
        }

        let (mut scene, mut controls, mut camera) = harness(Vec3::splat(0.005));
        let mut driver = FrameDriver::new();
        driver
            .tick(&mut scene, &mut controls, &mut camera, &mut FlakyBackend)
            .expect("dropped frames are not fatal");
        assert!(driver.is_running());
    }
}
