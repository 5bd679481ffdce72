//! Building blocks for a small GPU scene viewer.
//!
//! The crate separates the deterministic parts of the demo (scene graph,
//! orbit controls, frame driver) from the wgpu renderer behind the
//! [`RenderBackend`] seam, so the update cycle stays testable without a
//! GPU or a window.

pub mod app;
pub mod camera;
pub mod controls;
pub mod driver;
pub mod geometry;
pub mod render;
pub mod scene;

pub use app::{App, WindowInitError};
pub use camera::{Camera, CameraError, Projection};
pub use controls::{DragGesture, OrbitControls, OrbitSettings};
pub use driver::{advance_spins, DrawError, FrameDriver, NullBackend, RenderBackend};
pub use geometry::{cuboid, plane, torus, Heightfield, Mesh};
pub use render::{Renderer, RendererConfig, ShadowFilter, ShadowSettings};
pub use scene::{
    Light, Material, Renderable, Scene, ShadowProjection, TextureImage, Transform,
};
