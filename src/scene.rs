use glam::{Mat4, Vec3};
use serde::{Deserialize, Serialize};

use crate::geometry::Mesh;

/// Flat, insert-only container for everything the renderer draws.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Scene {
    renderables: Vec<Renderable>,
    lights: Vec<Light>,
}

impl Scene {
    /// Creates an empty scene.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a renderable and returns its index. Indices are stable for the
    /// lifetime of the scene; nothing is ever removed.
    pub fn add_renderable(&mut self, renderable: Renderable) -> usize {
        self.renderables.push(renderable);
        self.renderables.len() - 1
    }

    /// Adds a light source.
    pub fn add_light(&mut self, light: Light) {
        self.lights.push(light);
    }

    pub fn renderables(&self) -> &[Renderable] {
        &self.renderables
    }

    pub fn renderables_mut(&mut self) -> &mut [Renderable] {
        &mut self.renderables
    }

    pub fn lights(&self) -> &[Light] {
        &self.lights
    }

    /// First point light in insertion order, if any.
    pub fn point_light(&self) -> Option<&Light> {
        self.lights
            .iter()
            .find(|light| matches!(light, Light::Point { .. }))
    }

    /// Summed ambient contribution of all ambient lights.
    pub fn ambient(&self) -> (Vec3, f32) {
        let mut color = Vec3::ZERO;
        let mut total = 0.0;
        for light in &self.lights {
            if let Light::Ambient { color: c, intensity } = light {
                color += *c * *intensity;
                total += *intensity;
            }
        }
        if total > 0.0 {
            (color / total, total)
        } else {
            (Vec3::ONE, 0.0)
        }
    }
}

/// Position, Euler rotation (radians) and scale of a scene object.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    pub position: Vec3,
    pub rotation: Vec3,
    pub scale: Vec3,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            position: Vec3::ZERO,
            rotation: Vec3::ZERO,
            scale: Vec3::ONE,
        }
    }
}

impl Transform {
    /// Model matrix applying scale, then ZYX rotation, then translation.
    pub fn matrix(&self) -> Mat4 {
        let translation = Mat4::from_translation(self.position);
        let rotation = Mat4::from_rotation_z(self.rotation.z)
            * Mat4::from_rotation_y(self.rotation.y)
            * Mat4::from_rotation_x(self.rotation.x);
        let scale = Mat4::from_scale(self.scale);
        translation * rotation * scale
    }
}

/// A drawable object: geometry, material, transform and shadow flags.
///
/// `spin` is the fixed per-tick rotation delta applied by the frame
/// driver; `Vec3::ZERO` marks the object as static.
#[derive(Debug, Clone, PartialEq)]
pub struct Renderable {
    pub name: String,
    pub mesh: Mesh,
    pub material: Material,
    pub transform: Transform,
    pub cast_shadow: bool,
    pub receive_shadow: bool,
    pub spin: Vec3,
}

impl Renderable {
    pub fn new(name: impl Into<String>, mesh: Mesh, material: Material) -> Self {
        Self {
            name: name.into(),
            mesh,
            material,
            transform: Transform::default(),
            cast_shadow: false,
            receive_shadow: false,
            spin: Vec3::ZERO,
        }
    }

    pub fn with_transform(mut self, transform: Transform) -> Self {
        self.transform = transform;
        self
    }

    pub fn with_shadows(mut self, cast: bool, receive: bool) -> Self {
        self.cast_shadow = cast;
        self.receive_shadow = receive;
        self
    }

    pub fn with_spin(mut self, spin: Vec3) -> Self {
        self.spin = spin;
        self
    }

    pub fn is_animated(&self) -> bool {
        self.spin != Vec3::ZERO
    }
}

/// Surface parameters fed to the shader. The color map multiplies the
/// base color; displacement is baked into the mesh at build time.
#[derive(Debug, Clone, PartialEq)]
pub struct Material {
    pub base_color: Vec3,
    pub metalness: f32,
    pub roughness: f32,
    pub color_map: Option<TextureImage>,
}

impl Default for Material {
    fn default() -> Self {
        Self {
            base_color: Vec3::ONE,
            metalness: 0.0,
            roughness: 0.8,
            color_map: None,
        }
    }
}

/// Decoded RGBA8 image used as a color map. Producing the pixels from a
/// file is the asset loader's job, not this crate's.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextureImage {
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
}

impl TextureImage {
    /// Single-pixel solid color, the stand-in when no map is assigned.
    pub fn solid(color: [u8; 4]) -> Self {
        Self {
            width: 1,
            height: 1,
            pixels: color.to_vec(),
        }
    }

    /// Two-tone checkerboard, handy for demo scenes without image assets.
    pub fn checkerboard(size: u32, cell: u32, light: [u8; 4], dark: [u8; 4]) -> Self {
        let size = size.max(1);
        let cell = cell.max(1);
        let mut pixels = Vec::with_capacity((size * size * 4) as usize);
        for y in 0..size {
            for x in 0..size {
                let even = ((x / cell) + (y / cell)) % 2 == 0;
                pixels.extend_from_slice(if even { &light } else { &dark });
            }
        }
        Self {
            width: size,
            height: size,
            pixels,
        }
    }
}

/// Light source. Immutable after insertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Light {
    Point {
        color: Vec3,
        intensity: f32,
        position: Vec3,
        shadow: Option<ShadowProjection>,
    },
    Ambient {
        color: Vec3,
        intensity: f32,
    },
}

/// Shadow map parameters for a shadow casting light.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ShadowProjection {
    pub map_size: u32,
    pub near: f32,
    pub far: f32,
}

impl Default for ShadowProjection {
    fn default() -> Self {
        Self {
            map_size: 512,
            near: 0.5,
            far: 200.0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::cuboid;

    fn make_renderable(name: &str) -> Renderable {
        Renderable::new(name, cuboid(1.0, 1.0, 1.0), Material::default())
    }

    #[test]
    fn insertion_returns_stable_indices() {
        let mut scene = Scene::new();
        assert_eq!(scene.add_renderable(make_renderable("cube")), 0);
        assert_eq!(scene.add_renderable(make_renderable("torus")), 1);
        assert_eq!(scene.renderables()[1].name, "torus");
    }

    #[test]
    fn point_light_lookup_skips_ambient() {
        let mut scene = Scene::new();
        scene.add_light(Light::Ambient {
            color: Vec3::ONE,
            intensity: 0.3,
        });
        scene.add_light(Light::Point {
            color: Vec3::ONE,
            intensity: 1.5,
            position: Vec3::new(30.0, 20.0, 20.0),
            shadow: Some(ShadowProjection::default()),
        });
        match scene.point_light() {
            Some(Light::Point { intensity, .. }) => assert_eq!(*intensity, 1.5),
            other => panic!("unexpected light: {other:?}"),
        }
        let (_, ambient_intensity) = scene.ambient();
        assert!((ambient_intensity - 0.3).abs() < f32::EPSILON);
    }

    #[test]
    fn spin_marks_objects_animated() {
        let renderable = make_renderable("cube").with_spin(Vec3::splat(0.005));
        assert!(renderable.is_animated());
        assert!(!make_renderable("terrain").is_animated());
    }

    #[test]
    fn transform_matrix_applies_translation() {
        let transform = Transform {
            position: Vec3::new(0.0, -50.0, -30.0),
            ..Transform::default()
        };
        let moved = transform.matrix().transform_point3(Vec3::ZERO);
        assert_eq!(moved, Vec3::new(0.0, -50.0, -30.0));
    }
}
