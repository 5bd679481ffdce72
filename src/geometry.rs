use anyhow::{anyhow, Result};
use glam::Vec3;
use serde::{Deserialize, Serialize};

/// Number of floats per vertex: `position.xyz`, `normal.xyz`, `uv`.
pub const VERTEX_STRIDE: usize = 8;

/// GPU ready mesh buffers with interleaved vertex attributes.
///
/// Vertices are laid out as `position.xyz`, `normal.xyz`, `uv`.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Mesh {
    pub vertices: Vec<f32>,
    pub indices: Vec<u32>,
}

impl Mesh {
    /// Number of vertices stored in the interleaved buffer.
    pub fn vertex_count(&self) -> usize {
        self.vertices.len() / VERTEX_STRIDE
    }

    /// Offsets every vertex along its normal by the sampled height times
    /// `scale`, then recomputes the normals from the displaced surface.
    pub fn displace(&mut self, field: &Heightfield, scale: f32) {
        for chunk in self.vertices.chunks_exact_mut(VERTEX_STRIDE) {
            let normal = Vec3::new(chunk[3], chunk[4], chunk[5]);
            let height = field.sample(chunk[6], chunk[7]);
            let offset = normal * height * scale;
            chunk[0] += offset.x;
            chunk[1] += offset.y;
            chunk[2] += offset.z;
        }
        self.recompute_normals();
    }

    /// Rebuilds per-vertex normals by averaging the face normals of every
    /// triangle touching the vertex.
    pub fn recompute_normals(&mut self) {
        let vertex_count = self.vertex_count();
        let mut accum = vec![Vec3::ZERO; vertex_count];

        for triangle in self.indices.chunks_exact(3) {
            let i0 = triangle[0] as usize;
            let i1 = triangle[1] as usize;
            let i2 = triangle[2] as usize;
            let p0 = self.position(i0);
            let p1 = self.position(i1);
            let p2 = self.position(i2);
            let normal = (p1 - p0).cross(p2 - p0);
            if normal.length_squared() > f32::EPSILON {
                let normal = normal.normalize();
                accum[i0] += normal;
                accum[i1] += normal;
                accum[i2] += normal;
            }
        }

        for (i, normal) in accum.into_iter().enumerate() {
            let normal = normal.normalize_or_zero();
            let base = i * VERTEX_STRIDE;
            self.vertices[base + 3] = normal.x;
            self.vertices[base + 4] = normal.y;
            self.vertices[base + 5] = normal.z;
        }
    }

    fn position(&self, index: usize) -> Vec3 {
        let base = index * VERTEX_STRIDE;
        Vec3::from_slice(&self.vertices[base..base + 3])
    }

    fn push_vertex(&mut self, position: Vec3, normal: Vec3, u: f32, v: f32) {
        self.vertices.extend_from_slice(&[
            position.x, position.y, position.z, normal.x, normal.y, normal.z, u, v,
        ]);
    }
}

/// Axis aligned box centred on the origin.
pub fn cuboid(width: f32, height: f32, depth: f32) -> Mesh {
    let (hx, hy, hz) = (width / 2.0, height / 2.0, depth / 2.0);
    let mut mesh = Mesh::default();

    // One quad per face so each face gets its own normal and uv square.
    let faces: [(Vec3, Vec3, Vec3); 6] = [
        (Vec3::Z, Vec3::X, Vec3::Y),
        (Vec3::NEG_Z, Vec3::NEG_X, Vec3::Y),
        (Vec3::NEG_X, Vec3::Z, Vec3::Y),
        (Vec3::X, Vec3::NEG_Z, Vec3::Y),
        (Vec3::NEG_Y, Vec3::X, Vec3::Z),
        (Vec3::Y, Vec3::X, Vec3::NEG_Z),
    ];
    let half = Vec3::new(hx, hy, hz);

    for (normal, tangent, bitangent) in faces {
        let base = mesh.vertex_count() as u32;
        let centre = normal * half;
        for (sx, sy, u, v) in [
            (-1.0, -1.0, 0.0, 1.0),
            (1.0, -1.0, 1.0, 1.0),
            (1.0, 1.0, 1.0, 0.0),
            (-1.0, 1.0, 0.0, 0.0),
        ] {
            let position = centre + tangent * half * sx + bitangent * half * sy;
            mesh.push_vertex(position, normal, u, v);
        }
        mesh.indices
            .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
    }

    mesh
}

/// Torus lying in the XY plane, ring of `radius` with a tube of `tube`.
pub fn torus(radius: f32, tube: f32, radial_segments: u32, tubular_segments: u32) -> Mesh {
    let radial = radial_segments.max(3);
    let tubular = tubular_segments.max(3);
    let mut mesh = Mesh::default();

    for j in 0..=radial {
        let v = j as f32 / radial as f32 * std::f32::consts::TAU;
        for i in 0..=tubular {
            let u = i as f32 / tubular as f32 * std::f32::consts::TAU;
            let ring = Vec3::new(radius * u.cos(), radius * u.sin(), 0.0);
            let position = Vec3::new(
                (radius + tube * v.cos()) * u.cos(),
                (radius + tube * v.cos()) * u.sin(),
                tube * v.sin(),
            );
            let normal = (position - ring).normalize();
            mesh.push_vertex(
                position,
                normal,
                i as f32 / tubular as f32,
                j as f32 / radial as f32,
            );
        }
    }

    for j in 1..=radial {
        for i in 1..=tubular {
            let a = (tubular + 1) * j + i - 1;
            let b = (tubular + 1) * (j - 1) + i - 1;
            let c = (tubular + 1) * (j - 1) + i;
            let d = (tubular + 1) * j + i;
            mesh.indices.extend_from_slice(&[a, b, d, b, c, d]);
        }
    }

    mesh
}

/// Segmented plane in the XY plane facing +Z, centred on the origin.
///
/// The segment counts control displacement resolution; the flat plane
/// itself would only need a single quad.
pub fn plane(width: f32, height: f32, width_segments: u32, height_segments: u32) -> Mesh {
    let segs_x = width_segments.max(1);
    let segs_y = height_segments.max(1);
    let mut mesh = Mesh::default();

    for iy in 0..=segs_y {
        let fy = iy as f32 / segs_y as f32;
        let y = height / 2.0 - fy * height;
        for ix in 0..=segs_x {
            let fx = ix as f32 / segs_x as f32;
            let x = fx * width - width / 2.0;
            mesh.push_vertex(Vec3::new(x, y, 0.0), Vec3::Z, fx, fy);
        }
    }

    for iy in 0..segs_y {
        for ix in 0..segs_x {
            let a = ix + (segs_x + 1) * iy;
            let b = ix + (segs_x + 1) * (iy + 1);
            let c = ix + 1 + (segs_x + 1) * (iy + 1);
            let d = ix + 1 + (segs_x + 1) * iy;
            mesh.indices.extend_from_slice(&[a, b, d, b, c, d]);
        }
    }

    mesh
}

/// Normalised height samples used to displace a mesh, typically decoded
/// from a grayscale image by an external loader.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Heightfield {
    width: usize,
    height: usize,
    samples: Vec<f32>,
}

impl Heightfield {
    /// Builds a heightfield from 8-bit luminance pixels in row-major order.
    pub fn from_luminance(width: usize, height: usize, pixels: &[u8]) -> Result<Self> {
        if width == 0 || height == 0 {
            return Err(anyhow!("heightfield dimensions must be non-zero"));
        }
        if pixels.len() != width * height {
            return Err(anyhow!(
                "expected {} luminance samples, got {}",
                width * height,
                pixels.len()
            ));
        }
        Ok(Self {
            width,
            height,
            samples: pixels.iter().map(|p| *p as f32 / 255.0).collect(),
        })
    }

    /// Builds a heightfield by evaluating `f(u, v)` on a grid. Values are
    /// clamped to `[0, 1]`.
    pub fn from_fn(width: usize, height: usize, f: impl Fn(f32, f32) -> f32) -> Self {
        let width = width.max(1);
        let height = height.max(1);
        let mut samples = Vec::with_capacity(width * height);
        for y in 0..height {
            for x in 0..width {
                let u = x as f32 / (width.max(2) - 1) as f32;
                let v = y as f32 / (height.max(2) - 1) as f32;
                samples.push(f(u, v).clamp(0.0, 1.0));
            }
        }
        Self {
            width,
            height,
            samples,
        }
    }

    /// Bilinearly samples the field at normalised coordinates, clamping at
    /// the edges.
    pub fn sample(&self, u: f32, v: f32) -> f32 {
        let x = (u.clamp(0.0, 1.0) * (self.width - 1) as f32).max(0.0);
        let y = (v.clamp(0.0, 1.0) * (self.height - 1) as f32).max(0.0);
        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let x1 = (x0 + 1).min(self.width - 1);
        let y1 = (y0 + 1).min(self.height - 1);
        let tx = x - x0 as f32;
        let ty = y - y0 as f32;

        let s = |xi: usize, yi: usize| self.samples[yi * self.width + xi];
        let top = s(x0, y0) * (1.0 - tx) + s(x1, y0) * tx;
        let bottom = s(x0, y1) * (1.0 - tx) + s(x1, y1) * tx;
        top * (1.0 - ty) + bottom * ty
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normals_are_unit(mesh: &Mesh) {
        for chunk in mesh.vertices.chunks_exact(VERTEX_STRIDE) {
            let normal = Vec3::new(chunk[3], chunk[4], chunk[5]);
            assert!((normal.length() - 1.0).abs() < 1e-4);
        }
    }

    fn indices_in_bounds(mesh: &Mesh) {
        let count = mesh.vertex_count() as u32;
        assert!(mesh.indices.iter().all(|i| *i < count));
        assert_eq!(mesh.indices.len() % 3, 0);
    }

    #[test]
    fn cuboid_has_six_faces() {
        let mesh = cuboid(10.0, 10.0, 10.0);
        assert_eq!(mesh.vertex_count(), 24);
        assert_eq!(mesh.indices.len(), 36);
        normals_are_unit(&mesh);
        indices_in_bounds(&mesh);
    }

    #[test]
    fn torus_vertices_sit_on_the_tube() {
        let mesh = torus(11.0, 1.0, 16, 100);
        indices_in_bounds(&mesh);
        normals_are_unit(&mesh);
        for chunk in mesh.vertices.chunks_exact(VERTEX_STRIDE) {
            let position = Vec3::new(chunk[0], chunk[1], chunk[2]);
            let ring = Vec3::new(position.x, position.y, 0.0).normalize_or_zero() * 11.0;
            assert!(((position - ring).length() - 1.0).abs() < 1e-3);
        }
    }

    #[test]
    fn plane_grid_dimensions() {
        let mesh = plane(400.0, 300.0, 64, 64);
        assert_eq!(mesh.vertex_count(), 65 * 65);
        assert_eq!(mesh.indices.len(), 64 * 64 * 6);
        indices_in_bounds(&mesh);
    }

    #[test]
    fn displacement_moves_vertices_and_keeps_unit_normals() {
        let mut mesh = plane(10.0, 10.0, 8, 8);
        let flat = mesh.clone();
        let field = Heightfield::from_fn(16, 16, |u, v| (u + v) / 2.0);
        mesh.displace(&field, 35.0);
        assert_ne!(mesh.vertices, flat.vertices);
        normals_are_unit(&mesh);
        // Corner at uv (0, 0) has zero height and must not move.
        assert_eq!(&mesh.vertices[..3], &flat.vertices[..3]);
    }

    #[test]
    fn heightfield_rejects_mismatched_sizes() {
        assert!(Heightfield::from_luminance(4, 4, &[0u8; 15]).is_err());
        assert!(Heightfield::from_luminance(0, 4, &[]).is_err());
    }

    #[test]
    fn heightfield_sampling_interpolates() {
        let field = Heightfield::from_luminance(2, 1, &[0, 255]).unwrap();
        assert!(field.sample(0.0, 0.0).abs() < 1e-6);
        assert!((field.sample(1.0, 0.0) - 1.0).abs() < 1e-6);
        assert!((field.sample(0.5, 0.0) - 0.5).abs() < 1e-3);
    }
}
