use std::mem::offset_of;

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use crate::error::RenderError;
use crate::rendering::backend::{DrawCall, GeometryId, GraphicsBackend};

#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct Vertex {
    pub position: Vec3,
    pub normal: Vec3,
    pub tex_coords: Vec2,
}

impl Vertex {
    pub fn new(position: Vec3, normal: Vec3, tex_coords: Vec2) -> Self {
        Self {
            position,
            normal,
            tex_coords,
        }
    }

    pub const LAYOUT: wgpu::VertexBufferLayout<'static> = wgpu::VertexBufferLayout {
        array_stride: std::mem::size_of::<Vertex>() as wgpu::BufferAddress,
        step_mode: wgpu::VertexStepMode::Vertex,
        attributes: &[
            wgpu::VertexAttribute {
                offset: offset_of!(Vertex, position) as wgpu::BufferAddress,
                shader_location: 0,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                offset: offset_of!(Vertex, normal) as wgpu::BufferAddress,
                shader_location: 1,
                format: wgpu::VertexFormat::Float32x3,
            },
            wgpu::VertexAttribute {
                offset: offset_of!(Vertex, tex_coords) as wgpu::BufferAddress,
                shader_location: 2,
                format: wgpu::VertexFormat::Float32x2,
            },
        ],
    };
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct GeometryData {
    pub vertices: Vec<Vertex>,
    pub indices: Option<Vec<u32>>,
}

impl GeometryData {
    pub fn draw_call(&self) -> DrawCall {
        match &self.indices {
            Some(indices) => DrawCall::Indexed {
                index_count: indices.len() as u32,
            },
            None => DrawCall::Arrays {
                vertex_count: self.vertices.len() as u32,
            },
        }
    }
}

/// CPU-side geometry with a lazily uploaded GPU copy.
#[derive(Debug)]
pub struct Geometry {
    data: GeometryData,
    buffers: Option<GeometryId>,
    dirty: bool,
}

impl Clone for Geometry {
    /// Clones the vertex data only. The copy uploads its own buffers on first use.
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
            buffers: None,
            dirty: true,
        }
    }
}

impl Geometry {
    pub fn new(vertices: Vec<Vertex>, indices: Option<Vec<u32>>) -> Self {
        Self {
            data: GeometryData { vertices, indices },
            buffers: None,
            dirty: true,
        }
    }

    pub fn data(&self) -> &GeometryData {
        &self.data
    }

    pub fn set_data(&mut self, data: GeometryData) {
        self.data = data;
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub fn buffers(&self) -> Option<GeometryId> {
        self.buffers
    }

    /// Uploads the data if it changed since the last upload and returns the
    /// buffers to bind.
    pub fn ensure_uploaded(
        &mut self,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<GeometryId, RenderError> {
        if let (false, Some(buffers)) = (self.dirty, self.buffers) {
            return Ok(buffers);
        }

        if let Some(previous) = self.buffers.take() {
            backend.release_geometry(previous);
        }

        let buffers = backend.upload_geometry(&self.data)?;
        log::debug!(
            "Uploaded geometry ({} vertices, indexed: {})",
            self.data.vertices.len(),
            self.data.indices.is_some()
        );

        self.buffers = Some(buffers);
        self.dirty = false;
        Ok(buffers)
    }

    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(buffers) = self.buffers.take() {
            backend.release_geometry(buffers);
        }
        self.dirty = true;
    }

    /// Unit cube centered at the origin, 24 vertices so each face has its own normal.
    pub fn cube() -> Self {
        let faces = [
            (Vec3::X, Vec3::Y),
            (Vec3::NEG_X, Vec3::Y),
            (Vec3::Y, Vec3::NEG_Z),
            (Vec3::NEG_Y, Vec3::Z),
            (Vec3::Z, Vec3::Y),
            (Vec3::NEG_Z, Vec3::Y),
        ];

        let mut vertices = Vec::with_capacity(24);
        let mut indices = Vec::with_capacity(36);

        for (normal, up) in faces {
            let right = up.cross(normal);
            let base = vertices.len() as u32;

            let corners = [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)];
            for (u, v) in corners {
                let position = (normal + right * u + up * v) * 0.5;
                let tex_coords = Vec2::new((u + 1.0) * 0.5, (1.0 - v) * 0.5);
                vertices.push(Vertex::new(position, normal, tex_coords));
            }

            indices.extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }

        Self::new(vertices, Some(indices))
    }

    /// Square on the XZ plane facing +Y, drawn without indices.
    pub fn plane(size: f32) -> Self {
        let half = size * 0.5;
        let corner = |x: f32, z: f32, u: f32, v: f32| {
            Vertex::new(Vec3::new(x, 0.0, z), Vec3::Y, Vec2::new(u, v))
        };

        let vertices = vec![
            corner(-half, -half, 0.0, 0.0),
            corner(-half, half, 0.0, 1.0),
            corner(half, half, 1.0, 1.0),
            corner(-half, -half, 0.0, 0.0),
            corner(half, half, 1.0, 1.0),
            corner(half, -half, 1.0, 0.0),
        ];

        Self::new(vertices, None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rendering::backend::recording::{Command, RecordingBackend};

    #[test]
    fn cube_faces_wind_outwards() {
        let cube = Geometry::cube();
        let data = cube.data();
        let indices = data.indices.as_ref().unwrap();

        for triangle in indices.chunks(3) {
            let [a, b, c] = [0, 1, 2].map(|i| data.vertices[triangle[i] as usize]);
            let face_normal = (b.position - a.position).cross(c.position - a.position);
            assert!(face_normal.dot(a.normal) > 0.0);
        }
    }

    #[test]
    fn draw_call_depends_on_indices() {
        assert_eq!(
            Geometry::cube().data().draw_call(),
            DrawCall::Indexed { index_count: 36 }
        );
        assert_eq!(
            Geometry::plane(2.0).data().draw_call(),
            DrawCall::Arrays { vertex_count: 6 }
        );
    }

    #[test]
    fn cloned_geometry_does_not_share_buffers() {
        let mut backend = RecordingBackend::new();
        let mut original = Geometry::cube();
        let buffers = original.ensure_uploaded(&mut backend).unwrap();

        let mut copy = original.clone();
        assert!(copy.is_dirty());
        assert_eq!(copy.buffers(), None);

        original.release(&mut backend);
        let copy_buffers = copy.ensure_uploaded(&mut backend).unwrap();
        assert_ne!(copy_buffers, buffers);
        assert_eq!(
            backend.commands,
            vec![
                Command::UploadGeometry,
                Command::ReleaseGeometry(buffers),
                Command::UploadGeometry,
            ]
        );
    }

    #[test]
    fn plane_faces_up() {
        let plane = Geometry::plane(4.0);
        let v = &plane.data().vertices;
        let normal = (v[1].position - v[0].position).cross(v[2].position - v[0].position);
        assert!(normal.y > 0.0);
    }
}
