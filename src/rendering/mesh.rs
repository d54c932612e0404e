use glam::Mat4;

use crate::error::RenderError;
use crate::rendering::backend::GraphicsBackend;
use crate::rendering::geometry::Geometry;
use crate::rendering::material::Material;
use crate::rendering::render_context::RenderContext;
use crate::rendering::shader_cache::ShaderCache;

#[derive(Debug, Clone)]
pub struct MeshPrimitive {
    pub material: Material,
    pub geometry: Geometry,
}

/// Renderable component: primitives are drawn in order with the entity's
/// world matrix.
#[derive(Debug, Clone)]
pub struct Mesh {
    pub primitives: Vec<MeshPrimitive>,
    pub visible: bool,
}

impl Mesh {
    pub fn new(primitives: Vec<MeshPrimitive>) -> Self {
        Self {
            primitives,
            visible: true,
        }
    }

    pub fn single(material: Material, geometry: Geometry) -> Self {
        Self::new(vec![MeshPrimitive { material, geometry }])
    }

    /// Returns the number of draw calls issued.
    pub fn render(
        &mut self,
        context: &RenderContext,
        shaders: &mut ShaderCache,
        backend: &mut dyn GraphicsBackend,
        model: Mat4,
    ) -> Result<usize, RenderError> {
        for primitive in &mut self.primitives {
            primitive
                .material
                .render(context, shaders, backend, model, &mut primitive.geometry)?;
        }

        Ok(self.primitives.len())
    }

    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        for primitive in &mut self.primitives {
            primitive.material.release(backend);
            primitive.geometry.release(backend);
        }
    }
}
