use crate::error::RenderError;
use crate::rendering::geometry::GeometryData;
use crate::rendering::texture::TextureData;
use crate::rendering::uniforms::UniformValue;

#[cfg(test)]
pub(crate) mod recording;
pub mod wgpu_backend;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ProgramId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GeometryId(pub u32);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TextureId(pub u32);

/// A single WGSL module containing `vs_main` and `fs_main`.
#[derive(Debug, Clone, Copy)]
pub struct ShaderSource<'a> {
    pub name: &'a str,
    pub wgsl: &'a str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawCall {
    Indexed { index_count: u32 },
    Arrays { vertex_count: u32 },
}

/// Immediate-style device seam used by materials.
///
/// State set through `use_program`, `set_uniform`, `bind_texture` and
/// `bind_geometry` applies to the next `draw`. Uniform names unknown to the
/// bound program are ignored.
pub trait GraphicsBackend {
    fn compile_program(&mut self, source: ShaderSource<'_>) -> Result<ProgramId, RenderError>;

    fn upload_geometry(&mut self, geometry: &GeometryData) -> Result<GeometryId, RenderError>;

    fn upload_texture(&mut self, texture: &TextureData) -> Result<TextureId, RenderError>;

    fn release_geometry(&mut self, geometry: GeometryId);

    fn release_texture(&mut self, texture: TextureId);

    fn use_program(&mut self, program: ProgramId);

    fn set_uniform(&mut self, name: &str, value: &UniformValue);

    fn bind_texture(&mut self, unit: u32, texture: TextureId);

    fn bind_geometry(&mut self, geometry: GeometryId);

    fn draw(&mut self, call: DrawCall);
}
