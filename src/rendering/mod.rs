pub mod backend;
pub mod depth_texture;
pub mod geometry;
pub mod imgui_renderer;
pub mod material;
pub mod mesh;
pub mod pipeline;
pub mod render_context;
pub mod renderer;
pub mod shader_cache;
pub mod texture;
pub mod uniforms;

pub use geometry::{Geometry, GeometryData, Vertex};
pub use material::{Material, MaterialFeatures, MaterialUniform, ShaderMaterial, StandardMaterial};
pub use mesh::{Mesh, MeshPrimitive};
pub use pipeline::{FrameStats, Pipeline};
pub use texture::{Texture, TextureData};
pub use uniforms::{UniformBinder, UniformValue};
