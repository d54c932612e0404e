use thiserror::Error;

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("no active camera: the scene needs an entity with both a Transform and a Camera")]
    NoActiveCamera,

    #[error("texture {name} has no dimensions ({width}x{height})")]
    MissingTextureDimensions {
        name: String,
        width: u32,
        height: u32,
    },

    #[error("texture {name} expects {expected} bytes of RGBA8 data, got {actual}")]
    TextureSizeMismatch {
        name: String,
        expected: usize,
        actual: usize,
    },

    #[error("failed to compile shader {name}: {message}")]
    ShaderCompilation { name: String, message: String },

    #[error("failed to link shader {name}: {message}")]
    ShaderLink { name: String, message: String },

    #[error("surface error: {0}")]
    Surface(#[from] wgpu::SurfaceError),
}
