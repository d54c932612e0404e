use crate::error::RenderError;
use crate::rendering::backend::{GraphicsBackend, TextureId};

/// Decoded RGBA8 pixels as handed over by the asset loader.
#[derive(Debug, Clone, PartialEq)]
pub struct TextureData {
    pub name: String,
    pub width: u32,
    pub height: u32,
    pub pixels: Vec<u8>,
    pub srgb: bool,
}

impl TextureData {
    pub fn new(name: impl Into<String>, width: u32, height: u32, pixels: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            width,
            height,
            pixels,
            srgb: true,
        }
    }

    pub fn solid(name: impl Into<String>, rgba: [u8; 4]) -> Self {
        Self::new(name, 1, 1, rgba.to_vec())
    }

    pub fn linear(mut self) -> Self {
        self.srgb = false;
        self
    }

    pub fn validate(&self) -> Result<(), RenderError> {
        if self.width == 0 || self.height == 0 {
            return Err(RenderError::MissingTextureDimensions {
                name: self.name.clone(),
                width: self.width,
                height: self.height,
            });
        }

        let expected = self.width as usize * self.height as usize * 4;
        if self.pixels.len() != expected {
            return Err(RenderError::TextureSizeMismatch {
                name: self.name.clone(),
                expected,
                actual: self.pixels.len(),
            });
        }

        Ok(())
    }
}

#[derive(Debug)]
pub struct Texture {
    data: TextureData,
    gpu: Option<TextureId>,
    dirty: bool,
}

impl Clone for Texture {
    /// The copy gets its own upload; GPU handles are never shared.
    fn clone(&self) -> Self {
        Self::new(self.data.clone())
    }
}

impl Texture {
    pub fn new(data: TextureData) -> Self {
        Self {
            data,
            gpu: None,
            dirty: true,
        }
    }

    pub fn data(&self) -> &TextureData {
        &self.data
    }

    pub fn set_data(&mut self, data: TextureData) {
        self.data = data;
        self.dirty = true;
    }

    pub fn ensure_uploaded(
        &mut self,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<TextureId, RenderError> {
        if let (false, Some(texture)) = (self.dirty, self.gpu) {
            return Ok(texture);
        }

        self.data.validate()?;

        if let Some(previous) = self.gpu.take() {
            backend.release_texture(previous);
        }

        let texture = backend.upload_texture(&self.data)?;
        log::debug!(
            "Uploaded texture {} ({}x{})",
            self.data.name,
            self.data.width,
            self.data.height
        );

        self.gpu = Some(texture);
        self.dirty = false;
        Ok(texture)
    }

    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        if let Some(texture) = self.gpu.take() {
            backend.release_texture(texture);
        }
        self.dirty = true;
    }
}
