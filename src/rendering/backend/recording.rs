use crate::error::RenderError;
use crate::rendering::backend::{
    DrawCall, GeometryId, GraphicsBackend, ProgramId, ShaderSource, TextureId,
};
use crate::rendering::geometry::GeometryData;
use crate::rendering::texture::TextureData;
use crate::rendering::uniforms::UniformValue;

#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Command {
    CompileProgram(String),
    UploadGeometry,
    UploadTexture(String),
    ReleaseGeometry(GeometryId),
    ReleaseTexture(TextureId),
    UseProgram(ProgramId),
    SetUniform(String, UniformValue),
    BindTexture(u32, TextureId),
    BindGeometry(GeometryId),
    Draw(DrawCall),
}

/// Backend that records every call instead of talking to a GPU.
#[derive(Debug, Default)]
pub(crate) struct RecordingBackend {
    pub commands: Vec<Command>,
    pub programs: Vec<String>,
    next_geometry: u32,
    next_texture: u32,
}

impl RecordingBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn compile_count(&self) -> usize {
        self.commands
            .iter()
            .filter(|command| matches!(command, Command::CompileProgram(_)))
            .count()
    }

    pub fn draws(&self) -> Vec<DrawCall> {
        self.commands
            .iter()
            .filter_map(|command| match command {
                Command::Draw(call) => Some(*call),
                _ => None,
            })
            .collect()
    }

    pub fn uniform(&self, name: &str) -> Option<&UniformValue> {
        self.commands.iter().rev().find_map(|command| match command {
            Command::SetUniform(uniform, value) if uniform == name => Some(value),
            _ => None,
        })
    }

    /// Uniform values set between consecutive draws, one list per draw.
    pub fn uniforms_per_draw(&self, name: &str) -> Vec<Option<UniformValue>> {
        let mut per_draw = Vec::new();
        let mut current = None;

        for command in &self.commands {
            match command {
                Command::SetUniform(uniform, value) if uniform == name => {
                    current = Some(value.clone());
                }
                Command::Draw(_) => per_draw.push(current.take()),
                _ => {}
            }
        }

        per_draw
    }

    pub fn clear(&mut self) {
        self.commands.clear();
    }
}

impl GraphicsBackend for RecordingBackend {
    fn compile_program(&mut self, source: ShaderSource<'_>) -> Result<ProgramId, RenderError> {
        self.commands
            .push(Command::CompileProgram(source.name.to_string()));

        if source.wgsl.trim().is_empty() {
            return Err(RenderError::ShaderCompilation {
                name: source.name.to_string(),
                message: "empty shader source".to_string(),
            });
        }

        self.programs.push(source.wgsl.to_string());
        Ok(ProgramId(self.programs.len() as u32 - 1))
    }

    fn upload_geometry(&mut self, _geometry: &GeometryData) -> Result<GeometryId, RenderError> {
        self.commands.push(Command::UploadGeometry);
        self.next_geometry += 1;
        Ok(GeometryId(self.next_geometry))
    }

    fn upload_texture(&mut self, texture: &TextureData) -> Result<TextureId, RenderError> {
        self.commands
            .push(Command::UploadTexture(texture.name.clone()));
        self.next_texture += 1;
        Ok(TextureId(self.next_texture))
    }

    fn release_geometry(&mut self, geometry: GeometryId) {
        self.commands.push(Command::ReleaseGeometry(geometry));
    }

    fn release_texture(&mut self, texture: TextureId) {
        self.commands.push(Command::ReleaseTexture(texture));
    }

    fn use_program(&mut self, program: ProgramId) {
        self.commands.push(Command::UseProgram(program));
    }

    fn set_uniform(&mut self, name: &str, value: &UniformValue) {
        self.commands
            .push(Command::SetUniform(name.to_string(), value.clone()));
    }

    fn bind_texture(&mut self, unit: u32, texture: TextureId) {
        self.commands.push(Command::BindTexture(unit, texture));
    }

    fn bind_geometry(&mut self, geometry: GeometryId) {
        self.commands.push(Command::BindGeometry(geometry));
    }

    fn draw(&mut self, call: DrawCall) {
        self.commands.push(Command::Draw(call));
    }
}
