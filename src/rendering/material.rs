use std::collections::BTreeMap;

use glam::{Mat4, Vec3, Vec4};

use crate::error::RenderError;
use crate::light::LightKind;
use crate::rendering::backend::{GraphicsBackend, ProgramId, ShaderSource};
use crate::rendering::geometry::Geometry;
use crate::rendering::render_context::RenderContext;
use crate::rendering::shader_cache::ShaderCache;
use crate::rendering::texture::Texture;
use crate::rendering::uniforms::{UniformBinder, UniformValue};

bitflags::bitflags! {
    /// Optional inputs of the standard shader. Each combination is a separate
    /// shader variant.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct MaterialFeatures: u32 {
        const ALBEDO_MAP = 1 << 0;
        const NORMAL_MAP = 1 << 1;
        const METALLIC_ROUGHNESS_MAP = 1 << 2;
        const EMISSIVE_MAP = 1 << 3;
        const OCCLUSION_MAP = 1 << 4;
        /// The scene has an environment light.
        const ENVIRONMENT_MAP = 1 << 5;
    }
}

#[derive(Debug, Clone)]
pub enum MaterialUniform {
    Value(UniformValue),
    Texture(Texture),
}

/// Material with user supplied WGSL and an arbitrary set of uniforms.
#[derive(Debug, Clone)]
pub struct ShaderMaterial {
    name: String,
    source: String,
    uniforms: BTreeMap<String, MaterialUniform>,
    program: Option<ProgramId>,
    dirty: bool,
}

impl ShaderMaterial {
    pub fn new(name: impl Into<String>, source: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            uniforms: BTreeMap::new(),
            program: None,
            dirty: true,
        }
    }

    pub fn with_uniform(mut self, name: impl Into<String>, value: UniformValue) -> Self {
        self.set_uniform(name, value);
        self
    }

    pub fn with_texture(mut self, name: impl Into<String>, texture: Texture) -> Self {
        self.set_texture(name, texture);
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Replaces the shader. It is recompiled on the next draw.
    pub fn set_source(&mut self, source: impl Into<String>) {
        self.source = source.into();
        self.dirty = true;
    }

    pub fn set_uniform(&mut self, name: impl Into<String>, value: UniformValue) {
        self.uniforms
            .insert(name.into(), MaterialUniform::Value(value));
    }

    pub fn set_texture(&mut self, name: impl Into<String>, texture: Texture) {
        self.uniforms
            .insert(name.into(), MaterialUniform::Texture(texture));
    }

    pub fn uniform(&self, name: &str) -> Option<&MaterialUniform> {
        self.uniforms.get(name)
    }

    pub fn program(&self) -> Option<ProgramId> {
        self.program
    }

    fn ensure_compiled(
        &mut self,
        backend: &mut dyn GraphicsBackend,
    ) -> Result<ProgramId, RenderError> {
        if let (false, Some(program)) = (self.dirty, self.program) {
            return Ok(program);
        }

        let program = backend.compile_program(ShaderSource {
            name: &self.name,
            wgsl: &self.source,
        })?;
        log::debug!("Compiled shader material {}", self.name);

        self.program = Some(program);
        self.dirty = false;
        Ok(program)
    }

    fn bind_uniforms(&mut self, binder: &mut UniformBinder) -> Result<(), RenderError> {
        for (name, uniform) in &mut self.uniforms {
            match uniform {
                MaterialUniform::Value(value) => binder.set(name, value.clone()),
                MaterialUniform::Texture(texture) => {
                    let texture = texture.ensure_uploaded(binder.backend())?;
                    binder.set_texture(name, texture);
                }
            }
        }

        Ok(())
    }

    fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        for uniform in self.uniforms.values_mut() {
            if let MaterialUniform::Texture(texture) = uniform {
                texture.release(backend);
            }
        }
    }
}

/// Fixed metallic/roughness material. Which textures are present selects the
/// shader variant.
#[derive(Debug, Clone)]
pub struct StandardMaterial {
    pub base_color: Vec4,
    pub metallic: f32,
    pub roughness: f32,
    pub emissive: Vec3,
    pub albedo_map: Option<Texture>,
    pub normal_map: Option<Texture>,
    /// Roughness in green, metallic in blue.
    pub metallic_roughness_map: Option<Texture>,
    pub emissive_map: Option<Texture>,
    pub occlusion_map: Option<Texture>,
}

impl Default for StandardMaterial {
    fn default() -> Self {
        Self {
            base_color: Vec4::ONE,
            metallic: 0.0,
            roughness: 0.5,
            emissive: Vec3::ZERO,
            albedo_map: None,
            normal_map: None,
            metallic_roughness_map: None,
            emissive_map: None,
            occlusion_map: None,
        }
    }
}

impl StandardMaterial {
    pub fn from_color(base_color: Vec4) -> Self {
        Self {
            base_color,
            ..Default::default()
        }
    }

    pub fn features(&self, environment: bool) -> MaterialFeatures {
        let mut features = MaterialFeatures::empty();
        features.set(MaterialFeatures::ALBEDO_MAP, self.albedo_map.is_some());
        features.set(MaterialFeatures::NORMAL_MAP, self.normal_map.is_some());
        features.set(
            MaterialFeatures::METALLIC_ROUGHNESS_MAP,
            self.metallic_roughness_map.is_some(),
        );
        features.set(MaterialFeatures::EMISSIVE_MAP, self.emissive_map.is_some());
        features.set(MaterialFeatures::OCCLUSION_MAP, self.occlusion_map.is_some());
        features.set(MaterialFeatures::ENVIRONMENT_MAP, environment);
        features
    }

    fn textures_mut(&mut self) -> [(&'static str, &mut Option<Texture>); 5] {
        [
            ("albedo_map", &mut self.albedo_map),
            ("normal_map", &mut self.normal_map),
            ("metallic_roughness_map", &mut self.metallic_roughness_map),
            ("emissive_map", &mut self.emissive_map),
            ("occlusion_map", &mut self.occlusion_map),
        ]
    }

    fn bind_uniforms(&mut self, binder: &mut UniformBinder) -> Result<(), RenderError> {
        binder.set("base_color", UniformValue::Vec4(self.base_color));
        binder.set("metallic", UniformValue::Float(self.metallic));
        binder.set("roughness", UniformValue::Float(self.roughness));
        binder.set("emissive", UniformValue::Vec3(self.emissive));

        for (name, texture) in self.textures_mut() {
            if let Some(texture) = texture {
                let texture = texture.ensure_uploaded(binder.backend())?;
                binder.set_texture(name, texture);
            }
        }

        Ok(())
    }

    fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        for (_, texture) in self.textures_mut() {
            if let Some(texture) = texture {
                texture.release(backend);
            }
        }
    }
}

#[derive(Debug, Clone)]
pub enum Material {
    Shader(ShaderMaterial),
    Standard(StandardMaterial),
}

impl Material {
    /// Draws `geometry` with this material at `model`.
    pub fn render(
        &mut self,
        context: &RenderContext,
        shaders: &mut ShaderCache,
        backend: &mut dyn GraphicsBackend,
        model: Mat4,
        geometry: &mut Geometry,
    ) -> Result<(), RenderError> {
        let environment = context.has_environment_light();

        let program = match self {
            Material::Shader(material) => material.ensure_compiled(backend)?,
            Material::Standard(material) => {
                shaders.get_or_compile(material.features(environment), backend)?
            }
        };

        let buffers = geometry.ensure_uploaded(backend)?;

        backend.use_program(program);

        let mut binder = UniformBinder::new(backend);
        bind_transforms(&mut binder, context, model);

        match self {
            Material::Shader(material) => material.bind_uniforms(&mut binder)?,
            Material::Standard(material) => material.bind_uniforms(&mut binder)?,
        }

        LightKind::Point.bind_uniforms(&mut binder, context.world, context.lights)?;
        if environment {
            LightKind::Environment.bind_uniforms(&mut binder, context.world, context.lights)?;
        }

        backend.bind_geometry(buffers);
        backend.draw(geometry.data().draw_call());

        Ok(())
    }

    pub fn release(&mut self, backend: &mut dyn GraphicsBackend) {
        match self {
            Material::Shader(material) => material.release(backend),
            Material::Standard(material) => material.release(backend),
        }
    }
}

fn bind_transforms(binder: &mut UniformBinder, context: &RenderContext, model: Mat4) {
    binder.set("model", UniformValue::Mat4(model));
    binder.set("view", UniformValue::Mat4(context.view));
    binder.set("projection", UniformValue::Mat4(context.projection));
    binder.set("model_inverse", UniformValue::Mat4(model.inverse()));
    binder.set("view_inverse", UniformValue::Mat4(context.camera_world));
    binder.set(
        "camera_position",
        UniformValue::Vec3(context.camera_position()),
    );
}
