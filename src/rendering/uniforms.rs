use glam::{Mat4, Vec2, Vec3, Vec4};

use crate::rendering::backend::{GraphicsBackend, TextureId};

#[derive(Debug, Clone, PartialEq)]
pub enum UniformValue {
    Float(f32),
    Int(i32),
    UInt(u32),
    Vec2(Vec2),
    Vec3(Vec3),
    Vec4(Vec4),
    Mat4(Mat4),
    Vec3Array(Vec<Vec3>),
    /// Texture unit a sampled texture uniform reads from.
    TextureUnit(u32),
}

impl UniformValue {
    /// Writes the value at `offset`. Array elements are `stride` bytes apart.
    /// Returns false if the value does not fit.
    pub fn write_bytes(&self, target: &mut [u8], offset: usize, stride: Option<usize>) -> bool {
        match self {
            UniformValue::Float(value) => write_pod(target, offset, value),
            UniformValue::Int(value) => write_pod(target, offset, value),
            UniformValue::UInt(value) => write_pod(target, offset, value),
            UniformValue::Vec2(value) => write_pod(target, offset, value),
            UniformValue::Vec3(value) => write_pod(target, offset, value),
            UniformValue::Vec4(value) => write_pod(target, offset, value),
            UniformValue::Mat4(value) => write_pod(target, offset, value),
            UniformValue::Vec3Array(values) => {
                let stride = stride.unwrap_or(std::mem::size_of::<Vec4>());
                values
                    .iter()
                    .enumerate()
                    .all(|(index, value)| write_pod(target, offset + index * stride, value))
            }
            UniformValue::TextureUnit(_) => false,
        }
    }
}

fn write_pod<T: bytemuck::Pod>(target: &mut [u8], offset: usize, value: &T) -> bool {
    let bytes = bytemuck::bytes_of(value);
    match target.get_mut(offset..offset + bytes.len()) {
        Some(slot) => {
            slot.copy_from_slice(bytes);
            true
        }
        None => false,
    }
}

/// Pushes uniforms for one draw and hands out texture units in order,
/// starting from 0.
pub struct UniformBinder<'a> {
    backend: &'a mut dyn GraphicsBackend,
    next_texture_unit: u32,
}

impl<'a> UniformBinder<'a> {
    pub fn new(backend: &'a mut dyn GraphicsBackend) -> Self {
        Self {
            backend,
            next_texture_unit: 0,
        }
    }

    pub fn set(&mut self, name: &str, value: UniformValue) {
        self.backend.set_uniform(name, &value);
    }

    pub fn set_texture(&mut self, name: &str, texture: TextureId) -> u32 {
        let unit = self.next_texture_unit;
        self.next_texture_unit += 1;

        self.backend.bind_texture(unit, texture);
        self.backend.set_uniform(name, &UniformValue::TextureUnit(unit));
        unit
    }

    pub fn texture_units_used(&self) -> u32 {
        self.next_texture_unit
    }

    pub fn backend(&mut self) -> &mut dyn GraphicsBackend {
        self.backend
    }
}
