pub mod camera;
pub mod config;
pub mod demo;
pub mod engine;
pub mod error;
pub mod frame_timer;
pub mod inspector;
pub mod light;
pub mod rendering;
pub mod scene_graph;
pub mod window;

pub use camera::{Camera, Projection};
pub use config::EngineConfig;
pub use error::RenderError;
pub use light::{EnvironmentLight, Light, LightInstance, PointLight, MAX_POINT_LIGHTS};
pub use scene_graph::{GlobalVersion, Name, Scene, Transform, TransformSystem};
