pub mod scene;
pub mod transform;
pub mod transform_system;

pub use scene::{Name, Scene};
pub use transform::{GlobalVersion, Transform};
pub use transform_system::TransformSystem;
