pub mod camera;
pub mod config;
pub mod time;
pub mod transform;

pub use camera::Frustum;
pub use config::{AppConfig, ConfigError};
pub use time::FrameClock;
pub use transform::{FrameTransform, TransformComposer};
