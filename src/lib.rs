//! Hardware scene renderer for a BSP-partitioned first-person engine.
//!
//! The crate turns a [`world::Viewpoint`] inside a [`world::Level`] into a
//! stream of draw commands handed to a [`renderer::Gpu`]:
//!
//! * [`engine::SceneBuilder`] walks the BSP and fills per-category draw lists,
//! * [`engine::passes`] issues the multi-pass draw sequence,
//! * [`engine::SceneDrawer`] recurses through portals and stereo eyes,
//! * [`models`] owns keyframe vertex buffers and the model draw adapter.

pub mod config;
pub mod engine;
pub mod error;
pub mod models;
pub mod renderer;
pub mod stereo;
pub mod world;

pub use config::RenderConfig;
pub use engine::{Scene, SceneDrawer};
pub use error::RenderError;
