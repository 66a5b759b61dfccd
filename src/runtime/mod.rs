//! Run-time state and the render engine.

pub mod data;
pub mod render;

pub use data::DataStore;
pub use render::{DocContext, Renderer};
