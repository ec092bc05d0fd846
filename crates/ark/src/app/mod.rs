//! Windowed front end: a winit event loop feeding a [`crate::World`] and a
//! pixels painter reading its scene graph.

mod glyphs;
mod loop_runner;
mod renderer;

pub use loop_runner::{run_app, AppError, LoopConfig};
pub use renderer::Renderer;
