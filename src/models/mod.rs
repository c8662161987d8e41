pub mod api;
pub mod gemini;
pub mod generation;

pub use api::*;
pub use gemini::*;
pub use generation::*;
