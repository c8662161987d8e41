//! Gateway between a browser UI and Google Gemini: uploads are downscaled, relayed as
//! generate-content calls, and the single artifact the UI needs is extracted from the
//! reply. Every failure is normalized into one error shape.

pub mod config;
pub mod error;
pub mod gemini;
pub mod github;
pub mod logger;
pub mod models;
pub mod preprocess;
pub mod server;
pub mod usage;

pub use config::{Config, GeminiConfig, GithubConfig};
pub use error::{ErrorKind, NormalizedError, RelayError, Result};
pub use gemini::{ContentGateway, GeminiClient, GenerationService};
pub use github::GithubClient;
pub use models::*;
pub use preprocess::{prepare_image, scaled_dimensions, PreparedImage, ResizeBounds};
pub use usage::{MemoryUsageStore, UsageStore, UsageTracker};
