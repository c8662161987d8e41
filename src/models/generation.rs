use base64::{engine::general_purpose, Engine as _};
use serde::{Deserialize, Serialize};

use crate::error::{RelayError, Result};

/// Which artifact a route wants back from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    Image,
    Text,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImagePayload {
    pub mime_type: String,
    /// Raw base64, never a data URL.
    pub data: String,
}

impl ImagePayload {
    pub fn from_bytes(bytes: &[u8], mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            data: general_purpose::STANDARD.encode(bytes),
        }
    }

    /// Accepts raw base64 or a `data:<mime>;base64,` URL. The mime type of a data URL
    /// wins over `default_mime`.
    pub fn from_encoded(encoded: &str, default_mime: &str) -> Result<Self> {
        let trimmed = encoded.trim();
        let data = strip_data_url_prefix(trimmed);
        let mime_type = data_url_mime(trimmed).unwrap_or(default_mime).to_string();

        if data.is_empty() {
            return Err(RelayError::validation("Image data is empty"));
        }
        general_purpose::STANDARD
            .decode(data)
            .map_err(|_| RelayError::validation("Image must be valid base64"))?;

        Ok(Self {
            mime_type,
            data: data.to_string(),
        })
    }
}

/// Drops everything up to and including the first comma of a data URL. Anything that
/// is not a data URL is returned unchanged.
pub fn strip_data_url_prefix(encoded: &str) -> &str {
    if !encoded.starts_with("data:") {
        return encoded;
    }
    match encoded.split_once(',') {
        Some((_, payload)) => payload,
        None => encoded,
    }
}

fn data_url_mime(encoded: &str) -> Option<&str> {
    let header = encoded.strip_prefix("data:")?.split_once(',')?.0;
    let mime = header.split(';').next()?;
    if mime.is_empty() {
        None
    } else {
        Some(mime)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GenerationRequest {
    pub prompt: Option<String>,
    pub image: Option<ImagePayload>,
}

impl GenerationRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.prompt = Some(prompt.into());
        self
    }

    pub fn with_image(mut self, image: ImagePayload) -> Self {
        self.image = Some(image);
        self
    }

    /// The prompt, if it carries anything besides whitespace.
    pub fn prompt_text(&self) -> Option<&str> {
        self.prompt.as_deref().filter(|p| !p.trim().is_empty())
    }
}

/// Base64 image data or generated text, depending on the route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NormalizedResult {
    pub result: String,
}
