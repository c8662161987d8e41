use crate::config::GeminiConfig;
use crate::error::{RelayError, Result};
use crate::models::{
    Content, GenerateContentRequest, GenerationConfig, GenerationRequest, HarmBlockThreshold,
    HarmCategory, Modality, OutputKind, Part, SafetySetting,
};

/// Fixed model and configuration used for one kind of output.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationProfile {
    pub model: String,
    pub safety_settings: Vec<SafetySetting>,
    pub response_modalities: Vec<Modality>,
}

impl GenerationProfile {
    pub fn image(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            safety_settings: Vec::new(),
            response_modalities: vec![Modality::Text, Modality::Image],
        }
    }

    pub fn text(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            safety_settings: HarmCategory::ALL
                .iter()
                .map(|&category| SafetySetting {
                    category,
                    threshold: HarmBlockThreshold::BlockOnlyHigh,
                })
                .collect(),
            response_modalities: Vec::new(),
        }
    }

    pub fn for_kind(kind: OutputKind, config: &GeminiConfig) -> Self {
        match kind {
            OutputKind::Image => Self::image(&config.image_model),
            OutputKind::Text => Self::text(&config.text_model),
        }
    }
}

/// Builds the Gemini payload: the prompt text first when present, then the image as
/// one inline-data part.
pub fn build_request(
    request: &GenerationRequest,
    profile: &GenerationProfile,
) -> Result<GenerateContentRequest> {
    let mut parts = Vec::with_capacity(2);

    if let Some(prompt) = request.prompt_text() {
        parts.push(Part::text(prompt));
    }
    if let Some(image) = &request.image {
        if image.data.is_empty() {
            return Err(RelayError::validation("Image data is empty"));
        }
        parts.push(Part::inline(&image.mime_type, &image.data));
    }

    if parts.is_empty() {
        return Err(RelayError::validation("A prompt or an image is required"));
    }

    let generation_config = if profile.response_modalities.is_empty() {
        None
    } else {
        Some(GenerationConfig {
            response_modalities: profile.response_modalities.clone(),
        })
    };

    Ok(GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: Some(parts),
        }],
        safety_settings: profile.safety_settings.clone(),
        generation_config,
    })
}
