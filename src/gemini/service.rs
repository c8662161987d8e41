use std::sync::Arc;

use crate::{
    config::GeminiConfig,
    error::Result,
    gemini::{build_request, extract, ContentGateway, GenerationProfile},
    logger,
    models::{GenerationRequest, NormalizedResult, OutputKind},
};

/// Both routes share this path: normalize the input, call the gateway, extract the
/// artifact for the requested output kind.
#[derive(Clone)]
pub struct GenerationService {
    gateway: Arc<dyn ContentGateway>,
    image_profile: GenerationProfile,
    text_profile: GenerationProfile,
}

impl GenerationService {
    pub fn new(gateway: Arc<dyn ContentGateway>, config: &GeminiConfig) -> Self {
        Self {
            gateway,
            image_profile: GenerationProfile::for_kind(OutputKind::Image, config),
            text_profile: GenerationProfile::for_kind(OutputKind::Text, config),
        }
    }

    pub fn profile(&self, kind: OutputKind) -> &GenerationProfile {
        match kind {
            OutputKind::Image => &self.image_profile,
            OutputKind::Text => &self.text_profile,
        }
    }

    pub async fn generate(
        &self,
        request: &GenerationRequest,
        kind: OutputKind,
    ) -> Result<NormalizedResult> {
        let profile = self.profile(kind);
        let payload = build_request(request, profile)?;

        let _timer = logger::timer(&format!("gemini {:?} generation", kind));
        let response = self.gateway.generate_content(&profile.model, &payload).await?;

        extract(&response, kind)
    }
}
