use crate::error::{RelayError, Result};
use crate::models::{GenerateContentResponse, NormalizedResult, OutputKind, PartKind};

/// Pulls the single artifact a route needs out of a Gemini response. Parts are
/// selected by kind, never by position, so a text preamble before the image is fine.
pub fn extract(response: &GenerateContentResponse, kind: OutputKind) -> Result<NormalizedResult> {
    let parts = match response.first_parts() {
        Some(parts) => parts,
        None => {
            let message = response
                .prompt_feedback
                .as_ref()
                .and_then(|f| f.block_reason.as_deref())
                .map(|reason| format!("Prompt blocked by Gemini: {}", reason))
                .unwrap_or_else(|| "No response from Gemini".to_string());
            return Err(RelayError::api(500, message));
        }
    };

    match kind {
        OutputKind::Image => parts
            .iter()
            .filter(|p| p.kind() == PartKind::InlineData)
            .filter_map(|p| p.inline_data.as_ref())
            .find(|inline| !inline.data.is_empty())
            .map(|inline| NormalizedResult {
                result: inline.data.clone(),
            })
            .ok_or_else(|| RelayError::api(500, "Gemini returned no image")),
        OutputKind::Text => {
            let text: String = parts
                .iter()
                .filter(|p| p.kind() == PartKind::Text && !p.is_thought())
                .filter_map(|p| p.text.as_deref())
                .collect();

            if text.is_empty() {
                Err(RelayError::api(500, "Gemini returned no text"))
            } else {
                Ok(NormalizedResult { result: text })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use serde_json::json;

    fn response(value: serde_json::Value) -> GenerateContentResponse {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn test_text_only() {
        let r = response(json!({"candidates":[{"content":{"parts":[{"text":"hello"}]}}]}));
        assert_eq!(extract(&r, OutputKind::Text).unwrap().result, "hello");
    }

    #[test]
    fn test_inline_only() {
        let r = response(json!({
            "candidates": [{"content": {"parts": [{"inlineData": {"data": "QUJD"}}]}}]
        }));
        assert_eq!(extract(&r, OutputKind::Image).unwrap().result, "QUJD");
    }

    #[test]
    fn test_text_preamble_before_image() {
        let r = response(json!({"candidates":[{"content":{"parts":[
            {"text": "Here is the cleaned image:"},
            {"inlineData": {"mimeType": "image/png", "data": "SU1H"}},
            {"inlineData": {"mimeType": "image/png", "data": "U0VDT05E"}}
        ]}}]}));
        assert_eq!(extract(&r, OutputKind::Image).unwrap().result, "SU1H");
    }

    #[test]
    fn test_text_parts_concatenate() {
        let r = response(json!({"candidates":[{"content":{"parts":[
            {"text": "Hello, "},
            {"inlineData": {"data": "QUJD"}},
            {"text": "world"}
        ]}}]}));
        assert_eq!(extract(&r, OutputKind::Text).unwrap().result, "Hello, world");
    }

    #[test]
    fn test_no_parts_is_api_error() {
        for value in [
            json!({}),
            json!({"candidates": []}),
            json!({"candidates": [{"content": {"parts": []}}]}),
            json!({"candidates": [{"content": {}}]}),
        ] {
            let r = response(value);
            assert_eq!(extract(&r, OutputKind::Image).unwrap_err().kind(), ErrorKind::ApiError);
            assert_eq!(extract(&r, OutputKind::Text).unwrap_err().kind(), ErrorKind::ApiError);
        }
    }

    #[test]
    fn test_wrong_kind_is_api_error() {
        let r = response(json!({
            "candidates": [{"content": {"parts": [{"text": "sorry, no image"}]}}]
        }));
        let err = extract(&r, OutputKind::Image).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::ApiError);
        assert_eq!(err.to_string(), "Gemini returned no image");
    }

    #[test]
    fn test_block_reason_surfaces() {
        let r = response(json!({"promptFeedback": {"blockReason": "SAFETY"}}));
        assert_eq!(
            extract(&r, OutputKind::Text).unwrap_err().to_string(),
            "Prompt blocked by Gemini: SAFETY"
        );
    }
}
