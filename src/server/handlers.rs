use std::fmt;

use actix_multipart::Multipart;
use actix_web::{http::StatusCode, web, HttpMessage, HttpRequest, HttpResponse, ResponseError};
use futures::TryStreamExt;

use crate::{
    error::{normalize, ErrorKind, NormalizedError, RelayError},
    models::{
        ClientSettings, ErrorBody, GenerationRequest, ImagePayload, OutputKind, PromptBody,
        ResultBody,
    },
    preprocess::prepare_image,
    server::{middleware::RequestTrace, AppState},
};

pub const WATERMARK_PROMPT: &str =
    "Remove the watermark from this image while preserving the original image quality and details.";
pub const PUBLIC_FAILURE_MESSAGE: &str = "Failed to generate content";

/// A route failure after normalization. Validation failures keep their message; every
/// other failure is reported with a fixed one.
#[derive(Debug)]
pub struct RouteError(pub NormalizedError);

impl RouteError {
    pub fn report(err: RelayError, req: &HttpRequest) -> Self {
        let context = req
            .extensions()
            .get::<RequestTrace>()
            .map(|trace| trace.request_id.clone());
        RouteError(normalize(&err, context.as_deref()))
    }
}

impl fmt::Display for RouteError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.message)
    }
}

impl ResponseError for RouteError {
    fn status_code(&self) -> StatusCode {
        match self.0.kind {
            ErrorKind::ValidationError => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        let error = match self.0.kind {
            ErrorKind::ValidationError => self.0.message.clone(),
            _ => PUBLIC_FAILURE_MESSAGE.to_string(),
        };
        HttpResponse::build(self.status_code()).json(ErrorBody { error })
    }
}

/// Reads the `image` field of the form. Other fields are drained and ignored, but every
/// byte of the body counts toward `limit`.
async fn read_image_field(payload: &mut Multipart, limit: usize) -> Result<Vec<u8>, RelayError> {
    let mut image = None;
    let mut total = 0usize;

    while let Some(mut field) = payload.try_next().await.map_err(invalid_multipart)? {
        let is_image = field.name() == Some("image") && image.is_none();
        let mut bytes = Vec::new();

        while let Some(chunk) = field.try_next().await.map_err(invalid_multipart)? {
            total += chunk.len();
            if total > limit {
                return Err(RelayError::validation(format!(
                    "Upload exceeds the {} byte limit",
                    limit
                )));
            }
            if is_image {
                bytes.extend_from_slice(&chunk);
            }
        }

        if is_image {
            image = Some(bytes);
        }
    }

    match image {
        Some(bytes) if !bytes.is_empty() => Ok(bytes),
        _ => Err(RelayError::validation("Image is required")),
    }
}

fn invalid_multipart(err: actix_multipart::MultipartError) -> RelayError {
    RelayError::validation(format!("Invalid multipart body: {}", err))
}

/// `POST /api/gemini`: multipart `image` → watermark-free image as base64.
pub async fn remove_watermark(
    req: HttpRequest,
    state: web::Data<AppState>,
    mut payload: Multipart,
) -> Result<HttpResponse, RouteError> {
    let upload = read_image_field(&mut payload, state.config.max_upload_bytes)
        .await
        .map_err(|e| RouteError::report(e, &req))?;

    let bounds = state.config.resize;
    let prepared = web::block(move || prepare_image(&upload, bounds))
        .await
        .map_err(|e| RouteError::report(RelayError::Internal(e.to_string()), &req))?
        .map_err(|e| RouteError::report(e, &req))?;

    let request = GenerationRequest::new()
        .with_prompt(WATERMARK_PROMPT)
        .with_image(ImagePayload::from_bytes(&prepared.bytes, prepared.mime_type()));

    let result = state
        .service
        .generate(&request, OutputKind::Image)
        .await
        .map_err(|e| RouteError::report(e, &req))?;

    Ok(HttpResponse::Ok().json(ResultBody {
        result: result.result,
    }))
}

/// `POST /api/gemini/prompt`: `{prompt, imageBase64?}` → generated text.
pub async fn generate_from_prompt(
    req: HttpRequest,
    state: web::Data<AppState>,
    body: web::Json<PromptBody>,
) -> Result<HttpResponse, RouteError> {
    let body = body.into_inner();

    let prompt = match body.prompt.filter(|p| !p.trim().is_empty()) {
        Some(prompt) => prompt,
        None => {
            return Err(RouteError::report(
                RelayError::validation("Prompt is required"),
                &req,
            ))
        }
    };

    let mut request = GenerationRequest::new().with_prompt(prompt);
    if let Some(encoded) = body.image_base64.filter(|s| !s.trim().is_empty()) {
        let image = ImagePayload::from_encoded(&encoded, "image/jpeg")
            .map_err(|e| RouteError::report(e, &req))?;
        request = request.with_image(image);
    }

    let result = state
        .service
        .generate(&request, OutputKind::Text)
        .await
        .map_err(|e| RouteError::report(e, &req))?;

    Ok(HttpResponse::Ok().json(ResultBody {
        result: result.result,
    }))
}

/// `GET /api/github-stars`: always 200.
pub async fn github_stars(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(state.github.stars_or_default().await)
}

/// `GET /api/settings`: values the client needs from the server configuration.
pub async fn client_settings(state: web::Data<AppState>) -> HttpResponse {
    HttpResponse::Ok().json(ClientSettings {
        generation_limit: state.config.generation_limit,
    })
}

/// Rejected JSON bodies get the same error shape as every other failure.
pub fn json_error_handler(
    err: actix_web::error::JsonPayloadError,
    req: &HttpRequest,
) -> actix_web::Error {
    RouteError::report(RelayError::validation(format!("Invalid JSON body: {}", err)), req).into()
}
