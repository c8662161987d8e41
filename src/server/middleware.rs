use std::rc::Rc;

use actix_web::{
    dev::{forward_ready, Service, ServiceRequest, ServiceResponse, Transform},
    http::header::{HeaderName, HeaderValue, USER_AGENT},
    Error, HttpMessage,
};
use chrono::{DateTime, SecondsFormat, Utc};
use futures::future::{ready, LocalBoxFuture, Ready};
use uuid::Uuid;

pub const REQUEST_ID_HEADER: &str = "x-request-id";

/// Correlation data for one inbound call. Lives in the request extensions until the
/// response is sent.
#[derive(Debug, Clone)]
pub struct RequestTrace {
    pub request_id: String,
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub pathname: String,
}

impl RequestTrace {
    pub fn new(method: &str, pathname: &str) -> Self {
        Self {
            request_id: Uuid::new_v4().simple().to_string(),
            timestamp: Utc::now(),
            method: method.to_string(),
            pathname: pathname.to_string(),
        }
    }
}

/// Tags every request under `prefix` with an `x-request-id`, on the way in and on the
/// way out. Bodies are never touched.
pub struct RequestTagging {
    prefix: Rc<str>,
}

impl RequestTagging {
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: Rc::from(prefix),
        }
    }
}

impl<S, B> Transform<S, ServiceRequest> for RequestTagging
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type InitError = ();
    type Transform = RequestTaggingMiddleware<S>;
    type Future = Ready<Result<Self::Transform, Self::InitError>>;

    fn new_transform(&self, service: S) -> Self::Future {
        ready(Ok(RequestTaggingMiddleware {
            service,
            prefix: self.prefix.clone(),
        }))
    }
}

pub struct RequestTaggingMiddleware<S> {
    service: S,
    prefix: Rc<str>,
}

impl<S, B> Service<ServiceRequest> for RequestTaggingMiddleware<S>
where
    S: Service<ServiceRequest, Response = ServiceResponse<B>, Error = Error> + 'static,
    S::Future: 'static,
    B: 'static,
{
    type Response = ServiceResponse<B>;
    type Error = Error;
    type Future = LocalBoxFuture<'static, Result<Self::Response, Self::Error>>;

    forward_ready!(service);

    fn call(&self, mut req: ServiceRequest) -> Self::Future {
        if !req.path().starts_with(&*self.prefix) {
            return Box::pin(self.service.call(req));
        }

        let trace = RequestTrace::new(req.method().as_str(), req.path());
        let user_agent = req
            .headers()
            .get(USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("unknown")
            .to_string();

        log::info!(
            "[{}] [ID: {}] Gemini API request: {} {} (User-Agent: {})",
            trace.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true),
            trace.request_id,
            trace.method,
            trace.pathname,
            user_agent
        );

        // a simple uuid is plain hex, always a valid header value
        let header_value = HeaderValue::from_str(&trace.request_id).ok();
        if let Some(value) = &header_value {
            req.headers_mut()
                .insert(HeaderName::from_static(REQUEST_ID_HEADER), value.clone());
        }
        req.extensions_mut().insert(trace);

        let fut = self.service.call(req);
        Box::pin(async move {
            let mut res = fut.await?;
            if let Some(value) = header_value {
                res.headers_mut()
                    .insert(HeaderName::from_static(REQUEST_ID_HEADER), value);
            }
            Ok(res)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{test, web, App, HttpRequest, HttpResponse};
    use std::collections::HashSet;

    async fn echo(req: HttpRequest) -> HttpResponse {
        let forwarded = req
            .headers()
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let traced = req
            .extensions()
            .get::<RequestTrace>()
            .map(|t| t.request_id.clone())
            .unwrap_or_default();
        HttpResponse::Ok().body(format!("{}|{}", forwarded, traced))
    }

    #[actix_web::test]
    async fn test_tags_request_and_response() {
        let app = test::init_service(
            App::new()
                .wrap(RequestTagging::new("/api/gemini"))
                .route("/api/gemini", web::post().to(echo)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/gemini")
            .insert_header((USER_AGENT, "tests"))
            .to_request();
        let res = test::call_service(&app, req).await;

        let header = res
            .headers()
            .get(REQUEST_ID_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert!(!header.is_empty());

        let body = test::read_body(res).await;
        let body = std::str::from_utf8(&body).unwrap();
        assert_eq!(body, format!("{}|{}", header, header));
    }

    #[actix_web::test]
    async fn test_ids_are_distinct() {
        let app = test::init_service(
            App::new()
                .wrap(RequestTagging::new("/api/gemini"))
                .route("/api/gemini", web::post().to(echo)),
        )
        .await;

        let mut ids = HashSet::new();
        for _ in 0..16 {
            let req = test::TestRequest::post().uri("/api/gemini").to_request();
            let res = test::call_service(&app, req).await;
            let id = res
                .headers()
                .get(REQUEST_ID_HEADER)
                .unwrap()
                .to_str()
                .unwrap()
                .to_string();
            ids.insert(id);
        }
        assert_eq!(ids.len(), 16);
    }

    #[actix_web::test]
    async fn test_other_paths_untouched() {
        let app = test::init_service(
            App::new()
                .wrap(RequestTagging::new("/api/gemini"))
                .route("/api/github-stars", web::get().to(echo)),
        )
        .await;

        let req = test::TestRequest::get().uri("/api/github-stars").to_request();
        let res = test::call_service(&app, req).await;
        assert!(res.headers().get(REQUEST_ID_HEADER).is_none());

        let body = test::read_body(res).await;
        assert_eq!(&body[..], b"|");
    }

    #[actix_web::test]
    async fn test_client_supplied_id_is_replaced() {
        let app = test::init_service(
            App::new()
                .wrap(RequestTagging::new("/api/gemini"))
                .route("/api/gemini/prompt", web::post().to(echo)),
        )
        .await;

        let req = test::TestRequest::post()
            .uri("/api/gemini/prompt")
            .insert_header((REQUEST_ID_HEADER, "spoofed"))
            .to_request();
        let res = test::call_service(&app, req).await;
        let id = res
            .headers()
            .get(REQUEST_ID_HEADER)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        assert_ne!(id, "spoofed");
        assert_eq!(id.len(), 32);
    }
}
