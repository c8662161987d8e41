use std::sync::Mutex;
use std::time::Instant;

use reqwest::{header, Client};
use serde_json::Value;

use crate::{
    config::GithubConfig,
    error::{check_response, RelayError, Result},
    models::StarCount,
};

struct CachedStars {
    fetched_at: Instant,
    stars: u64,
}

/// Reads the repository star count shown in the page header.
pub struct GithubClient {
    client: Client,
    config: GithubConfig,
    cache: Mutex<Option<CachedStars>>,
}

impl GithubClient {
    pub fn new(config: GithubConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| RelayError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            config,
            cache: Mutex::new(None),
        })
    }

    fn cached(&self) -> Option<u64> {
        let cache = self.cache.lock().ok()?;
        cache
            .as_ref()
            .filter(|entry| entry.fetched_at.elapsed() < self.config.cache_ttl)
            .map(|entry| entry.stars)
    }

    fn store(&self, stars: u64) {
        if let Ok(mut cache) = self.cache.lock() {
            *cache = Some(CachedStars {
                fetched_at: Instant::now(),
                stars,
            });
        }
    }

    pub async fn fetch_stars(&self) -> Result<u64> {
        if let Some(stars) = self.cached() {
            return Ok(stars);
        }

        let (owner, repo) = match (&self.config.owner, &self.config.repo) {
            (Some(owner), Some(repo)) => (owner, repo),
            _ => return Err(RelayError::Config("OWNER and REPO must be set".into())),
        };

        let url = format!(
            "{}/repos/{}/{}",
            self.config.base_url.trim_end_matches('/'),
            owner,
            repo
        );

        let mut request = self
            .client
            .get(&url)
            .header(header::ACCEPT, "application/vnd.github+json");
        if let Some(token) = &self.config.token {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| RelayError::from_transport(e, self.config.timeout))?;
        let body = check_response(response, self.config.timeout).await?;

        let stars = body
            .get("stargazers_count")
            .and_then(Value::as_u64)
            .ok_or_else(|| RelayError::api(500, "GitHub response has no stargazers_count"))?;

        self.store(stars);
        Ok(stars)
    }

    /// The stars route never fails: any error is logged and replaced by the fallback.
    pub async fn stars_or_default(&self) -> StarCount {
        match self.fetch_stars().await {
            Ok(stars) => StarCount { stars },
            Err(e) => {
                log::warn!("Failed to fetch GitHub stars: {}", e);
                StarCount::fallback()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::{web, App, HttpRequest, HttpResponse, HttpServer};
    use serde_json::json;
    use std::sync::Arc;

    type Seen = Arc<Mutex<Vec<(Option<String>, String)>>>;

    /// Serves a fixed answer and records the authorization and user-agent headers.
    fn fake_github(status: u16, body: Value, seen: Seen) -> String {
        let server = HttpServer::new(move || {
            let body = body.clone();
            let seen = seen.clone();
            App::new().route(
                "/repos/{owner}/{repo}",
                web::get().to(move |req: HttpRequest| {
                    let header_value = |name: &str| {
                        req.headers()
                            .get(name)
                            .and_then(|v| v.to_str().ok())
                            .map(str::to_string)
                    };
                    seen.lock().unwrap().push((
                        header_value("authorization"),
                        header_value("user-agent").unwrap_or_default(),
                    ));
                    let body = body.clone();
                    async move {
                        HttpResponse::build(actix_web::http::StatusCode::from_u16(status).unwrap())
                            .json(body)
                    }
                }),
            )
        })
        .workers(1)
        .disable_signals()
        .bind(("127.0.0.1", 0))
        .unwrap();

        let addr = server.addrs()[0];
        actix_web::rt::spawn(server.run());
        format!("http://{}", addr)
    }

    fn github(base_url: &str) -> GithubClient {
        GithubClient::new(
            GithubConfig::new()
                .with_base_url(base_url)
                .with_repository("octo", "watermark"),
        )
        .unwrap()
    }

    #[actix_web::test]
    async fn test_fetch_and_cache() {
        let seen = Seen::default();
        let base = fake_github(200, json!({"stargazers_count": 42}), seen.clone());
        let client = github(&base);

        assert_eq!(client.fetch_stars().await.unwrap(), 42);
        assert_eq!(client.stars_or_default().await, StarCount { stars: 42 });

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0], (None, "watermark-remover-app".to_string()));
    }

    #[actix_web::test]
    async fn test_token_sent_as_bearer() {
        let seen = Seen::default();
        let base = fake_github(200, json!({"stargazers_count": 7}), seen.clone());
        let client = GithubClient::new(
            GithubConfig::new()
                .with_base_url(&base)
                .with_repository("octo", "watermark")
                .with_token("ghp_secret"),
        )
        .unwrap();

        assert_eq!(client.fetch_stars().await.unwrap(), 7);
        assert_eq!(seen.lock().unwrap()[0].0.as_deref(), Some("Bearer ghp_secret"));
    }

    #[actix_web::test]
    async fn test_forbidden_falls_back() {
        let seen = Seen::default();
        let base = fake_github(403, json!({"message": "rate limited"}), seen.clone());
        let client = github(&base);

        let err = client.fetch_stars().await.unwrap_err();
        assert_eq!(err.http_status(), 403);
        assert_eq!(client.stars_or_default().await, StarCount::fallback());
        // failures are not cached
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[actix_web::test]
    async fn test_missing_repository_falls_back() {
        let client = GithubClient::new(GithubConfig::new()).unwrap();
        assert!(matches!(client.fetch_stars().await, Err(RelayError::Config(_))));
        assert_eq!(client.stars_or_default().await.stars, 0);
    }

    #[actix_web::test]
    async fn test_malformed_body_falls_back() {
        let base = fake_github(200, json!({"name": "watermark"}), Seen::default());
        assert_eq!(github(&base).stars_or_default().await, StarCount::fallback());
    }
}
