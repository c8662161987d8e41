use std::env;
use std::time::Duration;

use crate::preprocess::ResizeBounds;

pub const DEFAULT_GATEWAY_PREFIX: &str = "/api/gemini";
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 10 * 1024 * 1024;
pub const DEFAULT_GENERATION_LIMIT: u32 = 5;

#[derive(Debug, Clone)]
pub struct GeminiConfig {
    pub api_key: Option<String>,
    pub base_url: String,
    pub image_model: String,
    pub text_model: String,
    pub validation_model: String,
    /// Per attempt.
    pub timeout: Duration,
    /// Across all attempts, backoff included.
    pub deadline: Duration,
    pub max_retries: u32,
    pub retry_backoff: Duration,
}

#[derive(Debug, Clone)]
pub struct GithubConfig {
    pub token: Option<String>,
    pub owner: Option<String>,
    pub repo: Option<String>,
    pub base_url: String,
    pub user_agent: String,
    pub cache_ttl: Duration,
    pub timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub gateway_path_prefix: String,
    pub max_upload_bytes: usize,
    pub generation_limit: u32,
    pub validate_api_key: bool,
    pub resize: ResizeBounds,
    pub gemini: GeminiConfig,
    pub github: GithubConfig,
}

impl Default for GeminiConfig {
    fn default() -> Self {
        GeminiConfig {
            api_key: None,
            base_url: "https://generativelanguage.googleapis.com".to_string(),
            image_model: "gemini-2.0-flash-exp-image-generation".to_string(),
            text_model: "gemini-2.0-flash".to_string(),
            validation_model: "gemini-1.5-flash".to_string(),
            timeout: Duration::from_secs(60),
            deadline: Duration::from_secs(120),
            max_retries: 2,
            retry_backoff: Duration::from_millis(500),
        }
    }
}

impl GeminiConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let defaults = Self::default();
        let timeout = env_parse::<u64>("GEMINI_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout);

        GeminiConfig {
            api_key: env_non_empty("GEMINI_API_KEY"),
            base_url: env_non_empty("GEMINI_BASE_URL").unwrap_or(defaults.base_url),
            timeout,
            deadline: timeout.saturating_mul(2).max(defaults.deadline),
            max_retries: env_parse("GEMINI_MAX_RETRIES").unwrap_or(defaults.max_retries),
            ..defaults
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_timeouts(mut self, timeout: Duration, deadline: Duration) -> Self {
        self.timeout = timeout;
        self.deadline = deadline;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff: Duration) -> Self {
        self.max_retries = max_retries;
        self.retry_backoff = backoff;
        self
    }
}

impl Default for GithubConfig {
    fn default() -> Self {
        GithubConfig {
            token: None,
            owner: None,
            repo: None,
            base_url: "https://api.github.com".to_string(),
            user_agent: "watermark-remover-app".to_string(),
            cache_ttl: Duration::from_secs(3600),
            timeout: Duration::from_secs(10),
        }
    }
}

impl GithubConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        GithubConfig {
            token: env_non_empty("GITHUB_TOKEN"),
            owner: env_non_empty("OWNER"),
            repo: env_non_empty("REPO"),
            ..Self::default()
        }
    }

    pub fn with_repository(mut self, owner: impl Into<String>, repo: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self.repo = Some(repo.into());
        self
    }

    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }
}

impl Default for Config {
    fn default() -> Self {
        Config {
            host: "127.0.0.1".to_string(),
            port: 8080,
            gateway_path_prefix: DEFAULT_GATEWAY_PREFIX.to_string(),
            max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
            generation_limit: DEFAULT_GENERATION_LIMIT,
            validate_api_key: false,
            resize: ResizeBounds::default(),
            gemini: GeminiConfig::default(),
            github: GithubConfig::default(),
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reads the process environment once. Call after `dotenv::dotenv()`.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        let generation_limit = env_parse("GENERATION_LIMIT")
            .or_else(|| env_parse("NEXT_PUBLIC_GENERATION_LIMIT"))
            .unwrap_or(defaults.generation_limit);

        Config {
            host: env_non_empty("HOST").unwrap_or(defaults.host),
            port: env_parse("PORT").unwrap_or(defaults.port),
            max_upload_bytes: env_parse("MAX_UPLOAD_BYTES").unwrap_or(defaults.max_upload_bytes),
            generation_limit,
            validate_api_key: env::var("VALIDATE_API_KEY").map_or(false, |val| val == "true"),
            gemini: GeminiConfig::from_env(),
            github: GithubConfig::from_env(),
            ..defaults
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn with_gemini(mut self, config: GeminiConfig) -> Self {
        self.gemini = config;
        self
    }

    pub fn with_github(mut self, config: GithubConfig) -> Self {
        self.github = config;
        self
    }

    pub fn with_generation_limit(mut self, limit: u32) -> Self {
        self.generation_limit = limit;
        self
    }

    pub fn with_max_upload_bytes(mut self, limit: usize) -> Self {
        self.max_upload_bytes = limit;
        self
    }

    pub fn with_resize_bounds(mut self, bounds: ResizeBounds) -> Self {
        self.resize = bounds;
        self
    }

    pub fn bind_address(&self) -> (String, u16) {
        (self.host.clone(), self.port)
    }
}

fn env_non_empty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|val| !val.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|val| val.trim().parse().ok())
}
