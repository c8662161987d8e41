pub mod handlers;
pub mod middleware;


use std::sync::Arc;

use actix_web::{web, App, HttpServer};

use crate::{
    config::Config,
    gemini::{ContentGateway, GenerationService},
    github::GithubClient,
};

pub use middleware::{RequestTagging, RequestTrace, REQUEST_ID_HEADER};

/// Shared, read-only state handed to every handler.
pub struct AppState {
    pub config: Arc<Config>,
    pub service: GenerationService,
    pub github: GithubClient,
}

impl AppState {
    pub fn new(
        config: Arc<Config>,
        gateway: Arc<dyn ContentGateway>,
        github: GithubClient,
    ) -> Self {
        let service = GenerationService::new(gateway, &config.gemini);
        Self {
            config,
            service,
            github,
        }
    }
}

/// Registers the routes and body limits. The request-tagging middleware is added
/// separately with [`RequestTagging`].
pub fn configure(cfg: &mut web::ServiceConfig, config: &Config) {
    let prefix = config.gateway_path_prefix.trim_end_matches('/');

    cfg.app_data(
        web::JsonConfig::default()
            .limit(config.max_upload_bytes)
            .error_handler(handlers::json_error_handler),
    )
    .service(web::resource(prefix.to_string()).route(web::post().to(handlers::remove_watermark)))
    .service(
        web::resource(format!("{}/prompt", prefix))
            .route(web::post().to(handlers::generate_from_prompt)),
    )
    .service(web::resource("/api/github-stars").route(web::get().to(handlers::github_stars)))
    .service(web::resource("/api/settings").route(web::get().to(handlers::client_settings)));
}

pub async fn run(state: AppState) -> std::io::Result<()> {
    let config = state.config.clone();
    let state = web::Data::new(state);

    log::info!(
        "Serving {} on {}:{}",
        config.gateway_path_prefix,
        config.host,
        config.port
    );

    let app_config = config.clone();
    HttpServer::new(move || {
        let app_config = app_config.clone();
        App::new()
            .app_data(state.clone())
            .wrap(RequestTagging::new(&app_config.gateway_path_prefix))
            .configure(move |cfg| configure(cfg, &app_config))
    })
    .bind(config.bind_address())?
    .run()
    .await
}
