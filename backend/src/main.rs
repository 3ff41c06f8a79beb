use actix_web::{App, HttpServer, web};
use recognizer::config::AppConfig;
use recognizer::recognition::{ProxyClient, RecognitionService};
use recognizer::routes::configure_routes;
use std::env;

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    if let Ok(current_dir) = env::current_dir() {
        log::info!("Current working directory: {}", current_dir.display());
    } else {
        log::error!("Failed to get the current working directory.");
    }

    let config = AppConfig::from_env().map_err(|e| {
        log::error!("Invalid configuration: {}", e);
        std::io::Error::new(std::io::ErrorKind::InvalidInput, e.to_string())
    })?;

    let client = ProxyClient::from_config(&config).map_err(|e| {
        log::error!("Failed to build proxy client: {}", e);
        std::io::Error::other(e.to_string())
    })?;
    let service = RecognitionService::new(client);

    log::info!(
        "Forwarding recognition requests to {} (model {}, timeout {}s)",
        config.proxy_url,
        config.model,
        config.request_timeout.as_secs()
    );

    let bind_address = config.bind_address();
    log::info!("Starting server on {}", bind_address);

    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(service.clone()))
            .configure(configure_routes)
    })
    .bind(&bind_address)?
    .run()
    .await
}
