use std::sync::Arc;

use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use tracing_subscriber::EnvFilter;

use plantbased::blob_store::CloudinaryClient;
use plantbased::config::AppConfig;
use plantbased::db::PgConnector;
use plantbased::db_migrate::{MigrationTool, LATEST_SCHEMA_VERSION};
use plantbased::email_sender::SmtpNotifier;
use plantbased::payment::WebhookVerifier;
use plantbased::server::handlers::{self, MAX_FORM_BYTES};
use plantbased::state::{Services, SiteStateManager};
use plantbased::templates::{load_templates, watch_templates};
use plantbased::tokens::TokenIssuer;

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    tracing::info!("Starting PlantBased backend");

    let config = AppConfig::from_env()?;
    if !config.is_production() {
        tracing::info!("Running in {} mode", config.env);
    }

    let db = Arc::new(PgConnector::new(&config.database.url, config.database.max_connections).await?);
    let version = MigrationTool::new(config.schema_dir.clone())
        .migrate_to_version(db.pool(), LATEST_SCHEMA_VERSION)
        .await?;
    tracing::info!("Database schema at version {}", version);

    // --- Templates ---
    let template_cache = load_templates(&config.template_dir)?;
    let watcher_cache = template_cache.clone();
    let watcher_dir = config.template_dir.clone();
    tokio::spawn(async move {
        if let Err(e) = watch_templates(watcher_cache, watcher_dir).await {
            tracing::error!("Template watcher failed: {}", e);
        }
    });

    let blobs = Arc::new(CloudinaryClient::new(
        &config.cloudinary.cloud_name,
        config.cloudinary.api_key.clone(),
        config.cloudinary.api_secret.clone(),
    ));
    let notifier = Arc::new(SmtpNotifier::new(&config.smtp, template_cache)?);

    let state_manager = SiteStateManager::new(
        Services {
            programs: db.clone(),
            testimonials: db.clone(),
            admins: db,
            blobs,
            notifier,
        },
        config.cloudinary.programs_folder(),
        TokenIssuer::new(
            &config.jwt_secret,
            config.jwt_expiry_hours,
            config.jwt_refresh_expiry_hours,
        ),
        WebhookVerifier::new(config.paystack_secret_key.clone()),
    );
    let state_data = web::Data::new(state_manager);

    tracing::info!("Starting HTTP server on {}:{}", config.host, config.port);
    HttpServer::new(move || {
        App::new()
            .app_data(state_data.clone())
            .app_data(web::PayloadConfig::new(MAX_FORM_BYTES))
            .wrap(Logger::default())
            .configure(handlers::configure)
    })
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
