use std::str::FromStr;
use std::sync::Arc;

use actix_web::{web, App, HttpServer};
use anyhow::{Context, Result};
use dotenv::dotenv;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};

use crate::config::gateway_config::GatewayConfig;
use crate::logger::init_logger;
use crate::services::blast_service::{BlastService, CampaignProcessor};
use crate::services::delivery_service::HttpDeliveryAdapter;
use crate::services::queue_service::CampaignScheduler;
use crate::services::status_service::SqliteStatusStore;

mod app;
mod config;
mod errors;
mod handlers;
mod logger;
mod models;
mod services;

#[cfg(test)]
mod tests;

async fn setup_database(database_url: &str) -> Result<Pool<Sqlite>> {
    // La carpeta "data" por defecto puede no existir todavía
    std::fs::create_dir_all("data").context("No se pudo crear directorio 'data'")?;

    log::info!("Conectando a SQLite en {}", database_url);

    let options = SqliteConnectOptions::from_str(database_url)
        .with_context(|| format!("DATABASE_URL inválida: {database_url}"))?
        .create_if_missing(true);

    SqlitePoolOptions::new()
        .max_connections(5)
        .connect_with(options)
        .await
        .context("No se pudo conectar a la base de datos SQLite.")
}

#[actix_web::main]
async fn main() -> Result<()> {
    dotenv().ok(); // Cargar .env al inicio
    init_logger();

    let config = GatewayConfig::from_env()?;

    let db_pool = setup_database(&config.database_url).await?;

    // Store de estados
    let status_store = SqliteStatusStore::new(db_pool.clone());
    status_store
        .run_migrations()
        .await
        .context("Fallo en migraciones de 'blasts'")?;

    // Motor de campañas
    let adapter = HttpDeliveryAdapter::new(&config)?;
    let processor = CampaignProcessor::new(
        Arc::new(status_store.clone()),
        Arc::new(adapter),
        config.dispatch.clone(),
    );
    let scheduler = CampaignScheduler::new(config.dispatch.queue_capacity);
    let blast_service = BlastService::new(processor, scheduler);

    // Levantar servidor
    log::info!("Levantando servidor en {}:{}", config.host, config.port);
    HttpServer::new(move || {
        App::new()
            .app_data(web::PayloadConfig::new(50 * 1024 * 1024))
            .app_data(web::Data::new(status_store.clone()))
            .app_data(web::Data::new(blast_service.clone()))
            .configure(app::init_app)
    })
    .workers(1)
    .bind((config.host.as_str(), config.port))?
    .run()
    .await?;

    Ok(())
}
