#![warn(clippy::all, clippy::pedantic)]

use std::env;

use actix_web::{App, HttpServer, web};
use tracing::info;
use uppe_service::{Config, Services};

mod error;
mod routes;

use error::AppError;

/// Shared by every handler.
pub type AppState = Services;

/// Config path baked in from `.env` at build time, used when `UPPE_CONFIG` is unset.
const BUILD_CONFIG_PATH: Option<&str> = option_env!("UPPE_CONFIG");

#[actix_web::main]
async fn main() -> Result<(), AppError> {
    logger::init();

    let config_path = env::var("UPPE_CONFIG").ok().or_else(|| BUILD_CONFIG_PATH.map(String::from));
    let config = Config::from_config(config_path.as_ref())?;
    let services = Services::start(&config).await?;

    run_server(&config, web::Data::new(services)).await
}

async fn run_server(config: &Config, state: web::Data<AppState>) -> Result<(), AppError> {
    info!("Listening on {}:{}", config.server.bind, config.server.port);

    HttpServer::new(move || App::new().app_data(state.clone()).configure(routes::routes))
        .bind((config.server.bind.as_str(), config.server.port))?
        .run()
        .await?;

    Ok(())
}
