#![deny(missing_docs)]
//! Repo-health ingestion server.
//!
//! Accepts health reports over HTTP and serves the most recent ones from a
//! filesystem or blob-store backend.

mod config;
mod openapi;
mod routes;
mod service;
mod storage;

#[cfg(not(test))]
use actix_web::{App, HttpServer, web};
#[cfg(not(test))]
use dotenvy::dotenv;

#[cfg(not(test))]
use crate::config::ServerConfig;
#[cfg(not(test))]
use crate::routes::{AppState, configure, cors_headers};
#[cfg(not(test))]
use crate::service::IngestService;
#[cfg(not(test))]
use crate::storage::store_from_config;

#[cfg(not(test))]
fn main() -> std::io::Result<()> {
    dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let config = ServerConfig::from_env().map_err(std::io::Error::other)?;

    // The blob backend holds a `reqwest::blocking::Client`, which must be
    // created before the Actix runtime starts.
    let store = store_from_config(&config);
    let state = web::Data::new(AppState {
        service: IngestService::new(store, config.list_limit),
    });

    log::info!(
        "repo-health server listening on {}:{} ({:?} storage)",
        config.host,
        config.port,
        config.storage
    );
    let listen_addr = config.host.clone();
    let listen_port = config.port;

    actix_web::rt::System::new().block_on(async move {
        HttpServer::new(move || {
            App::new()
                .wrap(actix_web::middleware::Logger::default())
                .wrap(cors_headers())
                .app_data(state.clone())
                .configure(configure)
        })
        .bind((listen_addr, listen_port))?
        .run()
        .await
    })
}

#[cfg(test)]
fn main() {}
