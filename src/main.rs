use actix_web::middleware::NormalizePath;
use actix_web::web::Data;
use actix_web::{App, HttpServer, Responder, get, web};
use dotenvy::dotenv;

mod api;
mod auth;
mod config;
mod db;
mod docs;
mod error;
mod mailer;
mod model;
mod models;
mod routes;
mod utils;

#[cfg(test)]
mod tests;

use config::Config;
use db::init_db;

use crate::mailer::Mailer;
use crate::utils::template_cache;
use tracing::info;
use tracing_appender::rolling;

#[get("/")]
async fn index() -> impl Responder {
    "HRM backend"
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenv().ok();

    let config = Config::from_env();

    // Rolling daily log
    let file_appender = rolling::daily("logs", "app.log");
    let (non_blocking, _guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_max_level(tracing::Level::DEBUG)
        .with_ansi(false)
        .with_target(false) // removes module path
        .with_level(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .pretty()
        .init();

    info!("Server starting...");

    let pool = init_db(&config.database_url).await;

    let mailer = Data::new(Mailer::from_config(&config).expect("Failed to initialize mailer"));

    let pool_for_cache_warmup = pool.clone();
    actix_web::rt::spawn(async move {
        if let Err(e) = template_cache::warmup_template_cache(&pool_for_cache_warmup).await {
            eprintln!("Failed to warmup template cache: {:?}", e);
        }
    });

    let server_addr = config.server_addr.clone();
    let config_data = config.clone();

    HttpServer::new(move || {
        App::new()
            .wrap(actix_web::middleware::Logger::default())
            .wrap(NormalizePath::trim())
            .app_data(Data::new(pool.clone()))
            .app_data(Data::new(config.clone()))
            .app_data(mailer.clone())
            .service(index)
            .route("/api-doc/openapi.json", web::get().to(docs::openapi_json))
            .configure(|cfg| routes::configure(cfg, config_data.clone()))
    })
    .bind(server_addr)?
    .run()
    .await
}
