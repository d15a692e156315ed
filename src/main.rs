use std::sync::Arc;

use actix_files::Files;
use actix_identity::IdentityMiddleware;
use actix_session::{storage::CookieSessionStore, SessionMiddleware};
use actix_web::{
    cookie::Key,
    middleware,
    web::{self, Data},
    App, HttpResponse, HttpServer, Responder,
};
use log::info;
use sqlx::SqlitePool;

mod auth;
mod config;
mod db;
mod errors;
mod membership;
mod money;
mod payment;
mod routes;
mod storage;
mod structs;
mod utils;

use auth::AdminPolicy;
use config::Config;
use errors::ActionMessage;
use payment::{PaymentGateway, StripeGateway};
use storage::{ImageStore, LocalImageStore};

#[derive(Clone)]
pub struct AppState {
    pub db_pool: SqlitePool,
    pub admin: AdminPolicy,
    pub payments: Arc<dyn PaymentGateway>,
    pub images: Arc<dyn ImageStore>,
}

fn fatal(err: impl std::fmt::Display) -> std::io::Error {
    log::error!("FATAL: {}", err);
    std::io::Error::new(std::io::ErrorKind::Other, err.to_string())
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::new().default_filter_or("info"));

    let config = Config::from_env().map_err(fatal)?;
    let db_pool = db::connect(&config.database_url).await.map_err(fatal)?;

    std::fs::create_dir_all(&config.upload_dir)?;
    let state = AppState {
        db_pool,
        admin: AdminPolicy::new(config.admin_user_ids.clone()),
        payments: Arc::new(StripeGateway::new(
            &config.stripe_secret_key,
            &config.stripe_api_base,
            &config.stripe_currency,
            &config.app_url,
        )),
        images: Arc::new(LocalImageStore::new(
            config.upload_dir.clone(),
            &config.public_upload_path,
        )),
    };
    let session_key = Key::from(config.session_key.as_slice());
    let upload_mount = config.public_upload_path.clone();
    let upload_dir = config.upload_dir.clone();

    info!("Starting HTTP server on http://{}/", config.bind_addr);

    HttpServer::new(move || {
        App::new()
            // enable automatic response compression - usually register this first
            .wrap(middleware::Compress::default())
            .wrap(IdentityMiddleware::default())
            .wrap(SessionMiddleware::new(
                CookieSessionStore::default(),
                session_key.clone(),
            ))
            // enable logger - always register Actix Web Logger middleware last
            .wrap(middleware::Logger::default())
            .service(Files::new(&upload_mount, upload_dir.clone()))
            .app_data(Data::new(state.clone()))
            .configure(routes::configure)
            .default_service(web::to(default_handler))
    })
    .bind(config.bind_addr.as_str())?
    .run()
    .await
}

async fn default_handler() -> impl Responder {
    HttpResponse::NotFound().json(ActionMessage::new("Not found"))
}
