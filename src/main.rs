use std::io;

use actix_cors::Cors;
use actix_web::middleware::Logger;
use actix_web::{web, App, HttpServer};
use taskdesk::auth::AuthMiddleware;
use taskdesk::routes::{self, health};
use taskdesk::seed::ensure_demo_user;
use taskdesk::store::Storage;
use taskdesk::{AppError, AppState, Config};

fn startup_error(err: AppError) -> io::Error {
    log::error!("startup failed: {}", err);
    io::Error::new(io::ErrorKind::Other, err.to_string())
}

#[actix_web::main]
async fn main() -> io::Result<()> {
    dotenv::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = Config::from_env().map_err(startup_error)?;
    log::info!("using {} storage backend", config.storage_backend.as_str());

    let storage = Storage::connect(&config).await.map_err(startup_error)?;
    let state = AppState::from_config(&config, storage).map_err(startup_error)?;

    if config.seed_demo_user {
        ensure_demo_user(state.storage.users.as_ref(), &state.passwords)
            .await
            .map_err(startup_error)?;
    }
    if state.google.is_enabled() && config.google.client_id.is_none() {
        log::warn!("GOOGLE_CLIENT_ID is not set; Google sign-in will fail until it is configured");
    }

    let state = web::Data::new(state);
    log::info!("starting server at {}", config.server_url());

    HttpServer::new(move || {
        App::new()
            .app_data(state.clone())
            .wrap(
                Cors::default()
                    .allow_any_origin()
                    .allow_any_method()
                    .allow_any_header()
                    .max_age(3600),
            )
            .wrap(Logger::default())
            .service(health::health)
            .service(
                web::scope("/api")
                    .wrap(AuthMiddleware)
                    .configure(routes::config),
            )
    })
    .bind((config.server_host.as_str(), config.server_port))?
    .run()
    .await
}
