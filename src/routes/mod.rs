pub mod auth;
pub mod health;
pub mod tasks;

use actix_web::{error, web};

use crate::error::AppError;

/// Registers the `/auth` and `/tasks` scopes. Mounted under `/api` by the caller.
///
/// JSON and query-string extraction failures are turned into `AppError::BadRequest` so they
/// share the `{"detail": ...}` error body.
pub fn config(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _req| {
        log::debug!("rejected JSON body: {}", err);
        error::Error::from(AppError::BadRequest(err.to_string()))
    }))
    .app_data(web::QueryConfig::default().error_handler(|err, _req| {
        log::debug!("rejected query string: {}", err);
        error::Error::from(AppError::BadRequest(err.to_string()))
    }))
    .service(
        web::scope("/auth")
            .service(auth::register)
            .service(auth::obtain_token)
            .service(auth::refresh_token)
            .service(auth::google_login)
            .service(auth::me),
    )
    .service(
        web::scope("/tasks")
            .service(tasks::list_tasks)
            .service(tasks::create_task)
            .service(tasks::get_task)
            .service(tasks::patch_task)
            .service(tasks::update_task)
            .service(tasks::delete_task),
    );
}
