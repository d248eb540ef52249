//! # mb-api
//!
//! The web routing layer for msgboard. Handlers extract the board and form
//! parameters, call the engine, and map outcomes to the plain-text and JSON
//! responses the board front-end expects.

pub mod handlers;
pub mod middleware;

use actix_web::web;

/// Configures the `/api` routes.
///
/// # Developer Note
/// We use a scoped configuration to allow the main binary to mount
/// the API alongside other services.
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/api")
            .service(
                web::resource("/threads/{board}")
                    .route(web::get().to(handlers::list_threads))
                    .route(web::post().to(handlers::create_thread))
                    .route(web::put().to(handlers::report_thread))
                    .route(web::delete().to(handlers::delete_thread)),
            )
            .service(
                web::resource("/replies/{board}")
                    .route(web::get().to(handlers::get_thread))
                    .route(web::post().to(handlers::create_reply))
                    .route(web::put().to(handlers::report_reply))
                    .route(web::delete().to(handlers::delete_reply)),
            ),
    );
}
