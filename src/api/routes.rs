//! # API Route Configuration
//!
//! This module sets up all the HTTP routes for the API.

use actix_web::web;

use super::handlers;

/// Configure all API routes.
///
/// This function is called from main.rs to set up
/// all the endpoint routes.
///
/// ## Route Structure
///
/// ```text
/// /
/// ├── /health                  GET - Health check
/// ├── /webhooks
/// │   └── /payment             POST - Processor events (signed)
/// ├── /users
/// │   └── /init                POST - Bootstrap profile
/// ├── /affiliate
/// │   ├── /balance/:user       GET - Balances and counters
/// │   ├── /ledger/:user        GET - Entry history
/// │   ├── /withdraw            POST - Withdraw from balance
/// │   └── /verify/:user        GET - Ledger reproducibility check
/// ├── /store
/// │   ├── /balance-order       POST - Balance-funded checkout
/// │   └── /orders              GET - Caller's order history
/// └── /signals
///     ├── ""                   GET - Live signals / POST - Post (admin)
///     ├── /history             GET - Closed signals
///     └── /:id/action          POST - TP/SL/BE action (admin)
/// ```
pub fn configure_routes(cfg: &mut web::ServiceConfig) {
    cfg
        // Root endpoint - API information
        .route("/", web::get().to(handlers::api_info))

        // Health check endpoint
        .route("/health", web::get().to(handlers::health_check))

        // Payment processor webhook (signature-authenticated)
        .service(
            web::scope("/webhooks")
                .route("/payment", web::post().to(handlers::payment_webhook)),
        )

        // User bootstrap
        .service(
            web::scope("/users")
                .route("/init", web::post().to(handlers::init_user)),
        )

        // Affiliate endpoints
        .service(
            web::scope("/affiliate")
                .route("/balance/{user}", web::get().to(handlers::get_balance))
                .route("/ledger/{user}", web::get().to(handlers::get_ledger))
                .route("/withdraw", web::post().to(handlers::withdraw))
                .route("/verify/{user}", web::get().to(handlers::verify_account)),
        )

        // Store endpoints
        .service(
            web::scope("/store")
                .route("/balance-order", web::post().to(handlers::balance_order))
                .route("/orders", web::get().to(handlers::get_orders)),
        )

        // Signal board endpoints
        .service(
            web::scope("/signals")
                .route("", web::get().to(handlers::get_signals))
                .route("", web::post().to(handlers::post_signal))
                .route("/history", web::get().to(handlers::get_signal_history))
                .route("/{id}/action", web::post().to(handlers::signal_action)),
        );
}
