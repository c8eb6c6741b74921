//! # Membership Backend Service
//!
//! This is the main entry point for the backend service behind the
//! members site. It provides:
//!
//! - Signed webhook intake for payment-processor lifecycle events
//! - Referral attribution and the affiliate commission ledger
//! - Balance-funded store checkout
//! - The live trade-signal board with Telegram notifications
//!
//! ## Architecture Overview
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        BACKEND SERVICE                           │
//! │                                                                  │
//! │  ┌───────────────────────┐   ┌───────────────────────────────┐  │
//! │  │       REST API        │   │        Webhook Intake         │  │
//! │  │       (Actix)         │   │                               │  │
//! │  │                       │   │  /webhooks/payment            │  │
//! │  │  /users/init          │   │   • signature check           │  │
//! │  │  /affiliate/*         │   │   • typed event parse         │  │
//! │  │  /store/balance-order │   │   • reconcile, exactly once   │  │
//! │  │  /signals/*           │   │                               │  │
//! │  └───────────────────────┘   └───────────────────────────────┘  │
//! │              │                             │                     │
//! │  ┌───────────┴─────────────────────────────┴────────────────┐   │
//! │  │                     SERVICE LAYER                         │   │
//! │  │  ┌─────────────┐ ┌──────────────┐ ┌───────────────────┐  │   │
//! │  │  │EventReconci-│ │CommissionLed-│ │SignalBoard +      │  │   │
//! │  │  │ler          │ │ger           │ │SignalNotifier     │  │   │
//! │  │  └─────────────┘ └──────────────┘ └───────────────────┘  │   │
//! │  └───────────────────────────┬───────────────────────────────┘  │
//! │                              │                                   │
//! │                      ┌───────┴───────┐                          │
//! │                      │  PostgreSQL   │                          │
//! │                      └───────────────┘                          │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! There are no background workers: every operation is triggered by an
//! inbound HTTP request, and all coordination between concurrent
//! requests happens through the database.
//!
//! ## Quick Start
//!
//! 1. Set up PostgreSQL and create the database
//! 2. Copy `.env.example` to `.env` and configure
//! 3. Start the server: `cargo run`
//!
//! The schema migration runs automatically at boot.

use std::sync::Arc;

use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

mod api;
mod auth;
mod config;
mod db;
mod events;
mod models;
mod services;
mod utils;

use auth::TokenVerifier;
use config::AppConfig;
use db::Database;
use services::{
    AttributionResolver, CommissionLedger, EventReconciler, SignalBoard, SignalNotifier,
};

/// Application state shared across all handlers.
///
/// Constructed once at startup and handed to every handler via
/// `web::Data`; no component reaches for globals.
pub struct AppState {
    /// Database connection pool
    pub db: Database,

    /// Application configuration
    pub config: AppConfig,

    /// Bearer-token verifier
    pub verifier: TokenVerifier,

    /// Referral attribution
    pub attribution: AttributionResolver,

    /// The commission ledger
    pub ledger: CommissionLedger,

    /// Processor-event reconciliation and store checkout
    pub reconciler: EventReconciler,

    /// Live trade-signal board
    pub signals: SignalBoard,
}

/// Main entry point for the backend service.
///
/// This function:
/// 1. Initializes logging
/// 2. Loads configuration from environment
/// 3. Connects to the database and applies the schema
/// 4. Constructs the services
/// 5. Launches the HTTP server
#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // =========================================
    // STEP 1: Initialize Logging
    // =========================================
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::DEBUG)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
        .expect("Failed to set tracing subscriber");

    info!("🚀 Starting Membership Backend Service");

    // =========================================
    // STEP 2: Load Configuration
    // =========================================
    dotenvy::dotenv().ok(); // It's okay if .env doesn't exist

    let config = AppConfig::from_env()
        .expect("Failed to load configuration");

    info!("📋 Configuration loaded");
    info!("   Commission: {} pence per active referral", config.commission_pence);
    info!("   Currency: {}", config.currency);

    // =========================================
    // STEP 3: Initialize Database
    // =========================================
    let db = Database::connect(&config.database_url)
        .await
        .expect("Failed to connect to database");

    info!("🗄️  Database connected");

    db.run_migrations()
        .await
        .expect("Failed to run migrations");

    info!("📦 Database migrations complete");

    // =========================================
    // STEP 4: Initialize Services
    // =========================================
    let verifier = TokenVerifier::new(config.auth_token_secret.clone());

    let notifier = SignalNotifier::new(
        config.telegram_bot_token.clone(),
        config.telegram_chat_id.clone(),
    );

    let attribution = AttributionResolver::new(db.clone());
    let ledger = CommissionLedger::new(db.clone());
    let reconciler = EventReconciler::new(
        db.clone(),
        ledger.clone(),
        attribution.clone(),
        config.clone(),
    );
    let signals = SignalBoard::new(db.clone(), notifier);

    info!("🔧 Services initialized");

    // =========================================
    // STEP 5: Create Application State
    // =========================================
    let app_state = Arc::new(AppState {
        db: db.clone(),
        config: config.clone(),
        verifier,
        attribution,
        ledger,
        reconciler,
        signals,
    });

    // =========================================
    // STEP 6: Start HTTP Server
    // =========================================
    let server_host = config.server_host.clone();
    let server_port = config.server_port;

    info!("🌐 Starting HTTP server on {}:{}", server_host, server_port);

    HttpServer::new(move || {
        // The site is served from a different origin than the API
        let cors = Cors::default()
            .allow_any_origin()
            .allow_any_header()
            .allowed_methods(vec!["GET", "POST", "OPTIONS"]);

        App::new()
            // Attach shared application state
            .app_data(web::Data::new(app_state.clone()))

            // Add CORS and logging middleware
            .wrap(cors)
            .wrap(middleware::Logger::default())

            // Configure API routes
            .configure(api::configure_routes)
    })
    .bind(format!("{}:{}", server_host, server_port))?
    .run()
    .await
}
