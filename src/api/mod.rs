//! # REST API Module
//!
//! This module defines all HTTP endpoints for the membership backend.
//!
//! ## Endpoint Overview
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | POST | `/webhooks/payment` | Payment processor events (signed) |
//! | POST | `/users/init` | Bootstrap profile, capture referral |
//! | GET | `/affiliate/balance/:user` | Affiliate balances |
//! | GET | `/affiliate/ledger/:user` | Ledger entry history |
//! | POST | `/affiliate/withdraw` | Withdraw from balance |
//! | GET | `/affiliate/verify/:user` | Ledger reproducibility check |
//! | POST | `/store/balance-order` | Balance-funded checkout |
//! | GET | `/store/orders` | Caller's order history |
//! | GET | `/signals` | Live trade signals |
//! | GET | `/signals/history` | Closed trade signals |
//! | POST | `/signals` | Post a signal (admin) |
//! | POST | `/signals/:id/action` | TP/SL/BE action (admin) |
//! | GET | `/health` | Health check |
//!
//! ## Request/Response Format
//!
//! All requests and responses use JSON:
//!
//! ```json
//! // Success response
//! {
//!     "success": true,
//!     "data": { ... }
//! }
//!
//! // Error response
//! {
//!     "success": false,
//!     "error": {
//!         "code": "ERROR_CODE",
//!         "message": "Human readable message"
//!     }
//! }
//! ```
//!
//! The webhook endpoint is the exception: it answers the processor's
//! expected `{"received": true}` acknowledgement.

pub mod handlers;
pub mod routes;

pub use routes::configure_routes;
