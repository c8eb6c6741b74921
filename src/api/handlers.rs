//! # API Request Handlers
//!
//! This module contains the handler functions for each API endpoint.
//! Each handler:
//! 1. Authenticates the caller (bearer token or webhook signature)
//! 2. Extracts and validates request data
//! 3. Calls the appropriate service
//! 4. Returns a formatted response
//!
//! ## Error Handling
//!
//! All errors are caught and returned as JSON:
//!
//! ```json
//! {
//!     "success": false,
//!     "error": {
//!         "code": "INSUFFICIENT_BALANCE",
//!         "message": "Insufficient balance: available 3000, requested 4500"
//!     }
//! }
//! ```
//!
//! Validation and auth failures never reach the service layer; a webhook
//! with a bad signature is rejected before the store is touched at all.

use std::sync::Arc;

use actix_web::{web, HttpRequest, HttpResponse};
use chrono::Utc;
use serde_json::json;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::auth::{AuthError, Claims};
use crate::db::queries;
use crate::db::{EntryType, UserRecord};
use crate::events::signature::verify_signature;
use crate::events::{parse_event, WebhookEvent};
use crate::models::{
    AffiliateBalanceResponse,
    ApiResponse,
    BalanceOrderRequest,
    HealthResponse,
    HistoryQuery,
    InitUserRequest,
    LedgerEntryResponse,
    LedgerListResponse,
    OrderResponse,
    PostSignalRequest,
    SignalActionRequest,
    VerifyAccountResponse,
    WithdrawRequest,
    WithdrawResponse,
};
use crate::services::attribution::AttributionOutcome;
use crate::services::ledger::LedgerError;
use crate::services::reconciler::ReconcilerError;
use crate::services::signals::{SignalAction, SignalActionOutcome, SignalError};
use crate::utils::{format_pence, referral_code_for};
use crate::AppState;

/// Map an authentication failure to its HTTP response.
fn auth_failure(e: &AuthError) -> HttpResponse {
    match e {
        AuthError::MissingToken => HttpResponse::Unauthorized()
            .json(ApiResponse::<()>::error("MISSING_TOKEN", &e.to_string())),
        AuthError::InvalidToken(_) => HttpResponse::Unauthorized()
            .json(ApiResponse::<()>::error("INVALID_TOKEN", &e.to_string())),
        AuthError::Forbidden => HttpResponse::Forbidden()
            .json(ApiResponse::<()>::error("FORBIDDEN", &e.to_string())),
    }
}

/// Owner-or-admin guard for per-user resources.
fn may_access(claims: &Claims, user_id: &str) -> bool {
    claims.sub == user_id || claims.is_admin()
}

/// API information endpoint (root).
///
/// Returns information about available API endpoints.
///
/// ## Endpoint
///
/// `GET /`
pub async fn api_info() -> HttpResponse {
    let info = json!({
        "name": "Membership API",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Backend API for membership, affiliate commissions, store orders and trade signals",
        "endpoints": {
            "health": { "method": "GET", "path": "/health" },
            "webhooks": {
                "payment": { "method": "POST", "path": "/webhooks/payment" }
            },
            "users": {
                "init": { "method": "POST", "path": "/users/init" }
            },
            "affiliate": {
                "balance": { "method": "GET", "path": "/affiliate/balance/{user}" },
                "ledger": { "method": "GET", "path": "/affiliate/ledger/{user}" },
                "withdraw": { "method": "POST", "path": "/affiliate/withdraw" },
                "verify": { "method": "GET", "path": "/affiliate/verify/{user}" }
            },
            "store": {
                "balanceOrder": { "method": "POST", "path": "/store/balance-order" },
                "orders": { "method": "GET", "path": "/store/orders" }
            },
            "signals": {
                "live": { "method": "GET", "path": "/signals" },
                "history": { "method": "GET", "path": "/signals/history" },
                "post": { "method": "POST", "path": "/signals" },
                "action": { "method": "POST", "path": "/signals/{id}/action" }
            }
        }
    });

    HttpResponse::Ok().json(ApiResponse::success(info))
}

/// Health check endpoint.
///
/// ## Endpoint
///
/// `GET /health`
///
/// ## Example
///
/// ```bash
/// curl http://127.0.0.1:8080/health
/// ```
pub async fn health_check(state: web::Data<Arc<AppState>>) -> HttpResponse {
    let db_healthy = state.db.pool().get().await.is_ok();

    let response = HealthResponse {
        status: if db_healthy { "healthy" } else { "unhealthy" }.to_string(),
        database: db_healthy,
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now(),
    };

    let status_code = if db_healthy {
        actix_web::http::StatusCode::OK
    } else {
        actix_web::http::StatusCode::SERVICE_UNAVAILABLE
    };

    HttpResponse::build(status_code).json(ApiResponse::success(response))
}

// ==========================================
// WEBHOOKS
// ==========================================

/// Payment processor webhook.
///
/// Authenticated by the shared signing secret; the signature covers the
/// raw body, so this handler takes `Bytes` and parses only after the
/// check passes. Redelivered events are acknowledged without duplicating
/// effects.
///
/// ## Endpoint
///
/// `POST /webhooks/payment`
///
/// ## Responses
///
/// - `200 {"received": true}` - Processed (or duplicate, or ignored type)
/// - `400` - Bad signature or malformed payload; the processor must not
///   retry these
/// - `500` - Transient failure (store error, user record not yet
///   synced); the processor retries with backoff
pub async fn payment_webhook(
    state: web::Data<Arc<AppState>>,
    req: HttpRequest,
    body: web::Bytes,
) -> HttpResponse {
    let header = req
        .headers()
        .get("Webhook-Signature")
        .or_else(|| req.headers().get("Stripe-Signature"))
        .and_then(|v| v.to_str().ok());

    let Some(header) = header else {
        warn!("Webhook delivery without signature header");
        return HttpResponse::BadRequest().json(
            ApiResponse::<()>::error("SIGNATURE_MISSING", "Missing signature header"),
        );
    };

    if let Err(e) = verify_signature(
        &state.config.payment_webhook_secret,
        header,
        &body,
        state.config.webhook_tolerance_secs,
        Utc::now().timestamp(),
    ) {
        warn!("Webhook signature rejected: {}", e);
        return HttpResponse::BadRequest().json(
            ApiResponse::<()>::error("SIGNATURE_INVALID", &e.to_string()),
        );
    }

    let event = match parse_event(&body) {
        Ok(event) => event,
        Err(e) => {
            warn!("Malformed webhook payload: {}", e);
            return HttpResponse::BadRequest().json(
                ApiResponse::<()>::error("MALFORMED_EVENT", &e.to_string()),
            );
        }
    };

    let result = match &event {
        WebhookEvent::CheckoutCompleted { event_id, session } if session.mode == "payment" => {
            info!("📦 {}: checkout completed (one-time): {}", event_id, session.id);
            state.reconciler.on_order_completed(session).await
        }
        WebhookEvent::CheckoutCompleted { event_id, session } => {
            info!("📦 {}: checkout completed (subscription): {}", event_id, session.id);
            state.reconciler.on_subscription_activated(session).await
        }
        WebhookEvent::SubscriptionDeleted { event_id, subscription } => {
            info!("📦 {}: subscription deleted: {}", event_id, subscription.id);
            state.reconciler.on_subscription_cancelled(subscription).await
        }
        WebhookEvent::SubscriptionUpdated { event_id, subscription } => {
            info!("📦 {}: subscription updated: {}", event_id, subscription.id);
            state.reconciler.on_subscription_status_changed(subscription).await
        }
        WebhookEvent::Ignored { event_type } => {
            info!("Ignoring event type: {}", event_type);
            Ok(())
        }
    };

    match result {
        Ok(()) => HttpResponse::Ok().json(json!({ "received": true })),
        Err(ReconcilerError::MissingEmail) => {
            warn!("Event without customer identity");
            HttpResponse::BadRequest().json(
                ApiResponse::<()>::error("NO_CUSTOMER_IDENTITY", "No email or customer id on event"),
            )
        }
        Err(ReconcilerError::UserNotFound(who)) => {
            // The local record may not have synced yet; a 5xx lets the
            // processor retry with backoff.
            warn!("User not found for event: {}", who);
            HttpResponse::InternalServerError().json(
                ApiResponse::<()>::error("USER_NOT_FOUND", &format!("User not found: {}", who)),
            )
        }
        Err(e) => {
            error!("Webhook processing failed: {}", e);
            HttpResponse::InternalServerError().json(
                ApiResponse::<()>::error("EVENT_FAILED", &e.to_string()),
            )
        }
    }
}

// ==========================================
// USERS
// ==========================================

/// Bootstrap the caller's user profile.
///
/// Creates the local user record on first call (idempotent afterwards)
/// and captures the referral code from signup context. Attribution is
/// best-effort: an unknown or self-referencing code is skipped without
/// failing the request.
///
/// ## Endpoint
///
/// `POST /users/init`
///
/// ## Example
///
/// ```bash
/// curl -X POST http://127.0.0.1:8080/users/init \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"referredBy": "AB12-CD34"}'
/// ```
pub async fn init_user(
    state: web::Data<Arc<AppState>>,
    req: HttpRequest,
    body: web::Json<InitUserRequest>,
) -> HttpResponse {
    let claims = match state.verifier.authenticate(&req) {
        Ok(claims) => claims,
        Err(e) => return auth_failure(&e),
    };

    info!("Bootstrap request for {}", claims.sub);

    let existing = match queries::get_user_by_id(state.db.pool(), &claims.sub).await {
        Ok(user) => user,
        Err(e) => {
            error!("User lookup failed: {}", e);
            return HttpResponse::InternalServerError().json(
                ApiResponse::<()>::error("USER_LOOKUP_FAILED", &e.to_string()),
            );
        }
    };

    let user = match existing {
        Some(user) => user,
        None => {
            let now = Utc::now();
            let username = body
                .username
                .clone()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| {
                    claims.email.split('@').next().unwrap_or("member").to_string()
                });

            let record = UserRecord {
                id: claims.sub.clone(),
                email: claims.email.clone(),
                username,
                referral_code: referral_code_for(&claims.sub),
                referred_by: None,
                subscription_status: "none".to_string(),
                is_paid: false,
                processor_customer_id: None,
                processor_subscription_id: None,
                joined_at: now,
                updated_at: now,
            };

            if let Err(e) = queries::create_user(state.db.pool(), &record).await {
                error!("User creation failed: {}", e);
                return HttpResponse::InternalServerError().json(
                    ApiResponse::<()>::error("USER_CREATE_FAILED", &e.to_string()),
                );
            }

            // Re-read: a concurrent bootstrap may have won the insert
            match queries::get_user_by_id(state.db.pool(), &claims.sub).await {
                Ok(Some(user)) => user,
                _ => {
                    return HttpResponse::InternalServerError().json(
                        ApiResponse::<()>::error("USER_CREATE_FAILED", "User record missing after create"),
                    );
                }
            }
        }
    };

    let mut referred_by = user.referred_by.clone();
    if let Some(code) = body.referred_by.as_deref() {
        match state.attribution.attribute(&user, code).await {
            Ok(AttributionOutcome::Recorded { referrer_id }) => {
                info!("Attributed {} to referrer {}", user.id, referrer_id);
                referred_by = Some(code.trim().to_string());
            }
            Ok(_) => {}
            Err(e) => {
                // Referral capture is marketing instrumentation; the
                // signup itself must not fail on it
                warn!("Attribution failed for {}: {}", user.id, e);
            }
        }
    }

    HttpResponse::Ok().json(ApiResponse::success(json!({
        "userId": user.id,
        "username": user.username,
        "referralCode": user.referral_code,
        "referredBy": referred_by,
        "subscriptionStatus": user.subscription_status,
        "isPaid": user.is_paid,
    })))
}

// ==========================================
// AFFILIATE
// ==========================================

/// Get affiliate balances and counters.
///
/// Members may read their own account; admins may read any. A user with
/// no affiliate account yet sees zeroed balances.
///
/// ## Endpoint
///
/// `GET /affiliate/balance/{user}`
pub async fn get_balance(
    state: web::Data<Arc<AppState>>,
    req: HttpRequest,
    path: web::Path<String>,
) -> HttpResponse {
    let claims = match state.verifier.authenticate(&req) {
        Ok(claims) => claims,
        Err(e) => return auth_failure(&e),
    };

    let user_id = path.into_inner();
    if !may_access(&claims, &user_id) {
        return auth_failure(&AuthError::Forbidden);
    }

    match state.ledger.balance(&user_id).await {
        Ok(account) => {
            let response = AffiliateBalanceResponse {
                user_id: account.user_id.clone(),
                referral_code: account.referral_code.clone(),
                available_balance: account.available_balance,
                pending_balance: account.pending_balance,
                total_earnings: account.total_earnings,
                total_withdrawn: account.total_withdrawn,
                active_referrals: account.active_referrals,
                total_referrals: account.total_referrals,
                formatted_available: format_pence(account.available_balance),
                created_at: account.created_at,
                last_updated: account.updated_at,
            };
            HttpResponse::Ok().json(ApiResponse::success(response))
        }
        Err(LedgerError::AccountNotFound(_)) => {
            // Not an affiliate yet; report an empty account
            match queries::get_user_by_id(state.db.pool(), &user_id).await {
                Ok(Some(user)) => {
                    let response = AffiliateBalanceResponse {
                        user_id: user.id,
                        referral_code: user.referral_code,
                        available_balance: 0,
                        pending_balance: 0,
                        total_earnings: 0,
                        total_withdrawn: 0,
                        active_referrals: 0,
                        total_referrals: 0,
                        formatted_available: format_pence(0),
                        created_at: user.joined_at,
                        last_updated: user.updated_at,
                    };
                    HttpResponse::Ok().json(ApiResponse::success(response))
                }
                Ok(None) => HttpResponse::NotFound().json(
                    ApiResponse::<()>::error("USER_NOT_FOUND", &format!("User not found: {}", user_id)),
                ),
                Err(e) => {
                    error!("Balance lookup failed: {}", e);
                    HttpResponse::InternalServerError().json(
                        ApiResponse::<()>::error("BALANCE_QUERY_FAILED", &e.to_string()),
                    )
                }
            }
        }
        Err(e) => {
            error!("Balance lookup failed: {}", e);
            HttpResponse::InternalServerError().json(
                ApiResponse::<()>::error("BALANCE_QUERY_FAILED", &e.to_string()),
            )
        }
    }
}

/// Get ledger entry history.
///
/// ## Endpoint
///
/// `GET /affiliate/ledger/{user}?limit=20&offset=0`
///
/// ## Query Parameters
///
/// - `limit` - Number of entries (default: 20, max: 100)
/// - `offset` - Skip N entries (for pagination)
pub async fn get_ledger(
    state: web::Data<Arc<AppState>>,
    req: HttpRequest,
    path: web::Path<String>,
    query: web::Query<HistoryQuery>,
) -> HttpResponse {
    let claims = match state.verifier.authenticate(&req) {
        Ok(claims) => claims,
        Err(e) => return auth_failure(&e),
    };

    let user_id = path.into_inner();
    if !may_access(&claims, &user_id) {
        return auth_failure(&AuthError::Forbidden);
    }

    let limit = query.limit.clamp(1, 100);
    let offset = query.offset.max(0);

    match state.ledger.history(&user_id, limit, offset).await {
        Ok(entries) => {
            let entries: Vec<LedgerEntryResponse> = entries
                .into_iter()
                .map(|entry| LedgerEntryResponse {
                    id: entry.id,
                    entry_type: entry.entry_type,
                    amount: entry.amount,
                    formatted_amount: format_pence(entry.amount),
                    note: entry.note,
                    reference: entry.reference,
                    created_at: entry.created_at,
                })
                .collect();

            HttpResponse::Ok().json(ApiResponse::success(LedgerListResponse {
                entries,
                offset,
                limit,
            }))
        }
        Err(e) => {
            error!("Ledger query failed: {}", e);
            HttpResponse::InternalServerError().json(
                ApiResponse::<()>::error("LEDGER_QUERY_FAILED", &e.to_string()),
            )
        }
    }
}

/// Withdraw from the affiliate balance.
///
/// ## Endpoint
///
/// `POST /affiliate/withdraw`
///
/// ## Errors
///
/// - `INVALID_AMOUNT` - Amount is zero or negative
/// - `INSUFFICIENT_BALANCE` - Balance cannot cover the amount; nothing
///   is debited
pub async fn withdraw(
    state: web::Data<Arc<AppState>>,
    req: HttpRequest,
    body: web::Json<WithdrawRequest>,
) -> HttpResponse {
    let claims = match state.verifier.authenticate(&req) {
        Ok(claims) => claims,
        Err(e) => return auth_failure(&e),
    };

    info!("Withdrawal request: {} for {}", body.amount, claims.sub);

    if body.amount <= 0 {
        return HttpResponse::BadRequest().json(
            ApiResponse::<()>::error("INVALID_AMOUNT", "Amount must be greater than 0"),
        );
    }

    let reference = format!("wd_{}", Uuid::new_v4().simple());
    let result = state
        .ledger
        .debit(
            &claims.sub,
            body.amount,
            EntryType::Withdrawal,
            "Balance withdrawal",
            Some(reference.as_str()),
        )
        .await;

    match result {
        Ok(receipt) => HttpResponse::Ok().json(ApiResponse::success(WithdrawResponse {
            entry_id: receipt.entry_id,
            amount: body.amount,
            remaining_balance: receipt.balance_after,
        })),
        Err(e @ LedgerError::InsufficientBalance { .. }) => {
            HttpResponse::BadRequest().json(
                ApiResponse::<()>::error("INSUFFICIENT_BALANCE", &e.to_string()),
            )
        }
        Err(LedgerError::AccountNotFound(_)) => HttpResponse::BadRequest().json(
            ApiResponse::<()>::error("INSUFFICIENT_BALANCE", "No affiliate balance to withdraw"),
        ),
        Err(e) => {
            error!("Withdrawal failed: {}", e);
            HttpResponse::InternalServerError().json(
                ApiResponse::<()>::error("WITHDRAW_FAILED", &e.to_string()),
            )
        }
    }
}

/// Check the ledger reproducibility invariant for an account.
///
/// Sums the account's entries and compares against the cached balance.
///
/// ## Endpoint
///
/// `GET /affiliate/verify/{user}`
pub async fn verify_account(
    state: web::Data<Arc<AppState>>,
    req: HttpRequest,
    path: web::Path<String>,
) -> HttpResponse {
    let claims = match state.verifier.authenticate(&req) {
        Ok(claims) => claims,
        Err(e) => return auth_failure(&e),
    };

    let user_id = path.into_inner();
    if !may_access(&claims, &user_id) {
        return auth_failure(&AuthError::Forbidden);
    }

    match state.ledger.verify_account(&user_id).await {
        Ok((cached_balance, entry_sum)) => {
            HttpResponse::Ok().json(ApiResponse::success(VerifyAccountResponse {
                user_id,
                cached_balance,
                entry_sum,
                difference: cached_balance - entry_sum,
                consistent: cached_balance == entry_sum,
            }))
        }
        Err(LedgerError::AccountNotFound(_)) => HttpResponse::NotFound().json(
            ApiResponse::<()>::error("ACCOUNT_NOT_FOUND", &format!("No affiliate account: {}", user_id)),
        ),
        Err(e) => {
            error!("Account verification failed: {}", e);
            HttpResponse::InternalServerError().json(
                ApiResponse::<()>::error("VERIFY_FAILED", &e.to_string()),
            )
        }
    }
}

// ==========================================
// STORE
// ==========================================

/// Place a store order paid from the affiliate balance.
///
/// Prices come from the authoritative product list, never from the
/// client. The debit and the order creation are atomic: on rejection no
/// order exists and the balance is unchanged.
///
/// ## Endpoint
///
/// `POST /store/balance-order`
///
/// ## Example
///
/// ```bash
/// curl -X POST http://127.0.0.1:8080/store/balance-order \
///   -H "Authorization: Bearer <token>" \
///   -H "Content-Type: application/json" \
///   -d '{"items": [{"productId": "hoodie-black", "qty": 1}]}'
/// ```
///
/// ## Errors
///
/// - `EMPTY_CART` - No items submitted
/// - `PRODUCT_NOT_FOUND` - An item is not in the price list
/// - `INSUFFICIENT_BALANCE` - Balance cannot cover the subtotal
pub async fn balance_order(
    state: web::Data<Arc<AppState>>,
    req: HttpRequest,
    body: web::Json<BalanceOrderRequest>,
) -> HttpResponse {
    let claims = match state.verifier.authenticate(&req) {
        Ok(claims) => claims,
        Err(e) => return auth_failure(&e),
    };

    info!(
        "Balance order request: {} items for {}",
        body.items.len(),
        claims.sub
    );

    let result = state
        .reconciler
        .place_balance_order(&claims.sub, &claims.email, &body.items)
        .await;

    match result {
        Ok(receipt) => HttpResponse::Ok().json(ApiResponse::success(OrderResponse {
            order_id: receipt.order_id,
            amount_total: receipt.amount_total,
            currency: receipt.currency,
            remaining_balance: receipt.balance_after,
        })),
        Err(e) => {
            let (code, status) = match &e {
                ReconcilerError::EmptyCart => {
                    ("EMPTY_CART", actix_web::http::StatusCode::BAD_REQUEST)
                }
                ReconcilerError::UnknownProduct(_) => {
                    ("PRODUCT_NOT_FOUND", actix_web::http::StatusCode::BAD_REQUEST)
                }
                ReconcilerError::InsufficientBalance { .. } => {
                    ("INSUFFICIENT_BALANCE", actix_web::http::StatusCode::BAD_REQUEST)
                }
                _ => ("ORDER_FAILED", actix_web::http::StatusCode::INTERNAL_SERVER_ERROR),
            };

            if status.is_server_error() {
                error!("Balance order failed: {}", e);
            } else {
                info!("Balance order rejected: {}", e);
            }

            HttpResponse::build(status).json(ApiResponse::<()>::error(code, &e.to_string()))
        }
    }
}

/// Get the caller's order history.
///
/// ## Endpoint
///
/// `GET /store/orders?limit=20&offset=0`
pub async fn get_orders(
    state: web::Data<Arc<AppState>>,
    req: HttpRequest,
    query: web::Query<HistoryQuery>,
) -> HttpResponse {
    let claims = match state.verifier.authenticate(&req) {
        Ok(claims) => claims,
        Err(e) => return auth_failure(&e),
    };

    let limit = query.limit.clamp(1, 100);
    let offset = query.offset.max(0);

    match queries::get_orders_by_user(state.db.pool(), &claims.sub, limit, offset).await {
        Ok(orders) => HttpResponse::Ok().json(ApiResponse::success(orders)),
        Err(e) => {
            error!("Order query failed: {}", e);
            HttpResponse::InternalServerError().json(
                ApiResponse::<()>::error("ORDER_QUERY_FAILED", &e.to_string()),
            )
        }
    }
}

// ==========================================
// SIGNALS
// ==========================================

/// Get all live signals.
///
/// ## Endpoint
///
/// `GET /signals`
pub async fn get_signals(
    state: web::Data<Arc<AppState>>,
    req: HttpRequest,
) -> HttpResponse {
    if let Err(e) = state.verifier.authenticate(&req) {
        return auth_failure(&e);
    }

    match state.signals.live().await {
        Ok(signals) => HttpResponse::Ok().json(ApiResponse::success(signals)),
        Err(e) => {
            error!("Signal query failed: {}", e);
            HttpResponse::InternalServerError().json(
                ApiResponse::<()>::error("SIGNAL_QUERY_FAILED", &e.to_string()),
            )
        }
    }
}

/// Get closed signals.
///
/// ## Endpoint
///
/// `GET /signals/history?limit=20&offset=0`
pub async fn get_signal_history(
    state: web::Data<Arc<AppState>>,
    req: HttpRequest,
    query: web::Query<HistoryQuery>,
) -> HttpResponse {
    if let Err(e) = state.verifier.authenticate(&req) {
        return auth_failure(&e);
    }

    let limit = query.limit.clamp(1, 100);
    let offset = query.offset.max(0);

    match state.signals.history(limit, offset).await {
        Ok(history) => HttpResponse::Ok().json(ApiResponse::success(history)),
        Err(e) => {
            error!("Signal history query failed: {}", e);
            HttpResponse::InternalServerError().json(
                ApiResponse::<()>::error("SIGNAL_QUERY_FAILED", &e.to_string()),
            )
        }
    }
}

/// Post a new trade signal (admin).
///
/// ## Endpoint
///
/// `POST /signals`
pub async fn post_signal(
    state: web::Data<Arc<AppState>>,
    req: HttpRequest,
    body: web::Json<PostSignalRequest>,
) -> HttpResponse {
    if let Err(e) = state.verifier.authenticate_admin(&req) {
        return auth_failure(&e);
    }

    info!("New signal: {} {}", body.pair, body.direction);

    match state.signals.post(body.into_inner()).await {
        Ok(signal) => HttpResponse::Ok().json(ApiResponse::success(signal)),
        Err(e @ SignalError::InvalidInput(_)) => HttpResponse::BadRequest().json(
            ApiResponse::<()>::error("INVALID_INPUT", &e.to_string()),
        ),
        Err(e) => {
            error!("Signal post failed: {}", e);
            HttpResponse::InternalServerError().json(
                ApiResponse::<()>::error("SIGNAL_POST_FAILED", &e.to_string()),
            )
        }
    }
}

/// Apply a TP/SL/BE action to a live signal (admin).
///
/// TP1/TP2 mark the target and keep the signal live; TP3, LOSS and BE
/// close it into history.
///
/// ## Endpoint
///
/// `POST /signals/{id}/action`
pub async fn signal_action(
    state: web::Data<Arc<AppState>>,
    req: HttpRequest,
    path: web::Path<Uuid>,
    body: web::Json<SignalActionRequest>,
) -> HttpResponse {
    if let Err(e) = state.verifier.authenticate_admin(&req) {
        return auth_failure(&e);
    }

    let id = path.into_inner();

    let Some(action) = SignalAction::parse(&body.action) else {
        return HttpResponse::BadRequest().json(
            ApiResponse::<()>::error("UNKNOWN_ACTION", &format!("Unknown action: {}", body.action)),
        );
    };

    info!("Signal action {} on {}", body.action, id);

    let result = state
        .signals
        .act(id, action, body.custom_pips.clone(), body.custom_notes.clone())
        .await;

    match result {
        Ok(SignalActionOutcome::Marked { target }) => {
            HttpResponse::Ok().json(ApiResponse::success(json!({
                "status": "marked",
                "target": target,
            })))
        }
        Ok(SignalActionOutcome::AlreadyMarked { target }) => {
            HttpResponse::Ok().json(ApiResponse::success(json!({
                "status": "already_marked",
                "target": target,
            })))
        }
        Ok(SignalActionOutcome::Closed { result, pips }) => {
            HttpResponse::Ok().json(ApiResponse::success(json!({
                "status": "closed",
                "result": result,
                "pips": pips,
            })))
        }
        Err(e @ SignalError::NotFound(_)) => HttpResponse::NotFound().json(
            ApiResponse::<()>::error("SIGNAL_NOT_FOUND", &e.to_string()),
        ),
        Err(e) => {
            error!("Signal action failed: {}", e);
            HttpResponse::InternalServerError().json(
                ApiResponse::<()>::error("SIGNAL_ACTION_FAILED", &e.to_string()),
            )
        }
    }
}
