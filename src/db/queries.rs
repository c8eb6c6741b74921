//! # Database Queries
//!
//! This module contains the SQL for the pool-level database operations.
//! Multi-statement atomic work (ledger mutations, balance checkout,
//! signal close) lives with the owning service, which runs it inside a
//! `client.transaction()`.
//!
//! ## Query Organization
//!
//! Queries are grouped by the table they operate on:
//! - `user_*` / `get_user_*` - users table
//! - `*_affiliate*` - affiliates table
//! - `*_ledger_*` - ledger_entries table
//! - `*_product*` - products table
//! - `*_signal*` - signal tables
//!
//! ## Error Handling
//!
//! All queries return `Result<T, DatabaseError>`.

use deadpool_postgres::Pool;
use tokio_postgres::Row;
use tracing::debug;
use uuid::Uuid;

use super::models::*;
use super::DatabaseError;

// ============================================
// HELPER FUNCTIONS
// ============================================

/// Helper to convert a database row to UserRecord
fn row_to_user(row: &Row) -> UserRecord {
    UserRecord {
        id: row.get("id"),
        email: row.get("email"),
        username: row.get("username"),
        referral_code: row.get("referral_code"),
        referred_by: row.get("referred_by"),
        subscription_status: row.get("subscription_status"),
        is_paid: row.get("is_paid"),
        processor_customer_id: row.get("processor_customer_id"),
        processor_subscription_id: row.get("processor_subscription_id"),
        joined_at: row.get("joined_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Helper to convert a database row to AffiliateRecord
fn row_to_affiliate(row: &Row) -> AffiliateRecord {
    AffiliateRecord {
        user_id: row.get("user_id"),
        referral_code: row.get("referral_code"),
        available_balance: row.get("available_balance"),
        pending_balance: row.get("pending_balance"),
        total_earnings: row.get("total_earnings"),
        total_withdrawn: row.get("total_withdrawn"),
        active_referrals: row.get("active_referrals"),
        total_referrals: row.get("total_referrals"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

/// Helper to convert a database row to LedgerEntryRecord
fn row_to_ledger_entry(row: &Row) -> LedgerEntryRecord {
    LedgerEntryRecord {
        id: row.get("id"),
        user_id: row.get("user_id"),
        amount: row.get("amount"),
        entry_type: row.get("entry_type"),
        note: row.get("note"),
        reference: row.get("reference"),
        created_at: row.get("created_at"),
    }
}

/// Helper to convert a database row to SignalRecord
fn row_to_signal(row: &Row) -> SignalRecord {
    SignalRecord {
        id: row.get("id"),
        pair: row.get("pair"),
        direction: row.get("direction"),
        entry_price: row.get("entry_price"),
        stop_loss: row.get("stop_loss"),
        tp1: row.get("tp1"),
        tp2: row.get("tp2"),
        tp3: row.get("tp3"),
        notes: row.get("notes"),
        targets_hit: row.get("targets_hit"),
        status: row.get("status"),
        created_at: row.get("created_at"),
        updated_at: row.get("updated_at"),
    }
}

const USER_COLUMNS: &str = "id, email, username, referral_code, referred_by, \
     subscription_status, is_paid, processor_customer_id, \
     processor_subscription_id, joined_at, updated_at";

// ============================================
// USER QUERIES
// ============================================

/// Get a user by id.
pub async fn get_user_by_id(
    pool: &Pool,
    id: &str,
) -> Result<Option<UserRecord>, DatabaseError> {
    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client.query(
        &format!("SELECT {} FROM users WHERE id = $1", USER_COLUMNS),
        &[&id],
    ).await?;

    Ok(rows.first().map(row_to_user))
}

/// Get a user by email.
pub async fn get_user_by_email(
    pool: &Pool,
    email: &str,
) -> Result<Option<UserRecord>, DatabaseError> {
    debug!("Fetching user by email: {}", email);

    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client.query(
        &format!("SELECT {} FROM users WHERE email = $1", USER_COLUMNS),
        &[&email],
    ).await?;

    Ok(rows.first().map(row_to_user))
}

/// Get a user by their own referral code.
pub async fn get_user_by_referral_code(
    pool: &Pool,
    code: &str,
) -> Result<Option<UserRecord>, DatabaseError> {
    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client.query(
        &format!("SELECT {} FROM users WHERE referral_code = $1", USER_COLUMNS),
        &[&code],
    ).await?;

    Ok(rows.first().map(row_to_user))
}

/// Get a user by the processor-side customer id.
///
/// Subscription lifecycle events carry only the customer id, so this is
/// how cancellation and status updates find the local record.
pub async fn get_user_by_processor_customer(
    pool: &Pool,
    customer_id: &str,
) -> Result<Option<UserRecord>, DatabaseError> {
    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client.query(
        &format!(
            "SELECT {} FROM users WHERE processor_customer_id = $1",
            USER_COLUMNS
        ),
        &[&customer_id],
    ).await?;

    Ok(rows.first().map(row_to_user))
}

/// Create a user record.
///
/// `ON CONFLICT DO NOTHING` on both id and email: two concurrent
/// bootstraps of the same user leave exactly one row.
pub async fn create_user(
    pool: &Pool,
    user: &UserRecord,
) -> Result<(), DatabaseError> {
    debug!("Creating user: {}", user.id);

    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    client.execute(
        r#"
        INSERT INTO users (
            id, email, username, referral_code, referred_by,
            subscription_status, is_paid, processor_customer_id,
            processor_subscription_id, joined_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (id) DO NOTHING
        "#,
        &[
            &user.id,
            &user.email,
            &user.username,
            &user.referral_code,
            &user.referred_by,
            &user.subscription_status,
            &user.is_paid,
            &user.processor_customer_id,
            &user.processor_subscription_id,
            &user.joined_at,
            &user.updated_at,
        ],
    ).await?;

    Ok(())
}

/// Set `referred_by` if it has never been set.
///
/// First-write-wins: the WHERE clause makes the check and the write one
/// atomic statement, so a second attribution for the same user changes
/// nothing.
///
/// ## Returns
///
/// * `Ok(true)` - Code was recorded
/// * `Ok(false)` - A code was already present (or the user is missing)
pub async fn set_referred_by(
    pool: &Pool,
    user_id: &str,
    code: &str,
) -> Result<bool, DatabaseError> {
    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows_affected = client.execute(
        r#"
        UPDATE users
        SET referred_by = $2, updated_at = NOW()
        WHERE id = $1 AND referred_by IS NULL
        "#,
        &[&user_id, &code],
    ).await?;

    Ok(rows_affected > 0)
}

/// Update a user's subscription state and processor ids.
pub async fn update_subscription_state(
    pool: &Pool,
    user_id: &str,
    status: &str,
    is_paid: bool,
    customer_id: Option<&str>,
    subscription_id: Option<&str>,
) -> Result<(), DatabaseError> {
    debug!("Updating subscription state for {}: {}", user_id, status);

    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows_affected = client.execute(
        r#"
        UPDATE users
        SET
            subscription_status = $2,
            is_paid = $3,
            processor_customer_id = COALESCE($4, processor_customer_id),
            processor_subscription_id = COALESCE($5, processor_subscription_id),
            updated_at = NOW()
        WHERE id = $1
        "#,
        &[&user_id, &status, &is_paid, &customer_id, &subscription_id],
    ).await?;

    if rows_affected == 0 {
        return Err(DatabaseError::NotFound(format!("User not found: {}", user_id)));
    }

    Ok(())
}

// ============================================
// AFFILIATE QUERIES
// ============================================

/// Get an affiliate account by owner.
pub async fn get_affiliate(
    pool: &Pool,
    user_id: &str,
) -> Result<Option<AffiliateRecord>, DatabaseError> {
    debug!("Fetching affiliate account: {}", user_id);

    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client.query(
        r#"
        SELECT
            user_id, referral_code,
            available_balance, pending_balance,
            total_earnings, total_withdrawn,
            active_referrals, total_referrals,
            created_at, updated_at
        FROM affiliates
        WHERE user_id = $1
        "#,
        &[&user_id],
    ).await?;

    Ok(rows.first().map(row_to_affiliate))
}

/// Create an affiliate account with zeroed balances if absent.
pub async fn ensure_affiliate(
    pool: &Pool,
    user_id: &str,
    referral_code: &str,
) -> Result<(), DatabaseError> {
    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    client.execute(
        r#"
        INSERT INTO affiliates (user_id, referral_code)
        VALUES ($1, $2)
        ON CONFLICT (user_id) DO NOTHING
        "#,
        &[&user_id, &referral_code],
    ).await?;

    Ok(())
}

/// Count one more referred signup for an affiliate.
pub async fn increment_total_referrals(
    pool: &Pool,
    user_id: &str,
) -> Result<(), DatabaseError> {
    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    client.execute(
        r#"
        UPDATE affiliates
        SET total_referrals = total_referrals + 1, updated_at = NOW()
        WHERE user_id = $1
        "#,
        &[&user_id],
    ).await?;

    Ok(())
}

// ============================================
// LEDGER QUERIES
// ============================================

/// Get ledger entries for an account, newest first.
pub async fn get_ledger_entries(
    pool: &Pool,
    user_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<LedgerEntryRecord>, DatabaseError> {
    debug!("Fetching ledger entries for: {}", user_id);

    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client.query(
        r#"
        SELECT id, user_id, amount, entry_type, note, reference, created_at
        FROM ledger_entries
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
        &[&user_id, &limit, &offset],
    ).await?;

    Ok(rows.iter().map(row_to_ledger_entry).collect())
}

/// Find the commission entry previously credited for an external
/// reference.
///
/// Used by the cancellation path to reverse exactly the amount that was
/// actually credited for that subscription, and to identify the referrer
/// it went to.
pub async fn get_commission_entry_by_reference(
    pool: &Pool,
    reference: &str,
) -> Result<Option<LedgerEntryRecord>, DatabaseError> {
    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client.query(
        r#"
        SELECT id, user_id, amount, entry_type, note, reference, created_at
        FROM ledger_entries
        WHERE reference = $1 AND entry_type = $2
        "#,
        &[&reference, &EntryType::ReferralCommission.as_str()],
    ).await?;

    Ok(rows.first().map(row_to_ledger_entry))
}

/// Sum of all signed entry amounts for an account.
///
/// The ledger is the system of record; this sum must always equal the
/// cached `available_balance`.
pub async fn sum_ledger_entries(
    pool: &Pool,
    user_id: &str,
) -> Result<i64, DatabaseError> {
    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let row = client.query_one(
        r#"
        SELECT COALESCE(SUM(amount), 0)::BIGINT AS total
        FROM ledger_entries
        WHERE user_id = $1
        "#,
        &[&user_id],
    ).await?;

    Ok(row.get("total"))
}

// ============================================
// PRODUCT QUERIES
// ============================================

/// Get active products by id.
///
/// Returns only the products that exist and are active; callers compare
/// against the requested ids to detect unknown products.
pub async fn get_products_by_ids(
    pool: &Pool,
    product_ids: &[String],
) -> Result<Vec<ProductRecord>, DatabaseError> {
    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client.query(
        r#"
        SELECT product_id, name, price
        FROM products
        WHERE product_id = ANY($1) AND active
        "#,
        &[&product_ids],
    ).await?;

    Ok(rows
        .iter()
        .map(|row| ProductRecord {
            product_id: row.get("product_id"),
            name: row.get("name"),
            price: row.get("price"),
        })
        .collect())
}

// ============================================
// ORDER QUERIES
// ============================================

/// Get a user's orders, newest first.
pub async fn get_orders_by_user(
    pool: &Pool,
    user_id: &str,
    limit: i64,
    offset: i64,
) -> Result<Vec<OrderRecord>, DatabaseError> {
    debug!("Fetching orders for: {}", user_id);

    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client.query(
        r#"
        SELECT order_id, user_id, user_email, source, items,
               amount_total, currency, payment_status, order_status,
               shipping_address, processor_session_id, created_at, updated_at
        FROM orders
        WHERE user_id = $1
        ORDER BY created_at DESC
        LIMIT $2 OFFSET $3
        "#,
        &[&user_id, &limit, &offset],
    ).await?;

    let mut orders = Vec::with_capacity(rows.len());
    for row in &rows {
        let items: serde_json::Value = row.get("items");
        orders.push(OrderRecord {
            order_id: row.get("order_id"),
            user_id: row.get("user_id"),
            user_email: row.get("user_email"),
            source: row.get("source"),
            items: serde_json::from_value(items).unwrap_or_default(),
            amount_total: row.get("amount_total"),
            currency: row.get("currency"),
            payment_status: row.get("payment_status"),
            order_status: row.get("order_status"),
            shipping_address: row.get("shipping_address"),
            processor_session_id: row.get("processor_session_id"),
            created_at: row.get("created_at"),
            updated_at: row.get("updated_at"),
        });
    }

    Ok(orders)
}

// ============================================
// SIGNAL QUERIES
// ============================================

/// Get all live signals, newest first.
pub async fn get_live_signals(
    pool: &Pool,
) -> Result<Vec<SignalRecord>, DatabaseError> {
    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client.query(
        r#"
        SELECT id, pair, direction, entry_price, stop_loss,
               tp1, tp2, tp3, notes, targets_hit, status,
               created_at, updated_at
        FROM signals_live
        ORDER BY created_at DESC
        "#,
        &[],
    ).await?;

    Ok(rows.iter().map(row_to_signal).collect())
}

/// Get one live signal.
pub async fn get_signal(
    pool: &Pool,
    id: Uuid,
) -> Result<Option<SignalRecord>, DatabaseError> {
    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client.query(
        r#"
        SELECT id, pair, direction, entry_price, stop_loss,
               tp1, tp2, tp3, notes, targets_hit, status,
               created_at, updated_at
        FROM signals_live
        WHERE id = $1
        "#,
        &[&id],
    ).await?;

    Ok(rows.first().map(row_to_signal))
}

/// Create a live signal.
pub async fn create_signal(
    pool: &Pool,
    signal: &SignalRecord,
) -> Result<(), DatabaseError> {
    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    client.execute(
        r#"
        INSERT INTO signals_live (
            id, pair, direction, entry_price, stop_loss,
            tp1, tp2, tp3, notes, targets_hit, status,
            created_at, updated_at
        )
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
        "#,
        &[
            &signal.id,
            &signal.pair,
            &signal.direction,
            &signal.entry_price,
            &signal.stop_loss,
            &signal.tp1,
            &signal.tp2,
            &signal.tp3,
            &signal.notes,
            &signal.targets_hit,
            &signal.status,
            &signal.created_at,
            &signal.updated_at,
        ],
    ).await?;

    Ok(())
}

/// Mark a take-profit target as hit, keeping the signal live.
///
/// The `NOT targets_hit @> ...` guard makes the marker monotonic: a
/// target is appended at most once no matter how many times the action
/// is clicked.
///
/// ## Returns
///
/// * `Ok(true)` - Target newly marked
/// * `Ok(false)` - Already marked (or signal missing)
pub async fn mark_target_hit(
    pool: &Pool,
    id: Uuid,
    target: i32,
) -> Result<bool, DatabaseError> {
    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let status = format!("tp{}_hit", target);
    let rows_affected = client.execute(
        r#"
        UPDATE signals_live
        SET targets_hit = array_append(targets_hit, $2),
            status = $3,
            updated_at = NOW()
        WHERE id = $1 AND NOT (targets_hit @> ARRAY[$2])
        "#,
        &[&id, &target, &status],
    ).await?;

    Ok(rows_affected > 0)
}

/// Get closed signals, most recently closed first.
pub async fn get_signal_history(
    pool: &Pool,
    limit: i64,
    offset: i64,
) -> Result<Vec<SignalHistoryRecord>, DatabaseError> {
    let client = pool.get().await
        .map_err(|e| DatabaseError::ConnectionError(e.to_string()))?;

    let rows = client.query(
        r#"
        SELECT id, pair, direction, entry_price, exit_price, result,
               tp_hit, pips, custom_pips, custom_notes, opened_at, closed_at
        FROM signals_history
        ORDER BY closed_at DESC
        LIMIT $1 OFFSET $2
        "#,
        &[&limit, &offset],
    ).await?;

    Ok(rows
        .iter()
        .map(|row| SignalHistoryRecord {
            id: row.get("id"),
            pair: row.get("pair"),
            direction: row.get("direction"),
            entry_price: row.get("entry_price"),
            exit_price: row.get("exit_price"),
            result: row.get("result"),
            tp_hit: row.get("tp_hit"),
            pips: row.get("pips"),
            custom_pips: row.get("custom_pips"),
            custom_notes: row.get("custom_notes"),
            opened_at: row.get("opened_at"),
            closed_at: row.get("closed_at"),
        })
        .collect())
}
