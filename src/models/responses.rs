//! # API Response Models
//!
//! Structures for outgoing API response bodies.
//! All responses are wrapped in a standard format.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Standard API response wrapper.
///
/// All API responses follow this format:
///
/// ## Success Response
///
/// ```json
/// {
///     "success": true,
///     "data": { ... },
///     "error": null
/// }
/// ```
///
/// ## Error Response
///
/// ```json
/// {
///     "success": false,
///     "data": null,
///     "error": {
///         "code": "INSUFFICIENT_BALANCE",
///         "message": "Not enough available balance"
///     }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    /// Whether the request was successful.
    pub success: bool,

    /// Response data (null on error).
    pub data: Option<T>,

    /// Error information (null on success).
    pub error: Option<ApiError>,
}

impl<T> ApiResponse<T> {
    /// Create a successful response with data.
    pub fn success(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
        }
    }

    /// Create an error response.
    pub fn error(code: &str, message: &str) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(ApiError {
                code: code.to_string(),
                message: message.to_string(),
            }),
        }
    }
}

/// API error information.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    /// Error code (e.g., "INSUFFICIENT_BALANCE").
    pub code: String,

    /// Human-readable error message.
    pub message: String,
}

/// Affiliate balance response.
///
/// Returned by `GET /affiliate/balance/{user}`
///
/// ## Example Response
///
/// ```json
/// {
///     "success": true,
///     "data": {
///         "userId": "uid-123",
///         "referralCode": "AB12-CD34",
///         "availableBalance": 2500,
///         "pendingBalance": 0,
///         "totalEarnings": 5000,
///         "totalWithdrawn": 2500,
///         "activeReferrals": 1,
///         "totalReferrals": 2,
///         "formattedAvailable": "£25.00"
///     }
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AffiliateBalanceResponse {
    /// Account owner.
    pub user_id: String,

    /// The owner's shareable referral code.
    pub referral_code: String,

    /// Spendable balance in pence.
    pub available_balance: i64,

    /// Earned but not yet releasable, in pence.
    pub pending_balance: i64,

    /// Lifetime credited total in pence.
    pub total_earnings: i64,

    /// Lifetime withdrawn total in pence.
    pub total_withdrawn: i64,

    /// Currently paying referred users.
    pub active_referrals: i32,

    /// Users ever referred.
    pub total_referrals: i32,

    /// Human-readable available balance (e.g., "£25.00").
    pub formatted_available: String,

    /// When the account was created.
    pub created_at: DateTime<Utc>,

    /// Last update timestamp.
    pub last_updated: DateTime<Utc>,
}

/// Ledger entry response.
///
/// Returned in ledger history.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerEntryResponse {
    /// Entry ID.
    pub id: Uuid,

    /// Entry type.
    pub entry_type: String,

    /// Signed amount in pence.
    pub amount: i64,

    /// Human-readable amount.
    pub formatted_amount: String,

    /// Entry note.
    pub note: String,

    /// Originating external reference, if any.
    pub reference: Option<String>,

    /// When the entry was appended.
    pub created_at: DateTime<Utc>,
}

/// Ledger history response with pagination.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LedgerListResponse {
    /// Entries, newest first.
    pub entries: Vec<LedgerEntryResponse>,

    /// Current offset.
    pub offset: i64,

    /// Number of items requested.
    pub limit: i64,
}

/// Ledger reproducibility check response.
///
/// Returned by `GET /affiliate/verify/{user}`
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyAccountResponse {
    /// Account owner.
    pub user_id: String,

    /// Cached balance column.
    pub cached_balance: i64,

    /// Sum of all ledger entry amounts.
    pub entry_sum: i64,

    /// cached_balance - entry_sum; zero when consistent.
    pub difference: i64,

    /// Whether the cached aggregate matches the entries.
    pub consistent: bool,
}

/// Order creation response.
///
/// Returned after a balance-funded checkout.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderResponse {
    /// The new order's id.
    pub order_id: String,

    /// Order total in pence.
    pub amount_total: i64,

    /// Currency code.
    pub currency: String,

    /// Remaining affiliate balance after the debit, in pence.
    pub remaining_balance: i64,
}

/// Withdrawal response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WithdrawResponse {
    /// Ledger entry recorded for the withdrawal.
    pub entry_id: Uuid,

    /// Amount withdrawn in pence.
    pub amount: i64,

    /// Remaining available balance in pence.
    pub remaining_balance: i64,
}

/// Health check response.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    /// Service status: "healthy" or "unhealthy".
    pub status: String,

    /// Database connection status.
    pub database: bool,

    /// Service version.
    pub version: String,

    /// Current timestamp.
    pub timestamp: DateTime<Utc>,
}
