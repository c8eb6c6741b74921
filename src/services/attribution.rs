//! # Attribution Resolver Service
//!
//! Maps a new signup to the referrer who should receive credit for it,
//! using the human-shareable referral code captured from signup context.
//!
//! ## Responsibilities
//!
//! - Resolve a referral code to its owning user
//! - Record `referred_by` on the new user, exactly once
//! - Count the signup on the referrer's affiliate account
//!
//! ## Why best-effort?
//!
//! Referral capture is marketing instrumentation, not a gate on the new
//! user's own access. An unknown or self-referencing code is logged and
//! skipped; it never surfaces as an error to the signup flow.

use tracing::{info, warn};

use crate::db::queries;
use crate::db::{Database, UserRecord};

/// Errors that can occur while resolving attribution.
///
/// Only infrastructure failures are errors; unresolvable codes are a
/// skipped outcome, not a failure.
#[derive(Debug, thiserror::Error)]
pub enum AttributionError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<crate::db::DatabaseError> for AttributionError {
    fn from(e: crate::db::DatabaseError) -> Self {
        AttributionError::DatabaseError(e.to_string())
    }
}

/// Outcome of an attribution attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttributionOutcome {
    /// Code recorded and the referrer credited with the signup.
    Recorded { referrer_id: String },
    /// The user already has a referral code recorded (first write wins).
    AlreadyAttributed,
    /// The code matched no user, or matched the user themselves.
    Skipped,
}

/// The attribution resolver.
#[derive(Clone)]
pub struct AttributionResolver {
    /// Database connection.
    db: Database,
}

impl AttributionResolver {
    /// Create a new AttributionResolver instance.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Resolve a referral code to its owning user.
    ///
    /// A code whose owner is missing reports not-found rather than
    /// erroring.
    pub async fn resolve_referrer(
        &self,
        code: &str,
    ) -> Result<Option<UserRecord>, AttributionError> {
        if code.trim().is_empty() {
            return Ok(None);
        }
        Ok(queries::get_user_by_referral_code(self.db.pool(), code.trim()).await?)
    }

    /// Attribute a signup to the owner of `code`.
    ///
    /// First write wins: the underlying update only fires while
    /// `referred_by` is unset, so a second call for the same user is a
    /// no-op. Self-referral and unknown codes are skipped silently.
    ///
    /// ## Arguments
    ///
    /// * `user` - The newly created user record
    /// * `code` - Referral code captured from signup context
    pub async fn attribute(
        &self,
        user: &UserRecord,
        code: &str,
    ) -> Result<AttributionOutcome, AttributionError> {
        let code = code.trim();

        if user.referred_by.is_some() {
            return Ok(AttributionOutcome::AlreadyAttributed);
        }

        // No self-referral
        if code.eq_ignore_ascii_case(&user.referral_code) {
            warn!("User {} tried their own referral code", user.id);
            return Ok(AttributionOutcome::Skipped);
        }

        let referrer = match self.resolve_referrer(code).await? {
            Some(r) => r,
            None => {
                info!("Referral code {} resolves to no user, skipping", code);
                return Ok(AttributionOutcome::Skipped);
            }
        };

        // Resolving via the code can still land on the same user when the
        // id itself was pasted as a code.
        if referrer.id == user.id {
            warn!("User {} tried their own referral code", user.id);
            return Ok(AttributionOutcome::Skipped);
        }

        let recorded = queries::set_referred_by(self.db.pool(), &user.id, code).await?;
        if !recorded {
            // A concurrent bootstrap got there first
            return Ok(AttributionOutcome::AlreadyAttributed);
        }

        // Count the signup on the referrer's account, creating it with
        // zero balances if this is their first referral.
        queries::ensure_affiliate(self.db.pool(), &referrer.id, &referrer.referral_code)
            .await?;
        queries::increment_total_referrals(self.db.pool(), &referrer.id).await?;

        info!("User {} referred by {} ({})", user.id, referrer.id, code);

        Ok(AttributionOutcome::Recorded {
            referrer_id: referrer.id,
        })
    }
}
