//! # Commission Ledger Service
//!
//! The CommissionLedger is the only code path allowed to mutate affiliate
//! balance fields, and it does so exclusively by appending a ledger entry
//! and applying the matching delta inside one database transaction.
//!
//! ## Responsibilities
//!
//! - Credit commissions (lazily creating the affiliate account)
//! - Debit reversals, store purchases and withdrawals
//! - Enforce the non-negative balance invariant
//! - Enforce at-most-once application per external reference
//! - Serve balance and entry-history reads
//! - Verify the cached aggregate against the entry sum
//!
//! ## Flow Example: Debit
//!
//! ```text
//! 1. Validate amount > 0
//!                ↓
//! 2. BEGIN transaction
//!                ↓
//! 3. INSERT ledger entry (ON CONFLICT DO NOTHING)
//!    zero rows → duplicate reference, roll back
//!                ↓
//! 4. UPDATE balance WHERE available_balance >= amount
//!    zero rows → insufficient balance, roll back
//!                ↓
//! 5. COMMIT
//! ```
//!
//! ## Why check-and-write in one statement?
//!
//! Handlers run concurrently with no shared in-process state, and the
//! processor redelivers events. A read followed by a later write lets two
//! deliveries both pass the check; the unique index insert and the
//! conditional update cannot.

use chrono::Utc;
use tokio_postgres::Transaction;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::db::{AffiliateRecord, Database, EntryType, LedgerEntryRecord};

/// Errors that can occur in ledger operations.
#[derive(Debug, thiserror::Error)]
pub enum LedgerError {
    /// Amount was zero or negative.
    #[error("Invalid amount: {0}")]
    InvalidAmount(i64),

    /// Debit would drive the balance negative.
    #[error("Insufficient balance: available {available}, requested {requested}")]
    InsufficientBalance { available: i64, requested: i64 },

    /// An entry for this (account, type, reference) already exists.
    #[error("Duplicate reference: {0}")]
    DuplicateReference(String),

    /// No affiliate account for the given user.
    #[error("Affiliate account not found: {0}")]
    AccountNotFound(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<tokio_postgres::Error> for LedgerError {
    fn from(e: tokio_postgres::Error) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}

impl From<crate::db::DatabaseError> for LedgerError {
    fn from(e: crate::db::DatabaseError) -> Self {
        LedgerError::DatabaseError(e.to_string())
    }
}

/// Receipt returned after a successful ledger mutation.
#[derive(Debug, Clone)]
pub struct LedgerReceipt {
    /// Id of the appended entry.
    pub entry_id: Uuid,

    /// Signed amount that was recorded.
    pub amount: i64,

    /// Available balance after the mutation.
    pub balance_after: i64,
}

/// The ledger service.
///
/// ## Usage
///
/// ```rust,ignore
/// let ledger = CommissionLedger::new(db);
///
/// ledger.credit("referrer-uid", "AB12-CD34", 2500,
///     EntryType::ReferralCommission,
///     "Referral commission", Some("sub_42")).await?;
/// ```
#[derive(Clone)]
pub struct CommissionLedger {
    /// Database connection.
    db: Database,
}

impl CommissionLedger {
    /// Create a new CommissionLedger instance.
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    // ==========================================
    // MUTATIONS
    // ==========================================

    /// Credit an affiliate account.
    ///
    /// Creates the account with zeroed counters if it does not exist yet.
    /// For `referral_commission` credits the active-referral counter is
    /// incremented alongside the balance.
    ///
    /// ## Returns
    ///
    /// * `Ok(LedgerReceipt)` - Entry appended and balance updated
    /// * `Err(LedgerError::DuplicateReference)` - Reference already applied
    /// * `Err(LedgerError::InvalidAmount)` - Amount not positive
    pub async fn credit(
        &self,
        user_id: &str,
        referral_code: &str,
        amount: i64,
        entry_type: EntryType,
        note: &str,
        reference: Option<&str>,
    ) -> Result<LedgerReceipt, LedgerError> {
        let mut client = self.db.pool().get().await
            .map_err(|e| LedgerError::DatabaseError(e.to_string()))?;
        let tx = client.transaction().await?;

        let receipt =
            Self::credit_in(&tx, user_id, referral_code, amount, entry_type, note, reference)
                .await?;

        tx.commit().await?;

        info!(
            "Credited {} to {} ({}) -> balance {}",
            receipt.amount,
            user_id,
            entry_type.as_str(),
            receipt.balance_after
        );

        Ok(receipt)
    }

    /// Debit an affiliate account.
    ///
    /// The recorded entry amount is negative. Fails atomically with
    /// `InsufficientBalance` when the balance cannot cover the amount;
    /// nothing is written in that case.
    pub async fn debit(
        &self,
        user_id: &str,
        amount: i64,
        entry_type: EntryType,
        note: &str,
        reference: Option<&str>,
    ) -> Result<LedgerReceipt, LedgerError> {
        let mut client = self.db.pool().get().await
            .map_err(|e| LedgerError::DatabaseError(e.to_string()))?;
        let tx = client.transaction().await?;

        let receipt =
            Self::debit_in(&tx, user_id, amount, entry_type, note, reference).await?;

        tx.commit().await?;

        info!(
            "Debited {} from {} ({}) -> balance {}",
            amount,
            user_id,
            entry_type.as_str(),
            receipt.balance_after
        );

        Ok(receipt)
    }

    /// Apply a credit inside a caller-owned transaction.
    ///
    /// Exposed so composite operations can join a credit with their own
    /// writes in one atomic unit. The caller commits.
    pub async fn credit_in(
        tx: &Transaction<'_>,
        user_id: &str,
        referral_code: &str,
        amount: i64,
        entry_type: EntryType,
        note: &str,
        reference: Option<&str>,
    ) -> Result<LedgerReceipt, LedgerError> {
        if amount <= 0 {
            warn!("Rejected credit of {} for {}", amount, user_id);
            return Err(LedgerError::InvalidAmount(amount));
        }

        // Lazy account creation
        tx.execute(
            r#"
            INSERT INTO affiliates (user_id, referral_code)
            VALUES ($1, $2)
            ON CONFLICT (user_id) DO NOTHING
            "#,
            &[&user_id, &referral_code],
        ).await?;

        let entry_id =
            Self::append_entry(tx, user_id, amount, entry_type, note, reference).await?;

        // Matching delta on the cached aggregate
        let sql = if entry_type == EntryType::ReferralCommission {
            r#"
            UPDATE affiliates
            SET available_balance = available_balance + $2,
                total_earnings = total_earnings + $2,
                active_referrals = active_referrals + 1,
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING available_balance
            "#
        } else {
            r#"
            UPDATE affiliates
            SET available_balance = available_balance + $2,
                total_earnings = total_earnings + $2,
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING available_balance
            "#
        };

        let row = tx.query_one(sql, &[&user_id, &amount]).await?;

        Ok(LedgerReceipt {
            entry_id,
            amount,
            balance_after: row.get("available_balance"),
        })
    }

    /// Apply a debit inside a caller-owned transaction.
    ///
    /// Used directly by the balance-funded checkout, which must create
    /// its order in the same atomic unit as the debit. The caller
    /// commits; any error leaves no trace once the transaction drops.
    pub async fn debit_in(
        tx: &Transaction<'_>,
        user_id: &str,
        amount: i64,
        entry_type: EntryType,
        note: &str,
        reference: Option<&str>,
    ) -> Result<LedgerReceipt, LedgerError> {
        if amount <= 0 {
            warn!("Rejected debit of {} for {}", amount, user_id);
            return Err(LedgerError::InvalidAmount(amount));
        }

        // The WHERE clause is the non-negative-balance invariant: the
        // check and the write are one statement, and the row lock it
        // takes serializes concurrent debits against this account.
        let sql = match entry_type {
            EntryType::Withdrawal => r#"
                UPDATE affiliates
                SET available_balance = available_balance - $2,
                    total_withdrawn = total_withdrawn + $2,
                    updated_at = NOW()
                WHERE user_id = $1 AND available_balance >= $2
                RETURNING available_balance
                "#,
            EntryType::SubscriptionCancelledReversal => r#"
                UPDATE affiliates
                SET available_balance = available_balance - $2,
                    active_referrals = GREATEST(active_referrals - 1, 0),
                    updated_at = NOW()
                WHERE user_id = $1 AND available_balance >= $2
                RETURNING available_balance
                "#,
            _ => r#"
                UPDATE affiliates
                SET available_balance = available_balance - $2,
                    updated_at = NOW()
                WHERE user_id = $1 AND available_balance >= $2
                RETURNING available_balance
                "#,
        };

        let row = tx.query_opt(sql, &[&user_id, &amount]).await?;

        let Some(row) = row else {
            // Zero rows: either no account or not enough balance.
            let available = tx
                .query_opt(
                    "SELECT available_balance FROM affiliates WHERE user_id = $1",
                    &[&user_id],
                )
                .await?;

            return match available {
                Some(row) => Err(LedgerError::InsufficientBalance {
                    available: row.get("available_balance"),
                    requested: amount,
                }),
                None => Err(LedgerError::AccountNotFound(user_id.to_string())),
            };
        };

        // Entry second: a duplicate reference aborts here and the
        // transaction unwinds the balance change above.
        let entry_id =
            Self::append_entry(tx, user_id, -amount, entry_type, note, reference).await?;

        Ok(LedgerReceipt {
            entry_id,
            amount: -amount,
            balance_after: row.get("available_balance"),
        })
    }

    /// Append the immutable entry row.
    ///
    /// `ON CONFLICT DO NOTHING` against the unique
    /// (user_id, entry_type, reference) index is the idempotency gate:
    /// zero rows inserted means this external reference was already
    /// applied, and the whole operation unwinds.
    async fn append_entry(
        tx: &Transaction<'_>,
        user_id: &str,
        signed_amount: i64,
        entry_type: EntryType,
        note: &str,
        reference: Option<&str>,
    ) -> Result<Uuid, LedgerError> {
        let entry_id = Uuid::new_v4();

        let inserted = tx.execute(
            r#"
            INSERT INTO ledger_entries (
                id, user_id, amount, entry_type, note, reference, created_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ON CONFLICT DO NOTHING
            "#,
            &[
                &entry_id,
                &user_id,
                &signed_amount,
                &entry_type.as_str(),
                &note,
                &reference,
                &Utc::now(),
            ],
        ).await?;

        if inserted == 0 {
            return Err(LedgerError::DuplicateReference(
                reference.unwrap_or_default().to_string(),
            ));
        }

        Ok(entry_id)
    }

    // ==========================================
    // READS
    // ==========================================

    /// Get the affiliate account for a user.
    pub async fn balance(&self, user_id: &str) -> Result<AffiliateRecord, LedgerError> {
        queries::get_affiliate(self.db.pool(), user_id)
            .await?
            .ok_or_else(|| LedgerError::AccountNotFound(user_id.to_string()))
    }

    /// Get entry history for an account, newest first.
    pub async fn history(
        &self,
        user_id: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<LedgerEntryRecord>, LedgerError> {
        Ok(queries::get_ledger_entries(self.db.pool(), user_id, limit, offset).await?)
    }

    /// Check the cached balance against the entry sum.
    ///
    /// The entries are the system of record; the balance column is a
    /// cached aggregate that must reproduce exactly from them. Any drift
    /// is a defect and is logged as an error.
    ///
    /// ## Returns
    ///
    /// `(cached_balance, entry_sum)` — equal when consistent.
    pub async fn verify_account(&self, user_id: &str) -> Result<(i64, i64), LedgerError> {
        let account = self.balance(user_id).await?;
        let entry_sum = queries::sum_ledger_entries(self.db.pool(), user_id).await?;

        if account.available_balance != entry_sum {
            error!(
                "Ledger drift for {}: cached={}, entries={}",
                user_id, account.available_balance, entry_sum
            );
        }

        Ok((account.available_balance, entry_sum))
    }
}
