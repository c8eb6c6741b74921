//! # Signal Board Service
//!
//! The live trade-signal board. A posted signal stays live while
//! take-profit markers accumulate; hitting the final target, the stop, or
//! break-even closes it into the history table.
//!
//! ## State Transitions
//!
//! ```text
//! post → open
//! TP1 / TP2 → marker added, signal stays live
//! TP3 / LOSS / BE → history record written, live row deleted
//! ```
//!
//! Every transition fires a notification through the sink; delivery
//! failures never affect the transition itself.

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::db::queries;
use crate::db::{Database, SignalHistoryRecord, SignalRecord};
use crate::models::PostSignalRequest;
use crate::services::notifier::{SignalEventKind, SignalNotification, SignalNotifier};

/// Errors that can occur on the signal board.
#[derive(Debug, thiserror::Error)]
pub enum SignalError {
    /// No live signal with the given id.
    #[error("Signal not found: {0}")]
    NotFound(Uuid),

    /// Invalid input provided.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Database operation failed.
    #[error("Database error: {0}")]
    DatabaseError(String),
}

impl From<crate::db::DatabaseError> for SignalError {
    fn from(e: crate::db::DatabaseError) -> Self {
        SignalError::DatabaseError(e.to_string())
    }
}

impl From<tokio_postgres::Error> for SignalError {
    fn from(e: tokio_postgres::Error) -> Self {
        SignalError::DatabaseError(e.to_string())
    }
}

/// Admin actions on a live signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    Tp1,
    Tp2,
    Tp3,
    Loss,
    BreakEven,
}

impl SignalAction {
    /// Parse the wire value ("TP1", "TP2", "TP3", "LOSS", "BE").
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "TP1" => Some(SignalAction::Tp1),
            "TP2" => Some(SignalAction::Tp2),
            "TP3" => Some(SignalAction::Tp3),
            "LOSS" => Some(SignalAction::Loss),
            "BE" => Some(SignalAction::BreakEven),
            _ => None,
        }
    }
}

/// What an admin action did.
#[derive(Debug, Clone)]
pub enum SignalActionOutcome {
    /// Target marked, signal still live.
    Marked { target: i32 },
    /// Target was already marked; nothing changed.
    AlreadyMarked { target: i32 },
    /// Signal closed into history.
    Closed { result: String, pips: f64 },
}

/// The signal board service.
#[derive(Clone)]
pub struct SignalBoard {
    /// Database connection.
    db: Database,

    /// Notification sink.
    notifier: SignalNotifier,
}

impl SignalBoard {
    /// Create a new SignalBoard instance.
    pub fn new(db: Database, notifier: SignalNotifier) -> Self {
        Self { db, notifier }
    }

    /// Post a new live signal.
    pub async fn post(&self, request: PostSignalRequest) -> Result<SignalRecord, SignalError> {
        if request.entry.trim().is_empty() || request.stop_loss.trim().is_empty() {
            return Err(SignalError::InvalidInput(
                "Entry and stop loss are required".to_string(),
            ));
        }

        let direction = if request.direction.eq_ignore_ascii_case("sell") {
            "Sell"
        } else {
            "Buy"
        };

        let now = Utc::now();
        let signal = SignalRecord {
            id: Uuid::new_v4(),
            pair: request.pair.trim().to_uppercase(),
            direction: direction.to_string(),
            entry_price: request.entry.trim().to_string(),
            stop_loss: request.stop_loss.trim().to_string(),
            tp1: none_if_empty(request.tp1),
            tp2: none_if_empty(request.tp2),
            tp3: none_if_empty(request.tp3),
            notes: none_if_empty(request.notes),
            targets_hit: Vec::new(),
            status: "open".to_string(),
            created_at: now,
            updated_at: now,
        };

        queries::create_signal(self.db.pool(), &signal).await?;
        info!("Signal posted: {} {} @ {}", signal.pair, signal.direction, signal.entry_price);

        self.notifier
            .notify(&SignalNotification {
                kind: SignalEventKind::NewTrade,
                pair: signal.pair.clone(),
                direction: signal.direction.clone(),
                custom_pips: None,
                custom_notes: None,
            })
            .await;

        Ok(signal)
    }

    /// Apply an admin action to a live signal.
    ///
    /// TP1/TP2 mark the target and keep the signal live; TP3, LOSS and BE
    /// close it into history inside one transaction.
    pub async fn act(
        &self,
        id: Uuid,
        action: SignalAction,
        custom_pips: Option<String>,
        custom_notes: Option<String>,
    ) -> Result<SignalActionOutcome, SignalError> {
        let signal = queries::get_signal(self.db.pool(), id)
            .await?
            .ok_or(SignalError::NotFound(id))?;

        match action {
            SignalAction::Tp1 | SignalAction::Tp2 => {
                let target = if action == SignalAction::Tp1 { 1 } else { 2 };

                let marked = queries::mark_target_hit(self.db.pool(), id, target).await?;
                if !marked {
                    return Ok(SignalActionOutcome::AlreadyMarked { target });
                }

                info!("Signal {} TP{} marked, still live", id, target);

                let kind = if target == 1 {
                    SignalEventKind::Tp1Hit
                } else {
                    SignalEventKind::Tp2Hit
                };
                self.notifier
                    .notify(&SignalNotification {
                        kind,
                        pair: signal.pair.clone(),
                        direction: signal.direction.clone(),
                        custom_pips,
                        custom_notes,
                    })
                    .await;

                Ok(SignalActionOutcome::Marked { target })
            }
            SignalAction::Tp3 | SignalAction::Loss | SignalAction::BreakEven => {
                self.close(signal, action, custom_pips, custom_notes).await
            }
        }
    }

    /// Close a signal into history and delete the live row.
    async fn close(
        &self,
        signal: SignalRecord,
        action: SignalAction,
        custom_pips: Option<String>,
        custom_notes: Option<String>,
    ) -> Result<SignalActionOutcome, SignalError> {
        let entry = signal.entry_price.clone();

        // Exit falls back through the posted levels when a target was
        // never filled in.
        let (result, tp_hit, exit, kind) = match action {
            SignalAction::Tp3 => (
                "win",
                3,
                signal
                    .tp3
                    .clone()
                    .or_else(|| signal.tp2.clone())
                    .or_else(|| signal.tp1.clone())
                    .unwrap_or_else(|| entry.clone()),
                SignalEventKind::Tp3Hit,
            ),
            SignalAction::Loss => ("loss", 0, signal.stop_loss.clone(), SignalEventKind::LossHit),
            SignalAction::BreakEven => ("be", 0, entry.clone(), SignalEventKind::BeHit),
            _ => unreachable!("only closing actions reach here"),
        };

        let pips = calculate_pips(&signal.pair, &signal.direction, &entry, &exit);

        let history = SignalHistoryRecord {
            id: Uuid::new_v4(),
            pair: signal.pair.clone(),
            direction: signal.direction.clone(),
            entry_price: entry,
            exit_price: exit,
            result: result.to_string(),
            tp_hit,
            pips,
            custom_pips: custom_pips.clone(),
            custom_notes: custom_notes.clone(),
            opened_at: Some(signal.created_at),
            closed_at: Utc::now(),
        };

        // History insert and live delete are one atomic unit: a signal is
        // either live or closed, never both, never neither.
        let mut client = self.db.pool().get().await
            .map_err(|e| SignalError::DatabaseError(e.to_string()))?;
        let tx = client.transaction().await?;

        tx.execute(
            r#"
            INSERT INTO signals_history (
                id, pair, direction, entry_price, exit_price, result,
                tp_hit, pips, custom_pips, custom_notes, opened_at, closed_at
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
            "#,
            &[
                &history.id,
                &history.pair,
                &history.direction,
                &history.entry_price,
                &history.exit_price,
                &history.result,
                &history.tp_hit,
                &history.pips,
                &history.custom_pips,
                &history.custom_notes,
                &history.opened_at,
                &history.closed_at,
            ],
        ).await?;

        let deleted = tx
            .execute("DELETE FROM signals_live WHERE id = $1", &[&signal.id])
            .await?;

        if deleted == 0 {
            // A concurrent action already closed it; drop our duplicate
            warn!("Signal {} vanished during close, ignoring", signal.id);
            return Ok(SignalActionOutcome::Closed {
                result: result.to_string(),
                pips,
            });
        }

        tx.commit().await?;

        info!("✅ Signal {} closed: {} ({} pips)", signal.id, result, pips);

        self.notifier
            .notify(&SignalNotification {
                kind,
                pair: signal.pair.clone(),
                direction: signal.direction.clone(),
                custom_pips,
                custom_notes,
            })
            .await;

        Ok(SignalActionOutcome::Closed {
            result: result.to_string(),
            pips,
        })
    }

    /// All live signals, newest first.
    pub async fn live(&self) -> Result<Vec<SignalRecord>, SignalError> {
        Ok(queries::get_live_signals(self.db.pool()).await?)
    }

    /// Closed signals, most recently closed first.
    pub async fn history(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<SignalHistoryRecord>, SignalError> {
        Ok(queries::get_signal_history(self.db.pool(), limit, offset).await?)
    }
}

fn none_if_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Pip result between entry and exit for a pair.
///
/// JPY pairs move in hundredths, metals and crypto trade in whole price
/// units, everything else in ten-thousandths. Sell direction inverts the
/// difference. Unparseable prices yield 0.
pub fn calculate_pips(pair: &str, direction: &str, entry: &str, exit: &str) -> f64 {
    let (Ok(entry), Ok(exit)) = (entry.parse::<f64>(), exit.parse::<f64>()) else {
        return 0.0;
    };

    let upper = pair.to_uppercase();
    let multiplier = if upper.ends_with("JPY") {
        100.0
    } else if upper.contains("XAU")
        || upper.contains("XAG")
        || upper.contains("BTC")
        || upper.contains("ETH")
    {
        1.0
    } else {
        10_000.0
    };

    let mut diff = exit - entry;
    if direction.eq_ignore_ascii_case("sell") {
        diff = -diff;
    }

    (diff * multiplier * 10.0).round() / 10.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pips_default_pair() {
        assert_eq!(calculate_pips("EURUSD", "Buy", "1.1000", "1.1050"), 50.0);
        assert_eq!(calculate_pips("EURUSD", "Sell", "1.1000", "1.1050"), -50.0);
    }

    #[test]
    fn test_pips_jpy_pair() {
        assert_eq!(calculate_pips("USDJPY", "Buy", "150.00", "150.75"), 75.0);
        assert_eq!(calculate_pips("USDJPY", "Sell", "150.00", "149.50"), 50.0);
    }

    #[test]
    fn test_pips_metals_and_crypto() {
        assert_eq!(calculate_pips("XAUUSD", "Buy", "2388.5", "2395.0"), 6.5);
        assert_eq!(calculate_pips("BTCUSD", "Sell", "61000", "60500"), 500.0);
    }

    #[test]
    fn test_pips_unparseable_prices() {
        assert_eq!(calculate_pips("EURUSD", "Buy", "n/a", "1.1"), 0.0);
        assert_eq!(calculate_pips("EURUSD", "Buy", "1.1", ""), 0.0);
    }

    #[test]
    fn test_action_parse() {
        assert_eq!(SignalAction::parse("TP1"), Some(SignalAction::Tp1));
        assert_eq!(SignalAction::parse("tp3"), Some(SignalAction::Tp3));
        assert_eq!(SignalAction::parse("LOSS"), Some(SignalAction::Loss));
        assert_eq!(SignalAction::parse("BE"), Some(SignalAction::BreakEven));
        assert_eq!(SignalAction::parse("NOPE"), None);
    }
}
