//! # Signal Notifier Service
//!
//! Delivers typed trade-signal messages to the configured Telegram chat.
//!
//! Delivery is strictly fire-and-forget: a failed or misconfigured send
//! is logged and swallowed, and must never fail or roll back the signal
//! operation that triggered it.

use serde_json::json;
use tracing::{error, info, warn};

/// The kinds of message the sink understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalEventKind {
    /// A new trade idea was posted
    NewTrade,
    /// First take-profit reached
    Tp1Hit,
    /// Second take-profit reached
    Tp2Hit,
    /// Final take-profit reached
    Tp3Hit,
    /// Stop loss reached
    LossHit,
    /// Closed at break even
    BeHit,
}

/// Payload rendered into the outgoing message.
#[derive(Debug, Clone)]
pub struct SignalNotification {
    pub kind: SignalEventKind,
    pub pair: String,
    pub direction: String,
    /// Pip text, e.g. "+65 pips".
    pub custom_pips: Option<String>,
    /// Free-text note appended to the message.
    pub custom_notes: Option<String>,
}

/// The notifier service.
#[derive(Clone)]
pub struct SignalNotifier {
    http: reqwest::Client,
    bot_token: String,
    chat_id: String,
}

impl SignalNotifier {
    /// Create a new SignalNotifier instance.
    ///
    /// An empty token or chat id disables sending; operations that would
    /// notify still succeed.
    pub fn new(bot_token: String, chat_id: String) -> Self {
        if bot_token.is_empty() || chat_id.is_empty() {
            warn!("Telegram notifier not configured, notifications disabled");
        }

        Self {
            http: reqwest::Client::new(),
            bot_token,
            chat_id,
        }
    }

    /// Send a notification.
    ///
    /// Never returns an error: failures are logged and dropped so the
    /// triggering operation is unaffected.
    pub async fn notify(&self, notification: &SignalNotification) {
        if self.bot_token.is_empty() || self.chat_id.is_empty() {
            return;
        }

        let text = render_message(notification);
        let url = format!("https://api.telegram.org/bot{}/sendMessage", self.bot_token);

        let result = self
            .http
            .post(&url)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "Markdown",
                "disable_web_page_preview": true,
            }))
            .send()
            .await;

        match result {
            Ok(response) if response.status().is_success() => {
                info!(
                    "✅ Telegram notification sent: {:?} ({} {})",
                    notification.kind, notification.pair, notification.direction
                );
            }
            Ok(response) => {
                error!(
                    "Telegram API error {} for {:?}",
                    response.status(),
                    notification.kind
                );
            }
            Err(e) => {
                error!("Telegram send failed for {:?}: {}", notification.kind, e);
            }
        }
    }
}

/// Render a notification into the Markdown message body.
fn render_message(n: &SignalNotification) -> String {
    let pair = if n.pair.is_empty() { "Signal" } else { &n.pair };
    let pips = n.custom_pips.as_deref().unwrap_or("");
    let notes = n.custom_notes.as_deref().unwrap_or("");

    let mut message = match n.kind {
        SignalEventKind::NewTrade => {
            return "🟣 *New trade idea posted*\n\n\
                    A new trade idea has been added to the members dashboard.\n\
                    Log in to view the full breakdown."
                .to_string();
        }
        SignalEventKind::Tp1Hit => format!("✅ *TP1 HIT*\n\n{} TP1 HIT.", pair),
        SignalEventKind::Tp2Hit => format!("✅ *TP2 HIT*\n\n{} TP2 HIT.", pair),
        SignalEventKind::Tp3Hit => format!("✅ *TP3 HIT*\n\n{} TP3 HIT.", pair),
        SignalEventKind::LossHit => format!("❌ *STOP LOSS HIT*\n\n{} hit stop loss.", pair),
        SignalEventKind::BeHit => {
            format!("⚖️ *BREAK EVEN*\n\n{} closed at break even.", pair)
        }
    };

    match n.kind {
        SignalEventKind::Tp1Hit | SignalEventKind::Tp2Hit | SignalEventKind::Tp3Hit => {
            if !pips.is_empty() {
                message.push_str(&format!("\n💰 {}", pips));
            }
            if !notes.is_empty() {
                message.push_str(&format!("\n\n📝 {}", notes));
            }
        }
        SignalEventKind::LossHit => {
            if !pips.is_empty() {
                message.push_str(&format!("\n📉 {}", pips));
            }
            if !notes.is_empty() {
                message.push_str(&format!("\n\n{}", notes));
            } else {
                message.push_str("\n\nOnto the next setup.");
            }
        }
        SignalEventKind::BeHit => {
            if !notes.is_empty() {
                message.push_str(&format!("\n\n{}", notes));
            } else {
                message.push_str("\n\nNo gain, no loss.");
            }
        }
        SignalEventKind::NewTrade => {}
    }

    message
}

#[cfg(test)]
mod tests {
    use super::*;

    fn notification(kind: SignalEventKind) -> SignalNotification {
        SignalNotification {
            kind,
            pair: "XAUUSD".to_string(),
            direction: "Buy".to_string(),
            custom_pips: None,
            custom_notes: None,
        }
    }

    #[test]
    fn test_tp_message_includes_pips_and_notes() {
        let mut n = notification(SignalEventKind::Tp1Hit);
        n.custom_pips = Some("+65 pips".to_string());
        n.custom_notes = Some("Stop to entry".to_string());

        let msg = render_message(&n);
        assert!(msg.contains("TP1 HIT"));
        assert!(msg.contains("XAUUSD"));
        assert!(msg.contains("💰 +65 pips"));
        assert!(msg.contains("📝 Stop to entry"));
    }

    #[test]
    fn test_loss_message_default_note() {
        let msg = render_message(&notification(SignalEventKind::LossHit));
        assert!(msg.contains("STOP LOSS HIT"));
        assert!(msg.contains("Onto the next setup."));
    }

    #[test]
    fn test_be_message_default_note() {
        let msg = render_message(&notification(SignalEventKind::BeHit));
        assert!(msg.contains("BREAK EVEN"));
        assert!(msg.contains("No gain, no loss."));
    }

    #[test]
    fn test_empty_pair_falls_back() {
        let mut n = notification(SignalEventKind::Tp2Hit);
        n.pair = String::new();
        assert!(render_message(&n).contains("Signal TP2 HIT."));
    }
}
