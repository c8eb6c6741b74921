//! # Services Module
//!
//! This module contains the core business logic services for the
//! membership backend. Each service handles a specific domain.
//!
//! ## Services Overview
//!
//! | Service | Responsibility |
//! |---------|---------------|
//! | `CommissionLedger` | Sole mutator of affiliate balances; entry history |
//! | `AttributionResolver` | Referral codes, first-write-wins attribution |
//! | `EventReconciler` | Processor events → user state + ledger effects |
//! | `SignalBoard` | Live trade signals and their closed history |
//! | `SignalNotifier` | Fire-and-forget Telegram messages |
//!
//! ## Service Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        SERVICES LAYER                            │
//! │                                                                  │
//! │  ┌──────────────────────────────────────────────────────────┐   │
//! │  │                    EventReconciler                        │   │
//! │  │  • on_subscription_activated()  • on_order_completed()    │   │
//! │  │  • on_subscription_cancelled()  • place_balance_order()   │   │
//! │  └──────────────────────────────────────────────────────────┘   │
//! │                │                          │                      │
//! │                ▼                          ▼                      │
//! │  ┌──────────────────────┐    ┌──────────────────────┐           │
//! │  │  CommissionLedger    │    │ AttributionResolver  │           │
//! │  │  credit() / debit()  │    │ attribute()          │           │
//! │  └──────────────────────┘    └──────────────────────┘           │
//! │                                                                  │
//! │  ┌──────────────────────┐    ┌──────────────────────┐           │
//! │  │     SignalBoard      │───▶│    SignalNotifier    │           │
//! │  │  post() / act()      │    │  notify()            │           │
//! │  └──────────────────────┘    └──────────────────────┘           │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod attribution;
pub mod ledger;
pub mod notifier;
pub mod reconciler;
pub mod signals;

pub use attribution::AttributionResolver;
pub use ledger::CommissionLedger;
pub use notifier::SignalNotifier;
pub use reconciler::EventReconciler;
pub use signals::SignalBoard;
