//! QuickThree - scheduled dice rounds for group chats
//!
//! Each enabled group runs a periodic draw task. Members stake balance on
//! Small/Big/Single/Double/Triplet against the open issue; every draw closes
//! the issue, rolls three dice, records the outcome, opens the next issue
//! and settles the closed one's wagers in the background.

pub mod admin;
pub mod clock;
pub mod config;
pub mod draw;
pub mod errors;
pub mod games;
pub mod ledger_store;
pub mod lifecycle;
pub mod locks;
pub mod messenger;
pub mod models;
pub mod round_cache;
pub mod scheduler;
pub mod services;
pub mod settlement;
pub mod storage;
pub mod wager;

pub use config::{ConfigLoader, QuickThreeConfig};
pub use errors::{QuickThreeError, QuickThreeResult};
pub use games::{BetCategory, GameplayType};
pub use models::{Account, AccountId, ChatId, Draw, Group, GroupId, IssueNumber, OddsConfig, Wager};
pub use services::{GameContext, ServiceBuilder, ServiceContainer};
pub use wager::{RejectReason, WagerDecision};
