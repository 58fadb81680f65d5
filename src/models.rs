//! Persistent entities: groups, accounts, odds, draws and wagers

use crate::games::{BetCategory, BetOutcome, DrawOutcome, GameplayType};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            pub fn new(value: impl Into<String>) -> Self {
                Self(value.into())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(&self.0)
            }
        }
    };
}

string_id!(GroupId);
string_id!(AccountId);
string_id!(WagerId);
string_id!(DrawId);
string_id!(
    /// Round identifier, `YYYYMMDDHHMMSS` in local time
    IssueNumber
);

/// Chat handle on the messaging platform (group or private chat)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChatId(pub i64);

impl fmt::Display for ChatId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

pub(crate) fn new_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GroupStatus {
    Normal,
    Kicked,
    Deleted,
}

/// A chat community hosting rounds
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Group {
    pub id: GroupId,
    pub chat_id: ChatId,
    pub title: String,
    pub gameplay: GameplayType,
    pub draw_cycle_minutes: u32,
    pub gameplay_enabled: bool,
    pub status: GroupStatus,
    pub created_at: DateTime<Utc>,
}

impl Group {
    pub fn new(chat_id: ChatId, title: impl Into<String>, draw_cycle_minutes: u32) -> Self {
        Self {
            id: GroupId::new(new_id()),
            chat_id,
            title: title.into(),
            gameplay: GameplayType::QuickThree,
            draw_cycle_minutes,
            gameplay_enabled: false,
            status: GroupStatus::Normal,
            created_at: Utc::now(),
        }
    }

    /// Eligible for a round task: gameplay on and the bot still in the chat
    pub fn is_playable(&self) -> bool {
        self.gameplay_enabled && self.status == GroupStatus::Normal
    }

    pub fn draw_cycle(&self) -> std::time::Duration {
        std::time::Duration::from_secs(u64::from(self.draw_cycle_minutes.max(1)) * 60)
    }
}

/// A member's balance holder within one group
/// Balances, stakes and payouts are kept to the cent
pub const MONEY_SCALE: u32 = 2;

/// Whether `amount` fits the ledger's precision; trailing zeros are ignored
pub fn is_money_amount(amount: Decimal) -> bool {
    amount.normalize().scale() <= MONEY_SCALE
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Account {
    pub id: AccountId,
    pub group_id: GroupId,
    /// Platform user id; also the private chat used for notifications
    pub user_id: i64,
    pub username: String,
    pub balance: Decimal,
    pub registered: bool,
    pub left_group: bool,
    pub created_at: DateTime<Utc>,
}

impl Account {
    pub fn new(group_id: GroupId, user_id: i64, username: impl Into<String>) -> Self {
        Self {
            id: AccountId::new(new_id()),
            group_id,
            user_id,
            username: username.into(),
            balance: Decimal::ZERO,
            registered: true,
            left_group: false,
            created_at: Utc::now(),
        }
    }

    pub fn private_chat(&self) -> ChatId {
        ChatId(self.user_id)
    }
}

/// Per-group payout multipliers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct OddsConfig {
    pub group_id: GroupId,
    pub simple_odds: Decimal,
    pub triplet_odds: Decimal,
}

/// Header of a completed draw; the gameplay detail lives in `outcome`
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Draw {
    pub id: DrawId,
    pub group_id: GroupId,
    pub issue: IssueNumber,
    pub gameplay: GameplayType,
    pub outcome: DrawOutcome,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SettleStatus {
    Unsettled,
    Settled,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct WagerResult {
    pub outcome: BetOutcome,
    /// `+payout` on a win, `-stake` on a loss
    pub amount: Decimal,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Wager {
    pub id: WagerId,
    pub group_id: GroupId,
    pub account_id: AccountId,
    pub issue: IssueNumber,
    pub gameplay: GameplayType,
    pub category: BetCategory,
    pub stake: Decimal,
    pub status: SettleStatus,
    pub result: Option<WagerResult>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Wager {
    pub fn is_settled(&self) -> bool {
        self.status == SettleStatus::Settled
    }
}
