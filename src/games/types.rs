use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::quick_three::DiceOutcome;

/// Supported gameplay variants
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameplayType {
    QuickThree,
    // Future variants carry their own outcome type in `DrawOutcome`
}

impl fmt::Display for GameplayType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GameplayType::QuickThree => write!(f, "QUICK_THREE"),
        }
    }
}

/// What a wager is placed on
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetCategory {
    Small,
    Big,
    Single,
    Double,
    Triplet,
}

impl BetCategory {
    pub const ALL: [BetCategory; 5] = [
        BetCategory::Small,
        BetCategory::Big,
        BetCategory::Single,
        BetCategory::Double,
        BetCategory::Triplet,
    ];

    pub fn code(&self) -> &'static str {
        match self {
            BetCategory::Small => "SMALL",
            BetCategory::Big => "BIG",
            BetCategory::Single => "SINGLE",
            BetCategory::Double => "DOUBLE",
            BetCategory::Triplet => "TRIPLET",
        }
    }

    /// Label shown to chat members
    pub fn label(&self) -> &'static str {
        match self {
            BetCategory::Small => "小",
            BetCategory::Big => "大",
            BetCategory::Single => "单",
            BetCategory::Double => "双",
            BetCategory::Triplet => "豹子",
        }
    }
}

impl fmt::Display for BetCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown bet category '{0}'")]
pub struct UnknownCategory(pub String);

/// Accepts the value codes (any case) and the chat labels
impl FromStr for BetCategory {
    type Err = UnknownCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        BetCategory::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(trimmed) || c.label() == trimmed)
            .ok_or_else(|| UnknownCategory(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SizeCategory {
    Small,
    Big,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ParityCategory {
    Single,
    Double,
}

/// Wager outcome
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BetOutcome {
    Win,
    Loss,
}

/// Gameplay-specific draw detail, tagged by variant
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "gameplay", content = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DrawOutcome {
    QuickThree(DiceOutcome),
}

impl DrawOutcome {
    pub fn gameplay(&self) -> GameplayType {
        match self {
            DrawOutcome::QuickThree(_) => GameplayType::QuickThree,
        }
    }
}
