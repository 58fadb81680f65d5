//! Quick Three: three six-sided dice per draw
//!
//! Size and parity are always decided; a triplet is an additional flag, so a
//! Small bet still wins on 3-3-3.

use super::types::{BetCategory, BetOutcome, ParityCategory, SizeCategory};
use crate::errors::GameError;
use crate::models::{OddsConfig, MONEY_SCALE};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

pub const DICE_PER_DRAW: usize = 3;

/// Highest total that still counts as Small
pub const SMALL_MAX_TOTAL: u8 = 10;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct DiceOutcome {
    pub dice: [u8; DICE_PER_DRAW],
    pub total: u8,
    pub size: SizeCategory,
    pub parity: ParityCategory,
    pub triplet: bool,
}

impl DiceOutcome {
    pub fn from_dice(dice: [u8; DICE_PER_DRAW]) -> Result<Self, GameError> {
        if let Some(bad) = dice.iter().copied().find(|d| !(1..=6).contains(d)) {
            return Err(GameError::InvalidDieValue(bad));
        }

        let total: u8 = dice.iter().sum();
        let size = if total <= SMALL_MAX_TOTAL {
            SizeCategory::Small
        } else {
            SizeCategory::Big
        };
        let parity = if total % 2 == 1 {
            ParityCategory::Single
        } else {
            ParityCategory::Double
        };
        let triplet = dice[0] == dice[1] && dice[1] == dice[2];

        Ok(Self {
            dice,
            total,
            size,
            parity,
            triplet,
        })
    }

    /// Whether a wager on `category` wins, and at which odds tier
    pub fn matches(&self, category: BetCategory) -> Option<OddsTier> {
        match category {
            BetCategory::Small if self.size == SizeCategory::Small => Some(OddsTier::Simple),
            BetCategory::Big if self.size == SizeCategory::Big => Some(OddsTier::Simple),
            BetCategory::Single if self.parity == ParityCategory::Single => Some(OddsTier::Simple),
            BetCategory::Double if self.parity == ParityCategory::Double => Some(OddsTier::Simple),
            BetCategory::Triplet if self.triplet => Some(OddsTier::Triplet),
            _ => None,
        }
    }

    pub fn summary(&self) -> String {
        let size = match self.size {
            SizeCategory::Small => BetCategory::Small.label(),
            SizeCategory::Big => BetCategory::Big.label(),
        };
        let parity = match self.parity {
            ParityCategory::Single => BetCategory::Single.label(),
            ParityCategory::Double => BetCategory::Double.label(),
        };
        let mut text = format!(
            "{} {} {} = {} ({}{})",
            self.dice[0], self.dice[1], self.dice[2], self.total, size, parity
        );
        if self.triplet {
            text.push_str(&format!(" {}", BetCategory::Triplet.label()));
        }
        text
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OddsTier {
    Simple,
    Triplet,
}

/// How one wager settles against a draw
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WagerResolution {
    pub outcome: BetOutcome,
    /// Amount credited back to the account (zero on a loss)
    pub payout: Decimal,
    /// Signed result recorded on the wager: `+payout` or `-stake`
    pub result_amount: Decimal,
}

pub fn resolve(
    outcome: &DiceOutcome,
    category: BetCategory,
    stake: Decimal,
    odds: &OddsConfig,
) -> WagerResolution {
    match outcome.matches(category) {
        Some(tier) => {
            let multiplier = match tier {
                OddsTier::Simple => odds.simple_odds,
                OddsTier::Triplet => odds.triplet_odds,
            };
            let payout = (stake * multiplier).round_dp(MONEY_SCALE);
            WagerResolution {
                outcome: BetOutcome::Win,
                payout,
                result_amount: payout,
            }
        }
        None => WagerResolution {
            outcome: BetOutcome::Loss,
            payout: Decimal::ZERO,
            result_amount: -stake,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::GroupId;
    use rust_decimal_macros::dec;

    fn odds() -> OddsConfig {
        OddsConfig {
            group_id: GroupId::new("g"),
            simple_odds: dec!(2),
            triplet_odds: dec!(10),
        }
    }

    fn all_rolls() -> impl Iterator<Item = [u8; 3]> {
        (1..=6u8).flat_map(|a| (1..=6u8).flat_map(move |b| (1..=6u8).map(move |c| [a, b, c])))
    }

    #[test]
    fn test_outcome_properties_hold_for_every_roll() {
        let mut count = 0;
        for dice in all_rolls() {
            let outcome = DiceOutcome::from_dice(dice).unwrap();
            let total: u8 = dice.iter().sum();

            assert_eq!(outcome.total, total);
            assert!((3..=18).contains(&outcome.total));
            assert_eq!(outcome.size == SizeCategory::Small, total <= 10);
            assert_eq!(outcome.parity == ParityCategory::Single, total % 2 == 1);
            assert_eq!(outcome.triplet, dice[0] == dice[1] && dice[1] == dice[2]);
            count += 1;
        }
        assert_eq!(count, 216);
    }

    #[test]
    fn test_boundary_totals() {
        let ten = DiceOutcome::from_dice([4, 4, 2]).unwrap();
        assert_eq!(ten.size, SizeCategory::Small);
        assert_eq!(ten.parity, ParityCategory::Double);

        let eleven = DiceOutcome::from_dice([5, 4, 2]).unwrap();
        assert_eq!(eleven.size, SizeCategory::Big);
        assert_eq!(eleven.parity, ParityCategory::Single);
    }

    #[test]
    fn test_out_of_range_die_rejected() {
        assert!(matches!(
            DiceOutcome::from_dice([0, 3, 4]),
            Err(GameError::InvalidDieValue(0))
        ));
        assert!(matches!(
            DiceOutcome::from_dice([1, 7, 4]),
            Err(GameError::InvalidDieValue(7))
        ));
    }

    #[test]
    fn test_resolution_pays_simple_and_triplet_odds() {
        let draw = DiceOutcome::from_dice([3, 3, 3]).unwrap();

        let small = resolve(&draw, BetCategory::Small, dec!(100), &odds());
        assert_eq!(small.outcome, BetOutcome::Win);
        assert_eq!(small.payout, dec!(200));

        let triplet = resolve(&draw, BetCategory::Triplet, dec!(10), &odds());
        assert_eq!(triplet.payout, dec!(100));
        assert_eq!(triplet.result_amount, dec!(100));

        let big = resolve(&draw, BetCategory::Big, dec!(50), &odds());
        assert_eq!(big.outcome, BetOutcome::Loss);
        assert_eq!(big.payout, Decimal::ZERO);
        assert_eq!(big.result_amount, dec!(-50));
    }

    #[test]
    fn test_triplet_bet_loses_without_triplet() {
        let draw = DiceOutcome::from_dice([1, 2, 3]).unwrap();
        let resolution = resolve(&draw, BetCategory::Triplet, dec!(5), &odds());
        assert_eq!(resolution.outcome, BetOutcome::Loss);
    }

    #[test]
    fn test_summary_mentions_triplet() {
        let draw = DiceOutcome::from_dice([6, 6, 6]).unwrap();
        assert!(draw.summary().contains("18"));
        assert!(draw.summary().contains("豹子"));
    }
}
