//! Loyalty points ledger.
//!
//! One point is earned for every 10 shillings spent. Amounts flow through the
//! system as cents, so a point is worth 1000 cents of spend.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const CENTS_PER_POINT: u64 = 1_000;
pub const SILVER_TIER_THRESHOLD: u64 = 500;
pub const GOLD_TIER_THRESHOLD: u64 = 2_000;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reward {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub points_required: u64,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardCatalog {
    pub rewards: Vec<Reward>,
}

impl RewardCatalog {
    pub fn new(rewards: Vec<Reward>) -> Self {
        Self { rewards }
    }

    pub fn get(&self, reward_id: &str) -> Option<&Reward> {
        self.rewards.iter().find(|r| r.id == reward_id)
    }

    pub fn active(&self) -> impl Iterator<Item = &Reward> {
        self.rewards.iter().filter(|r| r.is_active)
    }
}

impl Default for RewardCatalog {
    fn default() -> Self {
        let reward = |id: &str, name: &str, description: &str, points_required: u64| Reward {
            id: id.to_string(),
            name: name.to_string(),
            description: description.to_string(),
            points_required,
            is_active: true,
        };
        Self {
            rewards: vec![
                reward(
                    "free-delivery",
                    "Free delivery",
                    "No delivery fee on your next order",
                    100,
                ),
                reward(
                    "discount-10",
                    "KES 100 off",
                    "KES 100 off an order of KES 1000 or more",
                    250,
                ),
                reward(
                    "sukuma-bundle",
                    "Free sukuma wiki bundle",
                    "A bunch of sukuma wiki from any participating MamaMboga",
                    400,
                ),
            ],
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Earned,
    Redeemed,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyTransaction {
    pub kind: TransactionKind,
    pub points: u64,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoyaltyTier {
    Bronze,
    Silver,
    Gold,
}

impl LoyaltyTier {
    pub fn for_lifetime_points(lifetime_points: u64) -> Self {
        if lifetime_points >= GOLD_TIER_THRESHOLD {
            LoyaltyTier::Gold
        } else if lifetime_points >= SILVER_TIER_THRESHOLD {
            LoyaltyTier::Silver
        } else {
            LoyaltyTier::Bronze
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RedemptionError {
    #[error("Unknown reward {0}")]
    UnknownReward(String),
    #[error("Reward {0} is not active")]
    InactiveReward(String),
    #[error("Insufficient points: {available} available, {required} required")]
    InsufficientPoints { available: u64, required: u64 },
}

pub fn points_for_spend(amount_cents: u64) -> u64 {
    amount_cents / CENTS_PER_POINT
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltyLedger {
    pub points: u64,
    pub lifetime_points: u64,
    pub history: Vec<LoyaltyTransaction>,
}

impl LoyaltyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Credits points for a spend and returns how many were earned.
    pub fn earn_points(&mut self, amount_cents: u64, description: &str) -> u64 {
        let earned = points_for_spend(amount_cents);
        if earned == 0 {
            return 0;
        }
        self.points = self.points.saturating_add(earned);
        self.lifetime_points = self.lifetime_points.saturating_add(earned);
        self.history.push(LoyaltyTransaction {
            kind: TransactionKind::Earned,
            points: earned,
            description: description.to_string(),
            created_at: Utc::now(),
        });
        earned
    }

    /// Debits the reward cost. On error the ledger is untouched.
    pub fn redeem(
        &mut self,
        reward_id: &str,
        catalog: &RewardCatalog,
    ) -> Result<Reward, RedemptionError> {
        let reward = catalog
            .get(reward_id)
            .ok_or_else(|| RedemptionError::UnknownReward(reward_id.to_string()))?;
        if !reward.is_active {
            return Err(RedemptionError::InactiveReward(reward_id.to_string()));
        }
        if self.points < reward.points_required {
            return Err(RedemptionError::InsufficientPoints {
                available: self.points,
                required: reward.points_required,
            });
        }

        self.points -= reward.points_required;
        self.history.push(LoyaltyTransaction {
            kind: TransactionKind::Redeemed,
            points: reward.points_required,
            description: format!("Redeemed {}", reward.name),
            created_at: Utc::now(),
        });
        Ok(reward.clone())
    }

    pub fn tier(&self) -> LoyaltyTier {
        LoyaltyTier::for_lifetime_points(self.lifetime_points)
    }
}
