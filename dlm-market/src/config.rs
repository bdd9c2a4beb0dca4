//! Market configuration
//!
//! Built from the `[market]` TOML section with compiled defaults for every
//! missing key, then validated once at startup.

use dlm_common::config::MarketToml;
use rust_decimal::Decimal;
use tracing::warn;

use crate::quorum::{QuorumConfig, MAJORITY_THRESHOLD, REQUIRED_VOTES};
use crate::rewards::RewardRates;

/// Environment variable carrying the hex claim-signing key
pub const SIGNER_KEY_ENV: &str = "DLM_SIGNER_KEY";

/// Highest base-unit precision a `Decimal` can represent exactly
pub const MAX_BASE_UNIT_DECIMALS: u32 = 28;

#[derive(Debug, Clone, PartialEq)]
pub struct MarketConfig {
    pub quorum: QuorumConfig,
    pub labeling_pool_percent: u32,
    pub verification_reward_factor: Decimal,
    pub base_unit_decimals: u32,
    /// Budget for retrying a transaction that hit a locked database
    pub max_lock_wait_ms: u64,
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            quorum: QuorumConfig::default(),
            labeling_pool_percent: 70,
            verification_reward_factor: Decimal::new(5, 1),
            base_unit_decimals: 18,
            max_lock_wait_ms: 5000,
        }
    }
}

impl MarketConfig {
    pub fn from_toml(toml: &MarketToml) -> Result<Self, String> {
        let defaults = MarketConfig::default();

        let verification_reward_factor = match toml.verification_reward_factor {
            Some(f) => Decimal::try_from(f)
                .map_err(|e| format!("verification_reward_factor {} is not representable: {}", f, e))?,
            None => defaults.verification_reward_factor,
        };

        let config = MarketConfig {
            quorum: QuorumConfig {
                required_votes: toml.required_votes.unwrap_or(REQUIRED_VOTES),
                majority_threshold: toml.majority_threshold.unwrap_or(MAJORITY_THRESHOLD),
            },
            labeling_pool_percent: toml
                .labeling_pool_percent
                .unwrap_or(defaults.labeling_pool_percent),
            verification_reward_factor,
            base_unit_decimals: toml.base_unit_decimals.unwrap_or(defaults.base_unit_decimals),
            max_lock_wait_ms: toml.max_lock_wait_ms.unwrap_or(defaults.max_lock_wait_ms),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), String> {
        let QuorumConfig {
            required_votes,
            majority_threshold,
        } = self.quorum;

        if majority_threshold < 1 || majority_threshold > required_votes {
            return Err(format!(
                "majority_threshold must be between 1 and required_votes ({}), got {}",
                required_votes, majority_threshold
            ));
        }
        if 2 * majority_threshold <= required_votes {
            return Err(format!(
                "majority_threshold {} of {} votes could resolve both ways",
                majority_threshold, required_votes
            ));
        }
        if self.labeling_pool_percent == 0 || self.labeling_pool_percent >= 100 {
            return Err(format!(
                "labeling_pool_percent must be between 1 and 99, got {}",
                self.labeling_pool_percent
            ));
        }
        if self.verification_reward_factor.is_sign_negative() {
            return Err("verification_reward_factor must not be negative".to_string());
        }
        if self.base_unit_decimals > MAX_BASE_UNIT_DECIMALS {
            return Err(format!(
                "base_unit_decimals must be at most {}, got {}",
                MAX_BASE_UNIT_DECIMALS, self.base_unit_decimals
            ));
        }
        Ok(())
    }

    pub fn reward_rates(&self) -> RewardRates {
        RewardRates {
            required_votes: self.quorum.required_votes,
            verification_reward_factor: self.verification_reward_factor,
        }
    }
}

/// Signing key: environment first, then TOML
pub fn resolve_signer_key(toml: &MarketToml) -> Option<String> {
    let from_env = std::env::var(SIGNER_KEY_ENV)
        .ok()
        .filter(|k| !k.trim().is_empty());
    let from_toml = toml.signer_key.clone().filter(|k| !k.trim().is_empty());

    match (from_env, from_toml) {
        (Some(env_key), Some(_)) => {
            warn!(
                "Signer key set in both {} and config file; using environment",
                SIGNER_KEY_ENV
            );
            Some(env_key)
        }
        (Some(env_key), None) => Some(env_key),
        (None, toml_key) => toml_key,
    }
}
