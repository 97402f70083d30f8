use crate::error::{HouseError, Result};
use crate::types::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Number of settled games kept in each history index.
pub const DEFAULT_HISTORY_CAPACITY: usize = 30;

pub const DEFAULT_PAYOUT_MULTIPLIER: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseConfig {
    pub owner: Address,
    pub min_fee: Amount,
    pub max_fee: Amount,
    pub payout_multiplier: u64,
    pub history_capacity: usize,
}

impl HouseConfig {
    /// Fee range 0.01..=100 units, 2x payout, 30 games of history.
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            min_fee: Amount::from_base_units(10u128.pow(16)),
            max_fee: Amount::from_whole(100),
            payout_multiplier: DEFAULT_PAYOUT_MULTIPLIER,
            history_capacity: DEFAULT_HISTORY_CAPACITY,
        }
    }

    pub fn with_fee_range(mut self, min_fee: Amount, max_fee: Amount) -> Self {
        self.min_fee = min_fee;
        self.max_fee = max_fee;
        self
    }

    pub fn with_payout_multiplier(mut self, payout_multiplier: u64) -> Self {
        self.payout_multiplier = payout_multiplier;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.min_fee.is_zero() {
            return Err(HouseError::config("Minimum fee must be greater than 0"));
        }

        if self.min_fee > self.max_fee {
            return Err(HouseError::config(format!(
                "Minimum fee {} exceeds maximum fee {}",
                self.min_fee, self.max_fee
            )));
        }

        if self.payout_multiplier == 0 {
            return Err(HouseError::config(
                "Payout multiplier must be greater than 0",
            ));
        }

        if self.history_capacity == 0 {
            return Err(HouseError::config(
                "History capacity must be greater than 0",
            ));
        }

        self.max_fee
            .checked_mul(self.payout_multiplier)
            .map_err(|_| HouseError::config("Maximum payout does not fit in an amount"))?;

        Ok(())
    }

    pub fn fee_in_range(&self, fee: Amount) -> bool {
        fee >= self.min_fee && fee <= self.max_fee
    }

    /// Worst-case house liability for a wager of `fee`.
    pub fn max_payout(&self, fee: Amount) -> Result<Amount> {
        fee.checked_mul(self.payout_multiplier)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: HouseConfig = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn owner() -> Address {
        "0x00000000000000000000000000000000000000ff".parse().unwrap()
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = HouseConfig::new(owner());
        config.validate().unwrap();
        assert_eq!(config.min_fee.to_string(), "0.01");
        assert_eq!(config.max_fee.to_string(), "100");
        assert!(config.fee_in_range(Amount::from_whole(1)));
        assert!(!config.fee_in_range(Amount::from_whole(101)));
        assert_eq!(
            config.max_payout(Amount::from_whole(1)).unwrap(),
            Amount::from_whole(2)
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let inverted =
            HouseConfig::new(owner()).with_fee_range(Amount::from_whole(5), Amount::from_whole(1));
        assert!(inverted.validate().is_err());

        let zero_min = HouseConfig::new(owner()).with_fee_range(Amount::ZERO, Amount::from_whole(1));
        assert!(zero_min.validate().is_err());

        assert!(HouseConfig::new(owner())
            .with_payout_multiplier(0)
            .validate()
            .is_err());

        let huge = HouseConfig::new(owner())
            .with_fee_range(Amount::from_whole(1), Amount::from_base_units(u128::MAX));
        assert!(huge.validate().is_err());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.json");

        let config = HouseConfig::new(owner()).with_payout_multiplier(3);
        config.save(&path).unwrap();

        assert_eq!(HouseConfig::load(&path).unwrap(), config);
    }
}
