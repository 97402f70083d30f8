//! Outbound transfers from the house.

use crate::error::Result;
use crate::types::{Address, Amount};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentReason {
    Prize,
    Refund,
    Withdrawal,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transfer {
    pub to: Address,
    pub amount: Amount,
    pub reason: PaymentReason,
    pub block_height: u64,
}

/// Moves funds out of the house. An `Err` means nothing was sent.
pub trait Payments: Send + Sync {
    fn send(&mut self, transfer: &Transfer) -> Result<()>;
}

/// Records every transfer in memory; never fails.
#[derive(Debug, Clone, Default)]
pub struct PaymentLog {
    transfers: Vec<Transfer>,
}

impl PaymentLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn transfers(&self) -> &[Transfer] {
        &self.transfers
    }

    /// Hands the recorded transfers to the caller and clears the log.
    pub fn drain(&mut self) -> Vec<Transfer> {
        std::mem::take(&mut self.transfers)
    }

    pub fn total_to(&self, to: &Address) -> Amount {
        self.transfers
            .iter()
            .filter(|t| &t.to == to)
            .fold(Amount::ZERO, |acc, t| {
                acc.checked_add(t.amount).unwrap_or(acc)
            })
    }
}

impl Payments for PaymentLog {
    fn send(&mut self, transfer: &Transfer) -> Result<()> {
        tracing::debug!(
            "Transfer {} to {} ({:?})",
            transfer.amount,
            transfer.to,
            transfer.reason
        );
        self.transfers.push(transfer.clone());
        Ok(())
    }
}
