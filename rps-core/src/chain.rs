//! Local block source for running the house outside a real chain.
//!
//! Every operation runs in a fresh block: height + 1, with a hash chained
//! over the previous one.

use crate::types::BlockInfo;
use chrono::{DateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalChain {
    tip: BlockInfo,
}

impl LocalChain {
    /// Chain holding only the zero block.
    pub fn genesis(timestamp: DateTime<Utc>) -> Self {
        Self {
            tip: BlockInfo::new(0, timestamp.trunc_subsecs(3), [0u8; 32]),
        }
    }

    pub fn from_tip(tip: BlockInfo) -> Self {
        Self { tip }
    }

    pub fn tip(&self) -> &BlockInfo {
        &self.tip
    }

    pub fn height(&self) -> u64 {
        self.tip.height
    }

    /// Produces the next block. Timestamps have millisecond precision and never go backwards.
    pub fn next_block(&mut self, now: DateTime<Utc>) -> BlockInfo {
        let height = self.tip.height + 1;
        let timestamp = now.trunc_subsecs(3).max(self.tip.timestamp);
        let hash = compute_hash(&self.tip.hash, height, timestamp);

        self.tip = BlockInfo::new(height, timestamp, hash);
        tracing::debug!("Produced block {} ({})", height, hex::encode(&hash[..8]));
        self.tip.clone()
    }
}

pub fn compute_hash(previous: &[u8; 32], height: u64, timestamp: DateTime<Utc>) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(previous);
    hasher.update(height.to_be_bytes());
    hasher.update(timestamp.timestamp_millis().to_be_bytes());
    hasher.finalize().into()
}
