//! House counter-move derivation.
//!
//! The counter-move depends on entropy of the block the reveal lands in, mixed
//! with the revealed salt, so it is unknown when the commitment is submitted.
//! Whoever orders blocks can still influence that entropy; no stronger fairness
//! guarantee is claimed here.

use crate::commitment::Salt;
use crate::game::{GameId, Move};
use crate::types::{Address, BlockInfo};
use sha2::{Digest, Sha256};

/// Source of per-block randomness.
pub trait EntropySource: Send + Sync {
    fn entropy(&self, block: &BlockInfo) -> [u8; 32];
}

/// Derives entropy from the block hash, height and timestamp.
#[derive(Debug, Clone, Copy, Default)]
pub struct BlockHashEntropy;

impl EntropySource for BlockHashEntropy {
    fn entropy(&self, block: &BlockInfo) -> [u8; 32] {
        let mut hasher = Sha256::new();
        hasher.update(block.hash);
        hasher.update(block.height.to_be_bytes());
        hasher.update(block.timestamp.timestamp_millis().to_be_bytes());
        hasher.finalize().into()
    }
}

/// Same bytes for every block.
#[derive(Debug, Clone, Copy)]
pub struct FixedEntropy(pub [u8; 32]);

impl EntropySource for FixedEntropy {
    fn entropy(&self, _block: &BlockInfo) -> [u8; 32] {
        self.0
    }
}

/// Everything known at reveal time that may feed the counter-move.
#[derive(Debug, Clone, Copy)]
pub struct OracleInput<'a> {
    pub game_id: GameId,
    pub player: &'a Address,
    pub salt: &'a Salt,
    pub block: &'a BlockInfo,
}

pub trait BotOracle: Send + Sync {
    /// Always returns a playable move.
    fn counter_move(&self, input: &OracleInput<'_>) -> Move;
}

/// Hashes block entropy with the reveal inputs and maps the result onto a move.
#[derive(Debug, Clone, Default)]
pub struct EntropyOracle<E = BlockHashEntropy> {
    source: E,
}

impl<E: EntropySource> EntropyOracle<E> {
    pub fn new(source: E) -> Self {
        Self { source }
    }
}

impl<E: EntropySource> BotOracle for EntropyOracle<E> {
    fn counter_move(&self, input: &OracleInput<'_>) -> Move {
        let mut hasher = Sha256::new();
        hasher.update(self.source.entropy(input.block));
        hasher.update(input.salt.as_bytes());
        hasher.update(input.player.as_str().as_bytes());
        hasher.update(input.game_id.to_be_bytes());
        let digest = hasher.finalize();

        let mut word = [0u8; 8];
        word.copy_from_slice(&digest[..8]);
        let mv = Move::PLAYABLE[(u64::from_be_bytes(word) % 3) as usize];

        tracing::debug!(
            "Oracle derived {} for game {} at block {}",
            mv,
            input.game_id,
            input.block.height
        );
        mv
    }
}

/// Always plays the same move.
#[derive(Debug, Clone, Copy)]
pub struct FixedMoveOracle(pub Move);

impl BotOracle for FixedMoveOracle {
    fn counter_move(&self, _input: &OracleInput<'_>) -> Move {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn block(height: u64) -> BlockInfo {
        BlockInfo::new(height, Utc.timestamp_opt(1_700_000_000, 0).unwrap(), [9u8; 32])
    }

    fn player() -> Address {
        "0x00000000000000000000000000000000000000bb".parse().unwrap()
    }

    #[test]
    fn test_counter_move_is_deterministic() {
        let oracle = EntropyOracle::new(FixedEntropy([3u8; 32]));
        let player = player();
        let salt = Salt::from([1u8; 32]);
        let block = block(10);
        let input = OracleInput {
            game_id: 1,
            player: &player,
            salt: &salt,
            block: &block,
        };

        let first = oracle.counter_move(&input);
        assert!(first.is_playable());
        assert_eq!(first, oracle.counter_move(&input));
    }

    #[test]
    fn test_counter_move_depends_on_salt() {
        let oracle = EntropyOracle::new(FixedEntropy([3u8; 32]));
        let player = player();
        let block = block(10);

        let moves: std::collections::HashSet<Move> = (0u8..64)
            .map(|i| {
                let salt = Salt::from([i; 32]);
                oracle.counter_move(&OracleInput {
                    game_id: 1,
                    player: &player,
                    salt: &salt,
                    block: &block,
                })
            })
            .collect();

        assert_eq!(moves.len(), 3);
        assert!(!moves.contains(&Move::None));
    }

    #[test]
    fn test_block_entropy_changes_with_block() {
        let source = BlockHashEntropy;
        assert_ne!(source.entropy(&block(1)), source.entropy(&block(2)));
        assert_eq!(source.entropy(&block(1)), source.entropy(&block(1)));
    }
}
