use crate::game::{GameId, SettlementRecord};
use crate::types::{Address, Amount};
use serde::{Deserialize, Serialize};

/// Notification emitted by each successful operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HouseEvent {
    MoveCommitted {
        player: Address,
        game_id: GameId,
        fee: Amount,
        reserved: Amount,
    },
    MoveRevealed(SettlementRecord),
    GameForfeited(SettlementRecord),
    Deposited {
        owner: Address,
        amount: Amount,
    },
    Withdrawn {
        owner: Address,
        amount: Amount,
    },
}

impl HouseEvent {
    pub fn name(&self) -> &'static str {
        match self {
            HouseEvent::MoveCommitted { .. } => "MoveCommitted",
            HouseEvent::MoveRevealed(_) => "MoveRevealed",
            HouseEvent::GameForfeited(_) => "GameForfeited",
            HouseEvent::Deposited { .. } => "Deposited",
            HouseEvent::Withdrawn { .. } => "Withdrawn",
        }
    }

    /// Game opened or settled by the operation, if any.
    pub fn game_id(&self) -> Option<GameId> {
        match self {
            HouseEvent::MoveCommitted { game_id, .. } => Some(*game_id),
            HouseEvent::MoveRevealed(record) | HouseEvent::GameForfeited(record) => {
                Some(record.game_id)
            }
            HouseEvent::Deposited { .. } | HouseEvent::Withdrawn { .. } => None,
        }
    }
}

/// An event together with the block it was emitted in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EmittedEvent {
    pub block_height: u64,
    pub event: HouseEvent,
}
