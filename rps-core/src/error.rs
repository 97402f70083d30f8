use crate::game::GameId;
use crate::types::Amount;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, HouseError>;

#[derive(Error, Debug)]
pub enum HouseError {
    #[error("Caller is not the owner")]
    NotOwner,

    #[error("Invalid move: {0}")]
    InvalidMove(String),

    #[error("Participation fee {fee} outside allowed range [{min}, {max}]")]
    FeeOutOfRange {
        fee: Amount,
        min: Amount,
        max: Amount,
    },

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error("Player already has an active game: {game_id}")]
    ActiveGameExists { game_id: GameId },

    #[error("No active game for player")]
    NoActiveGame,

    #[error("Invalid move or salt")]
    HashMismatch,

    #[error("Insufficient house liquidity: need {need}, available {available}")]
    InsufficientLiquidity { need: Amount, available: Amount },

    #[error("Withdrawal of {requested} exceeds unreserved liquidity {available}")]
    ExceedsUnreserved { requested: Amount, available: Amount },

    #[error("Nothing to withdraw")]
    NothingToWithdraw,

    #[error("Arithmetic overflow: {0}")]
    ArithmeticOverflow(String),

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("Invalid salt: {0}")]
    InvalidSalt(String),

    #[error("Invalid commit hash: {0}")]
    InvalidHash(String),

    #[error("Transfer failed: {0}")]
    Transfer(String),

    #[error("Storage error: {0}")]
    Storage(#[from] rusqlite::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// Coarse grouping used by callers to pick a user-facing message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    Validation,
    State,
    Economic,
    Auth,
    Infrastructure,
}

impl HouseError {
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn overflow(msg: impl Into<String>) -> Self {
        Self::ArithmeticOverflow(msg.into())
    }

    pub fn transfer(msg: impl Into<String>) -> Self {
        Self::Transfer(msg.into())
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            Self::NotOwner => ErrorCategory::Auth,
            Self::InvalidMove(_)
            | Self::FeeOutOfRange { .. }
            | Self::ZeroAmount
            | Self::InvalidAddress(_)
            | Self::InvalidAmount(_)
            | Self::InvalidSalt(_)
            | Self::InvalidHash(_) => ErrorCategory::Validation,
            Self::ActiveGameExists { .. } | Self::NoActiveGame | Self::HashMismatch => {
                ErrorCategory::State
            }
            Self::InsufficientLiquidity { .. }
            | Self::ExceedsUnreserved { .. }
            | Self::NothingToWithdraw
            | Self::ArithmeticOverflow(_) => ErrorCategory::Economic,
            Self::Transfer(_)
            | Self::Storage(_)
            | Self::Serialization(_)
            | Self::Io(_)
            | Self::Config(_)
            | Self::Internal(_) => ErrorCategory::Infrastructure,
        }
    }
}
