//! Rock-paper-scissors house - commit-reveal games against a bankrolled house
//!
//! Players commit to a hashed move with a participation fee, then reveal it.
//! The house answers with a counter-move derived at reveal time and pays out
//! from owner-deposited liquidity that is reserved per pending game, so every
//! payout the house may owe is always covered.

pub mod chain;
pub mod commit_store;
pub mod commitment;
pub mod config;
pub mod error;
pub mod events;
pub mod game;
pub mod house;
pub mod ledger;
pub mod manager;
pub mod oracle;
pub mod payments;
pub mod registry;
pub mod settlement;
pub mod storage;
pub mod treasury;
pub mod types;

pub use chain::LocalChain;
pub use commitment::{commit_move, generate_salt, verify_move, CommitHash, Salt};
pub use config::HouseConfig;
pub use error::{ErrorCategory, HouseError, Result};
pub use events::{EmittedEvent, HouseEvent};
pub use game::{Game, GameId, Move, Outcome, SettlementRecord};
pub use house::{House, HouseHandle, HouseStats};
pub use manager::HouseManager;
pub use payments::{PaymentLog, PaymentReason, Payments, Transfer};
pub use types::{Address, Amount, BlockInfo, CallContext};
