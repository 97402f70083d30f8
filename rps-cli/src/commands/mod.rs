pub mod game;
pub mod history;
pub mod house;

pub use game::{commit, forfeit, reveal, show_hash};
pub use history::{show_events, show_history};
pub use house::{deposit, init_house, show_status, withdraw};
