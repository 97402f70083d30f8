use crate::commitment::CommitHash;
use crate::error::{HouseError, Result};
use crate::types::{Address, Amount};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub type GameId = u64;

/// Hand played by either side. `None` only appears on unplayed or forfeited games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Move {
    None = 0,
    Rock = 1,
    Paper = 2,
    Scissors = 3,
}

impl Move {
    pub const PLAYABLE: [Move; 3] = [Move::Rock, Move::Paper, Move::Scissors];

    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn is_playable(self) -> bool {
        self != Move::None
    }

    /// Rock beats Scissors, Scissors beats Paper, Paper beats Rock.
    pub fn beats(self, other: Move) -> bool {
        matches!(
            (self, other),
            (Move::Rock, Move::Scissors) | (Move::Scissors, Move::Paper) | (Move::Paper, Move::Rock)
        )
    }
}

impl From<Move> for u8 {
    fn from(mv: Move) -> Self {
        mv as u8
    }
}

impl TryFrom<u8> for Move {
    type Error = HouseError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Move::None),
            1 => Ok(Move::Rock),
            2 => Ok(Move::Paper),
            3 => Ok(Move::Scissors),
            other => Err(HouseError::InvalidMove(other.to_string())),
        }
    }
}

impl FromStr for Move {
    type Err = HouseError;

    /// Accepts move names (any case) or their numeric encoding.
    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "none" | "0" => Ok(Move::None),
            "rock" | "1" => Ok(Move::Rock),
            "paper" | "2" => Ok(Move::Paper),
            "scissors" | "3" => Ok(Move::Scissors),
            _ => Err(HouseError::InvalidMove(s.to_string())),
        }
    }
}

impl fmt::Display for Move {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Move::None => "None",
            Move::Rock => "Rock",
            Move::Paper => "Paper",
            Move::Scissors => "Scissors",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u8", try_from = "u8")]
#[repr(u8)]
pub enum Outcome {
    Pending = 0,
    Player = 1,
    Bot = 2,
    Draw = 3,
}

impl Outcome {
    pub fn is_terminal(self) -> bool {
        self != Outcome::Pending
    }

    /// Result of `user` against `bot` under the fixed rule.
    pub fn decide(user: Move, bot: Move) -> Outcome {
        if user == bot {
            Outcome::Draw
        } else if user.beats(bot) {
            Outcome::Player
        } else {
            Outcome::Bot
        }
    }
}

impl From<Outcome> for u8 {
    fn from(outcome: Outcome) -> Self {
        outcome as u8
    }
}

impl TryFrom<u8> for Outcome {
    type Error = HouseError;

    fn try_from(value: u8) -> Result<Self> {
        match value {
            0 => Ok(Outcome::Pending),
            1 => Ok(Outcome::Player),
            2 => Ok(Outcome::Bot),
            3 => Ok(Outcome::Draw),
            other => Err(HouseError::internal(format!("unknown outcome {}", other))),
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Outcome::Pending => "Pending",
            Outcome::Player => "Player",
            Outcome::Bot => "Bot",
            Outcome::Draw => "Draw",
        };
        f.write_str(name)
    }
}

/// Terminal values computed for a pending game, written onto it exactly once.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settlement {
    pub game_id: GameId,
    pub user_move: Move,
    pub bot_move: Move,
    pub winner: Outcome,
    pub prize_money: Amount,
    pub reveal_block: u64,
}

/// Canonical game record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Game {
    pub id: GameId,
    pub player: Address,
    pub commit_hash: CommitHash,
    pub participation_fee: Amount,
    pub commit_block: u64,
    pub reveal_block: u64,
    pub user_move: Move,
    pub bot_move: Move,
    pub winner: Outcome,
    pub prize_money: Amount,
}

impl Game {
    pub fn new(
        id: GameId,
        player: Address,
        commit_hash: CommitHash,
        participation_fee: Amount,
        commit_block: u64,
    ) -> Self {
        Self {
            id,
            player,
            commit_hash,
            participation_fee,
            commit_block,
            reveal_block: 0,
            user_move: Move::None,
            bot_move: Move::None,
            winner: Outcome::Pending,
            prize_money: Amount::ZERO,
        }
    }

    pub fn is_pending(&self) -> bool {
        self.winner == Outcome::Pending
    }

    /// A forfeit is a Bot win with no moves and a non-zero reveal block.
    pub fn is_forfeited(&self) -> bool {
        self.winner == Outcome::Bot
            && self.user_move == Move::None
            && self.bot_move == Move::None
            && self.reveal_block != 0
    }

    /// Returns the settled copy of this game; fails if it is already terminal.
    pub fn settled(&self, settlement: &Settlement) -> Result<Game> {
        if !self.is_pending() {
            return Err(HouseError::internal(format!(
                "game {} already settled as {}",
                self.id, self.winner
            )));
        }
        if settlement.game_id != self.id || !settlement.winner.is_terminal() {
            return Err(HouseError::internal(format!(
                "settlement for game {} does not apply to game {}",
                settlement.game_id, self.id
            )));
        }

        Ok(Game {
            user_move: settlement.user_move,
            bot_move: settlement.bot_move,
            winner: settlement.winner,
            prize_money: settlement.prize_money,
            reveal_block: settlement.reveal_block,
            ..self.clone()
        })
    }

    pub fn record(&self) -> SettlementRecord {
        SettlementRecord {
            player: self.player.clone(),
            game_id: self.id,
            user_move: self.user_move,
            bot_move: self.bot_move,
            winner: self.winner,
            prize_money: self.prize_money,
        }
    }
}

/// Shape emitted to external observers when a game settles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SettlementRecord {
    pub player: Address,
    pub game_id: GameId,
    pub user_move: Move,
    pub bot_move: Move,
    pub winner: Outcome,
    pub prize_money: Amount,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pending_game() -> Game {
        let player: Address = "0x00000000000000000000000000000000000000aa".parse().unwrap();
        Game::new(7, player, CommitHash::from([1u8; 32]), Amount::from_whole(1), 10)
    }

    #[test]
    fn test_rule_table() {
        assert_eq!(Outcome::decide(Move::Rock, Move::Scissors), Outcome::Player);
        assert_eq!(Outcome::decide(Move::Scissors, Move::Paper), Outcome::Player);
        assert_eq!(Outcome::decide(Move::Paper, Move::Rock), Outcome::Player);
        assert_eq!(Outcome::decide(Move::Scissors, Move::Rock), Outcome::Bot);
        assert_eq!(Outcome::decide(Move::Paper, Move::Scissors), Outcome::Bot);
        assert_eq!(Outcome::decide(Move::Rock, Move::Paper), Outcome::Bot);
        for mv in Move::PLAYABLE {
            assert_eq!(Outcome::decide(mv, mv), Outcome::Draw);
        }
    }

    #[test]
    fn test_move_encoding() {
        assert_eq!(Move::try_from(2).unwrap(), Move::Paper);
        assert!(matches!(Move::try_from(4), Err(HouseError::InvalidMove(_))));
        assert!(!Move::try_from(0).unwrap().is_playable());
        assert!("lizard".parse::<Move>().is_err());
        assert_eq!("SCISSORS".parse::<Move>().unwrap(), Move::Scissors);
        assert_eq!("1".parse::<Move>().unwrap(), Move::Rock);
    }

    #[test]
    fn test_settle_only_once() {
        let game = pending_game();
        let settlement = Settlement {
            game_id: 7,
            user_move: Move::Rock,
            bot_move: Move::Scissors,
            winner: Outcome::Player,
            prize_money: Amount::from_whole(2),
            reveal_block: 12,
        };

        let settled = game.settled(&settlement).unwrap();
        assert_eq!(settled.winner, Outcome::Player);
        assert_eq!(settled.commit_hash, game.commit_hash);
        assert!(settled.settled(&settlement).is_err());
    }

    #[test]
    fn test_forfeit_detection() {
        let game = pending_game();
        assert!(!game.is_forfeited());

        let forfeited = game
            .settled(&Settlement {
                game_id: 7,
                user_move: Move::None,
                bot_move: Move::None,
                winner: Outcome::Bot,
                prize_money: Amount::ZERO,
                reveal_block: 11,
            })
            .unwrap();
        assert!(forfeited.is_forfeited());
    }
}
