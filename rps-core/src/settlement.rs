use crate::commitment::{verify_move, Salt};
use crate::error::{HouseError, Result};
use crate::game::{Game, Move, Outcome, Settlement};
use crate::oracle::{BotOracle, OracleInput};
use crate::types::{Amount, BlockInfo};

/// Prize owed to the player for a terminal outcome.
///
/// A player win pays `fee * payout_multiplier`, a draw refunds the fee and a
/// bot win pays nothing.
pub fn prize_for(outcome: Outcome, fee: Amount, payout_multiplier: u64) -> Result<Amount> {
    match outcome {
        Outcome::Player => fee.checked_mul(payout_multiplier),
        Outcome::Draw => Ok(fee),
        Outcome::Bot => Ok(Amount::ZERO),
        Outcome::Pending => Err(HouseError::internal("no prize for a pending game")),
    }
}

/// Decides pending games. Computes settlements without touching any state.
pub struct SettlementEngine {
    oracle: Box<dyn BotOracle>,
    payout_multiplier: u64,
}

impl SettlementEngine {
    pub fn new(oracle: Box<dyn BotOracle>, payout_multiplier: u64) -> Self {
        Self {
            oracle,
            payout_multiplier,
        }
    }

    /// Verifies the reveal against the stored commitment and plays the house move.
    pub fn settle_reveal(
        &self,
        game: &Game,
        user_move: Move,
        salt: &Salt,
        block: &BlockInfo,
    ) -> Result<Settlement> {
        if !user_move.is_playable() {
            return Err(HouseError::InvalidMove(user_move.as_u8().to_string()));
        }
        if !game.is_pending() {
            return Err(HouseError::NoActiveGame);
        }
        if !verify_move(&game.commit_hash, user_move, salt) {
            return Err(HouseError::HashMismatch);
        }

        let bot_move = self.oracle.counter_move(&OracleInput {
            game_id: game.id,
            player: &game.player,
            salt,
            block,
        });
        if !bot_move.is_playable() {
            return Err(HouseError::internal(format!(
                "oracle produced unplayable move {} for game {}",
                bot_move, game.id
            )));
        }

        let winner = Outcome::decide(user_move, bot_move);
        let prize_money = prize_for(winner, game.participation_fee, self.payout_multiplier)?;

        Ok(Settlement {
            game_id: game.id,
            user_move,
            bot_move,
            winner,
            prize_money,
            reveal_block: block.height,
        })
    }

    /// Abandonment: a bot win with no moves, stamped with the forfeiting block.
    pub fn settle_forfeit(&self, game: &Game, block: &BlockInfo) -> Result<Settlement> {
        if !game.is_pending() {
            return Err(HouseError::NoActiveGame);
        }

        Ok(Settlement {
            game_id: game.id,
            user_move: Move::None,
            bot_move: Move::None,
            winner: Outcome::Bot,
            prize_money: Amount::ZERO,
            reveal_block: block.height,
        })
    }
}

impl std::fmt::Debug for SettlementEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettlementEngine")
            .field("payout_multiplier", &self.payout_multiplier)
            .finish()
    }
}
