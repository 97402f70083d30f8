//! House liquidity accounting.
//!
//! `total_balance` is house-owned money; `reserved` is the part of it pledged
//! against the worst-case payout of every pending game. Stakes of pending games
//! sit in `escrowed` until the game settles. `reserved` only grows through
//! [`LiquidityLedger::reserve`] and only shrinks through an applied release plan.

use crate::error::{HouseError, Result};
use crate::game::GameId;
use crate::types::Amount;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct LiquidityState {
    pub total_balance: Amount,
    pub reserved: Amount,
    pub escrowed: Amount,
}

impl LiquidityState {
    pub fn unreserved(&self) -> Amount {
        self.total_balance.saturating_sub(self.reserved)
    }

    fn check(&self) -> Result<()> {
        if self.reserved > self.total_balance {
            return Err(HouseError::internal(format!(
                "reserved {} exceeds total balance {}",
                self.reserved, self.total_balance
            )));
        }
        Ok(())
    }
}

/// Liability held against one pending game.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reservation {
    pub game_id: GameId,
    pub max_payout: Amount,
    pub stake: Amount,
}

/// Precomputed ledger transition. Nothing changes until it is applied.
#[must_use]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LedgerPlan {
    base: LiquidityState,
    next: LiquidityState,
    released: Option<GameId>,
}

#[derive(Debug, Clone, Default)]
pub struct LiquidityLedger {
    state: LiquidityState,
    reservations: BTreeMap<GameId, Reservation>,
}

impl LiquidityLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds a ledger from persisted parts, rejecting inconsistent data.
    pub fn from_parts(state: LiquidityState, reservations: Vec<Reservation>) -> Result<Self> {
        state.check()?;

        let mut reserved = Amount::ZERO;
        let mut escrowed = Amount::ZERO;
        let mut by_game = BTreeMap::new();
        for reservation in reservations {
            reserved = reserved.checked_add(reservation.max_payout)?;
            escrowed = escrowed.checked_add(reservation.stake)?;
            by_game.insert(reservation.game_id, reservation);
        }

        if reserved != state.reserved || escrowed != state.escrowed {
            return Err(HouseError::internal(format!(
                "reservations sum to {}/{} but ledger records {}/{}",
                reserved, escrowed, state.reserved, state.escrowed
            )));
        }

        Ok(Self {
            state,
            reservations: by_game,
        })
    }

    pub fn state(&self) -> LiquidityState {
        self.state
    }

    pub fn total_balance(&self) -> Amount {
        self.state.total_balance
    }

    pub fn reserved(&self) -> Amount {
        self.state.reserved
    }

    pub fn escrowed(&self) -> Amount {
        self.state.escrowed
    }

    pub fn unreserved(&self) -> Amount {
        self.state.unreserved()
    }

    /// Everything the house holds, including stakes of pending games.
    pub fn funds_held(&self) -> Amount {
        self.state
            .total_balance
            .checked_add(self.state.escrowed)
            .unwrap_or(Amount::from_base_units(u128::MAX))
    }

    pub fn reservation(&self, game_id: GameId) -> Option<&Reservation> {
        self.reservations.get(&game_id)
    }

    pub fn reservations(&self) -> impl Iterator<Item = &Reservation> {
        self.reservations.values()
    }

    pub(crate) fn credit(&mut self, amount: Amount) -> Result<()> {
        self.state.total_balance = self.state.total_balance.checked_add(amount)?;
        Ok(())
    }

    /// Pledges `max_payout` of unreserved house funds and escrows the stake.
    pub(crate) fn reserve(
        &mut self,
        game_id: GameId,
        max_payout: Amount,
        stake: Amount,
    ) -> Result<Reservation> {
        if self.reservations.contains_key(&game_id) {
            return Err(HouseError::internal(format!(
                "game {} already holds a reservation",
                game_id
            )));
        }

        let available = self.unreserved();
        if available < max_payout {
            tracing::warn!(
                "Rejecting reservation for game {}: need {}, available {}",
                game_id,
                max_payout,
                available
            );
            return Err(HouseError::InsufficientLiquidity {
                need: max_payout,
                available,
            });
        }

        let next = LiquidityState {
            total_balance: self.state.total_balance,
            reserved: self.state.reserved.checked_add(max_payout)?,
            escrowed: self.state.escrowed.checked_add(stake)?,
        };
        next.check()?;

        let reservation = Reservation {
            game_id,
            max_payout,
            stake,
        };
        self.state = next;
        self.reservations.insert(game_id, reservation);

        tracing::debug!(
            "Reserved {} for game {} (reserved now {})",
            max_payout,
            game_id,
            self.state.reserved
        );
        Ok(reservation)
    }

    /// Plans the single release of a game's reservation, paying `payout` to the player.
    /// The stake leaves escrow; whatever the payout does not consume stays with the house.
    pub(crate) fn plan_release(&self, game_id: GameId, payout: Amount) -> Result<LedgerPlan> {
        let reservation = self.reservations.get(&game_id).ok_or_else(|| {
            HouseError::internal(format!("no reservation held for game {}", game_id))
        })?;

        if payout > reservation.max_payout {
            return Err(HouseError::internal(format!(
                "payout {} exceeds reservation {} for game {}",
                payout, reservation.max_payout, game_id
            )));
        }

        let next = LiquidityState {
            total_balance: self
                .state
                .total_balance
                .checked_add(reservation.stake)?
                .checked_sub(payout)?,
            reserved: self.state.reserved.checked_sub(reservation.max_payout)?,
            escrowed: self.state.escrowed.checked_sub(reservation.stake)?,
        };
        next.check()?;

        Ok(LedgerPlan {
            base: self.state,
            next,
            released: Some(game_id),
        })
    }

    /// Plans taking `amount` out of unreserved house funds.
    pub(crate) fn plan_debit(&self, amount: Amount) -> Result<LedgerPlan> {
        let available = self.unreserved();
        if amount > available {
            return Err(HouseError::ExceedsUnreserved {
                requested: amount,
                available,
            });
        }

        let next = LiquidityState {
            total_balance: self.state.total_balance.checked_sub(amount)?,
            ..self.state
        };
        next.check()?;

        Ok(LedgerPlan {
            base: self.state,
            next,
            released: None,
        })
    }

    pub(crate) fn apply(&mut self, plan: LedgerPlan) {
        debug_assert_eq!(self.state, plan.base, "ledger plan applied to a stale state");
        self.state = plan.next;
        if let Some(game_id) = plan.released {
            self.reservations.remove(&game_id);
            tracing::debug!(
                "Released reservation for game {} (reserved now {})",
                game_id,
                self.state.reserved
            );
        }
    }
}
