//! The house: every externally visible operation, applied all-or-nothing.
//!
//! Each mutating call validates and plans first, attempts the outbound
//! transfer (if any) and only then writes state. A call that returns `Err`
//! leaves the house exactly as it found it.

use crate::commit_store::CommitStore;
use crate::commitment::{CommitHash, Salt};
use crate::config::HouseConfig;
use crate::error::{HouseError, Result};
use crate::events::{EmittedEvent, HouseEvent};
use crate::game::{Game, GameId, Move, Outcome, Settlement};
use crate::ledger::LiquidityLedger;
use crate::oracle::{BlockHashEntropy, BotOracle, EntropyOracle};
use crate::payments::{PaymentLog, PaymentReason, Payments, Transfer};
use crate::registry::GameRegistry;
use crate::settlement::SettlementEngine;
use crate::treasury::AdminTreasury;
use crate::types::{Address, Amount, CallContext};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Point-in-time figures for dashboards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HouseStats {
    pub total_games: u64,
    pub pending_games: usize,
    pub balance: Amount,
    pub house_balance: Amount,
    pub reserved: Amount,
    pub unreserved: Amount,
    pub escrowed: Amount,
}

/// Persisted parts of a house.
#[derive(Debug, Clone)]
pub struct HouseState {
    pub ledger: LiquidityLedger,
    pub commits: CommitStore,
    pub registry: GameRegistry,
}

pub struct House<P: Payments = PaymentLog> {
    config: HouseConfig,
    ledger: LiquidityLedger,
    commits: CommitStore,
    registry: GameRegistry,
    treasury: AdminTreasury,
    engine: SettlementEngine,
    payments: P,
    events: Vec<EmittedEvent>,
}

impl House<PaymentLog> {
    /// Empty house with block-entropy counter-moves and an in-memory payment log.
    pub fn new(config: HouseConfig) -> Result<Self> {
        Self::with_parts(
            config,
            Box::new(EntropyOracle::new(BlockHashEntropy)),
            PaymentLog::new(),
        )
    }
}

impl<P: Payments> House<P> {
    pub fn with_parts(config: HouseConfig, oracle: Box<dyn BotOracle>, payments: P) -> Result<Self> {
        let state = HouseState {
            ledger: LiquidityLedger::new(),
            commits: CommitStore::new(),
            registry: GameRegistry::new(config.history_capacity),
        };
        Self::restore(config, state, oracle, payments)
    }

    pub fn restore(
        config: HouseConfig,
        state: HouseState,
        oracle: Box<dyn BotOracle>,
        payments: P,
    ) -> Result<Self> {
        config.validate()?;

        if state.registry.capacity() != config.history_capacity {
            return Err(HouseError::config(format!(
                "history capacity {} does not match stored history of {}",
                config.history_capacity,
                state.registry.capacity()
            )));
        }

        for game in state.commits.games().filter(|g| g.is_pending()) {
            if state.ledger.reservation(game.id).is_none() {
                return Err(HouseError::internal(format!(
                    "pending game {} has no reservation",
                    game.id
                )));
            }
        }
        let reservations = state.ledger.reservations().count();
        if reservations != state.commits.pending_count() {
            return Err(HouseError::internal(format!(
                "{} reservations held for {} pending games",
                reservations,
                state.commits.pending_count()
            )));
        }

        Ok(Self {
            treasury: AdminTreasury::new(config.owner.clone()),
            engine: SettlementEngine::new(oracle, config.payout_multiplier),
            config,
            ledger: state.ledger,
            commits: state.commits,
            registry: state.registry,
            payments,
            events: Vec::new(),
        })
    }

    // ---- player operations ----

    /// Opens a wager of `fee` (the value sent with the call) for the caller.
    pub fn commit_move(
        &mut self,
        ctx: &CallContext,
        commit_hash: CommitHash,
        fee: Amount,
    ) -> Result<GameId> {
        let game_id = self.commits.open(
            &ctx.caller,
            commit_hash,
            fee,
            ctx.block.height,
            &self.config,
            &mut self.ledger,
        )?;

        let reserved = self
            .ledger
            .reservation(game_id)
            .map(|r| r.max_payout)
            .unwrap_or(Amount::ZERO);

        tracing::info!(
            "Player {} committed game {} with fee {} (reserved {})",
            ctx.caller,
            game_id,
            fee,
            reserved
        );
        self.emit(
            ctx,
            HouseEvent::MoveCommitted {
                player: ctx.caller.clone(),
                game_id,
                fee,
                reserved,
            },
        );
        self.check_solvency();
        Ok(game_id)
    }

    /// Reveals the caller's committed move and settles the game.
    /// A mismatched reveal changes nothing and may be retried.
    pub fn reveal_move(&mut self, ctx: &CallContext, user_move: Move, salt: &Salt) -> Result<Game> {
        if !user_move.is_playable() {
            return Err(HouseError::InvalidMove(user_move.as_u8().to_string()));
        }

        let game = self.commits.pending_for(&ctx.caller)?.clone();
        let settlement = match self.engine.settle_reveal(&game, user_move, salt, &ctx.block) {
            Ok(settlement) => settlement,
            Err(HouseError::HashMismatch) => {
                tracing::warn!(
                    "Reveal for game {} by {} does not match its commitment",
                    game.id,
                    ctx.caller
                );
                return Err(HouseError::HashMismatch);
            }
            Err(e) => return Err(e),
        };

        let settled = self.finalize(ctx, &game, settlement)?;
        tracing::info!(
            "Game {} settled: {} vs {} -> {} (prize {})",
            settled.id,
            settled.user_move,
            settled.bot_move,
            settled.winner,
            settled.prize_money
        );
        self.emit(ctx, HouseEvent::MoveRevealed(settled.record()));
        Ok(settled)
    }

    /// Abandons the caller's pending game as a house win.
    pub fn forfeit_current_game(&mut self, ctx: &CallContext) -> Result<Game> {
        let game = self.commits.pending_for(&ctx.caller)?.clone();
        let settlement = self.engine.settle_forfeit(&game, &ctx.block)?;

        let settled = self.finalize(ctx, &game, settlement)?;
        tracing::info!(
            "Game {} forfeited by {} at block {}",
            settled.id,
            ctx.caller,
            settled.reveal_block
        );
        self.emit(ctx, HouseEvent::GameForfeited(settled.record()));
        Ok(settled)
    }

    /// Terminal transition shared by reveal and forfeit.
    /// Height 0 is the genesis block; a game settled there would read as never revealed.
    fn finalize(&mut self, ctx: &CallContext, game: &Game, settlement: Settlement) -> Result<Game> {
        if ctx.block.height == 0 {
            return Err(HouseError::internal(format!(
                "game {} cannot settle in the genesis block",
                game.id
            )));
        }
        let settled = game.settled(&settlement)?;
        self.commits.ensure_closable(&settled)?;
        let plan = self.ledger.plan_release(game.id, settled.prize_money)?;

        if !settled.prize_money.is_zero() {
            let reason = if settled.winner == Outcome::Draw {
                PaymentReason::Refund
            } else {
                PaymentReason::Prize
            };
            self.payments.send(&Transfer {
                to: settled.player.clone(),
                amount: settled.prize_money,
                reason,
                block_height: ctx.block.height,
            })?;
        }

        self.ledger.apply(plan);
        self.commits.close(settled.clone());
        self.registry.record(&settled);
        self.check_solvency();
        Ok(settled)
    }

    // ---- owner operations ----

    pub fn deposit(&mut self, ctx: &CallContext, amount: Amount) -> Result<()> {
        self.treasury.deposit(ctx, amount, &mut self.ledger)?;
        self.emit(
            ctx,
            HouseEvent::Deposited {
                owner: ctx.caller.clone(),
                amount,
            },
        );
        Ok(())
    }

    pub fn withdraw(&mut self, ctx: &CallContext, amount: Amount) -> Result<()> {
        self.treasury
            .withdraw(ctx, amount, &mut self.ledger, &mut self.payments)?;
        self.emit(
            ctx,
            HouseEvent::Withdrawn {
                owner: ctx.caller.clone(),
                amount,
            },
        );
        self.check_solvency();
        Ok(())
    }

    pub fn withdraw_all_unreserved(&mut self, ctx: &CallContext) -> Result<Amount> {
        let amount = self
            .treasury
            .withdraw_all_unreserved(ctx, &mut self.ledger, &mut self.payments)?;
        self.emit(
            ctx,
            HouseEvent::Withdrawn {
                owner: ctx.caller.clone(),
                amount,
            },
        );
        self.check_solvency();
        Ok(amount)
    }

    // ---- reads ----

    pub fn current_game(&self, player: &Address) -> Option<&Game> {
        self.commits.active_game(player)
    }

    pub fn game(&self, game_id: GameId) -> Option<&Game> {
        self.commits.game(game_id)
    }

    /// Most recently settled games, newest first; `n` is clamped to the history capacity.
    pub fn latest_games(&self, n: usize) -> Vec<Game> {
        self.registry.latest_games(&self.commits, n)
    }

    pub fn latest_games_of(&self, player: &Address, n: usize) -> Vec<Game> {
        self.registry.latest_games_of(&self.commits, player, n)
    }

    pub fn total_games(&self) -> u64 {
        self.commits.total_games()
    }

    pub fn reserved_house_liquidity(&self) -> Amount {
        self.ledger.reserved()
    }

    pub fn unreserved_liquidity(&self) -> Amount {
        self.ledger.unreserved()
    }

    /// Funds held, pending stakes included.
    pub fn balance(&self) -> Amount {
        self.ledger.funds_held()
    }

    pub fn house_balance(&self) -> Amount {
        self.ledger.total_balance()
    }

    pub fn stats(&self) -> HouseStats {
        HouseStats {
            total_games: self.commits.total_games(),
            pending_games: self.commits.pending_count(),
            balance: self.ledger.funds_held(),
            house_balance: self.ledger.total_balance(),
            reserved: self.ledger.reserved(),
            unreserved: self.ledger.unreserved(),
            escrowed: self.ledger.escrowed(),
        }
    }

    pub fn owner(&self) -> &Address {
        self.treasury.owner()
    }

    pub fn config(&self) -> &HouseConfig {
        &self.config
    }

    pub fn ledger(&self) -> &LiquidityLedger {
        &self.ledger
    }

    pub fn commits(&self) -> &CommitStore {
        &self.commits
    }

    pub fn registry(&self) -> &GameRegistry {
        &self.registry
    }

    pub fn payments(&self) -> &P {
        &self.payments
    }

    pub fn payments_mut(&mut self) -> &mut P {
        &mut self.payments
    }

    /// Copy of the persisted parts, for undoing an operation after the fact.
    pub fn snapshot(&self) -> HouseState {
        HouseState {
            ledger: self.ledger.clone(),
            commits: self.commits.clone(),
            registry: self.registry.clone(),
        }
    }

    /// Puts back a snapshot and drops events queued since it was taken.
    pub fn rollback(&mut self, state: HouseState) {
        self.ledger = state.ledger;
        self.commits = state.commits;
        self.registry = state.registry;
        self.events.clear();
    }

    /// Events emitted since the last drain, oldest first.
    pub fn drain_events(&mut self) -> Vec<EmittedEvent> {
        std::mem::take(&mut self.events)
    }

    fn emit(&mut self, ctx: &CallContext, event: HouseEvent) {
        self.events.push(EmittedEvent {
            block_height: ctx.block.height,
            event,
        });
    }

    fn check_solvency(&self) {
        debug_assert!(
            self.ledger.reserved() <= self.ledger.total_balance(),
            "reserved {} exceeds house balance {}",
            self.ledger.reserved(),
            self.ledger.total_balance()
        );
    }
}

impl<P: Payments> std::fmt::Debug for House<P> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("House")
            .field("owner", self.owner())
            .field("stats", &self.stats())
            .finish()
    }
}

/// Shared house. Each mutating call holds the write lock for its whole
/// duration, so concurrent callers are applied in some total order.
pub struct HouseHandle<P: Payments = PaymentLog> {
    inner: Arc<RwLock<House<P>>>,
}

impl<P: Payments> Clone for HouseHandle<P> {
    fn clone(&self) -> Self {
        Self {
            inner: self.inner.clone(),
        }
    }
}

impl<P: Payments> HouseHandle<P> {
    pub fn new(house: House<P>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(house)),
        }
    }

    pub fn commit_move(&self, ctx: &CallContext, commit_hash: CommitHash, fee: Amount) -> Result<GameId> {
        self.inner.write().commit_move(ctx, commit_hash, fee)
    }

    pub fn reveal_move(&self, ctx: &CallContext, user_move: Move, salt: &Salt) -> Result<Game> {
        self.inner.write().reveal_move(ctx, user_move, salt)
    }

    pub fn forfeit_current_game(&self, ctx: &CallContext) -> Result<Game> {
        self.inner.write().forfeit_current_game(ctx)
    }

    pub fn deposit(&self, ctx: &CallContext, amount: Amount) -> Result<()> {
        self.inner.write().deposit(ctx, amount)
    }

    pub fn withdraw(&self, ctx: &CallContext, amount: Amount) -> Result<()> {
        self.inner.write().withdraw(ctx, amount)
    }

    pub fn withdraw_all_unreserved(&self, ctx: &CallContext) -> Result<Amount> {
        self.inner.write().withdraw_all_unreserved(ctx)
    }

    pub fn read<R>(&self, f: impl FnOnce(&House<P>) -> R) -> R {
        f(&self.inner.read())
    }

    pub fn write<R>(&self, f: impl FnOnce(&mut House<P>) -> R) -> R {
        f(&mut self.inner.write())
    }
}
