//! Canonical game records and the per-player active slot.

use crate::commitment::CommitHash;
use crate::config::HouseConfig;
use crate::error::{HouseError, Result};
use crate::game::{Game, GameId};
use crate::ledger::LiquidityLedger;
use crate::types::{Address, Amount};
use std::collections::{BTreeMap, HashMap};

#[derive(Debug, Clone)]
pub struct CommitStore {
    games: BTreeMap<GameId, Game>,
    active: HashMap<Address, GameId>,
    next_id: GameId,
}

impl Default for CommitStore {
    fn default() -> Self {
        Self {
            games: BTreeMap::new(),
            active: HashMap::new(),
            next_id: 1,
        }
    }
}

impl CommitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rebuilds the store from persisted games. Active slots are derived from
    /// the pending games, so at most one may exist per player.
    pub fn from_games(games: Vec<Game>) -> Result<Self> {
        let mut store = Self::new();
        for game in games {
            if game.is_pending() {
                if let Some(existing) = store.active.insert(game.player.clone(), game.id) {
                    return Err(HouseError::internal(format!(
                        "player {} has two pending games: {} and {}",
                        game.player, existing, game.id
                    )));
                }
            }
            store.next_id = store.next_id.max(game.id + 1);
            store.games.insert(game.id, game);
        }
        Ok(store)
    }

    /// Opens a pending game for `player`, reserving its worst-case payout.
    pub(crate) fn open(
        &mut self,
        player: &Address,
        commit_hash: CommitHash,
        fee: Amount,
        commit_block: u64,
        config: &HouseConfig,
        ledger: &mut LiquidityLedger,
    ) -> Result<GameId> {
        if let Some(&game_id) = self.active.get(player) {
            return Err(HouseError::ActiveGameExists { game_id });
        }

        if !config.fee_in_range(fee) {
            return Err(HouseError::FeeOutOfRange {
                fee,
                min: config.min_fee,
                max: config.max_fee,
            });
        }

        let game_id = self.next_id;
        let max_payout = config.max_payout(fee)?;
        ledger.reserve(game_id, max_payout, fee)?;

        let game = Game::new(game_id, player.clone(), commit_hash, fee, commit_block);
        self.games.insert(game_id, game);
        self.active.insert(player.clone(), game_id);
        self.next_id += 1;

        Ok(game_id)
    }

    pub fn game(&self, game_id: GameId) -> Option<&Game> {
        self.games.get(&game_id)
    }

    pub fn games(&self) -> impl Iterator<Item = &Game> {
        self.games.values()
    }

    pub fn active_game(&self, player: &Address) -> Option<&Game> {
        self.active.get(player).and_then(|id| self.games.get(id))
    }

    pub fn pending_for(&self, player: &Address) -> Result<&Game> {
        self.active_game(player).ok_or(HouseError::NoActiveGame)
    }

    /// Checks that `settled` is a valid terminal successor of a stored pending game.
    pub(crate) fn ensure_closable(&self, settled: &Game) -> Result<()> {
        let current = self
            .games
            .get(&settled.id)
            .ok_or_else(|| HouseError::internal(format!("unknown game {}", settled.id)))?;
        if !current.is_pending() || settled.is_pending() {
            return Err(HouseError::internal(format!(
                "game {} cannot move from {} to {}",
                settled.id, current.winner, settled.winner
            )));
        }
        Ok(())
    }

    /// Stores a settled copy of a pending game and frees the player's slot.
    /// Callers run [`CommitStore::ensure_closable`] first.
    pub(crate) fn close(&mut self, settled: Game) {
        debug_assert!(self.ensure_closable(&settled).is_ok());
        self.active.remove(&settled.player);
        self.games.insert(settled.id, settled);
    }

    /// Count of games ever opened, pending ones included.
    pub fn total_games(&self) -> u64 {
        self.next_id - 1
    }

    pub fn pending_count(&self) -> usize {
        self.active.len()
    }
}
