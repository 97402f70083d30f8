//! Bounded settlement history.
//!
//! Each index is a fixed-capacity ring of game ids. Evicting an id never
//! touches the game itself, which stays in the [`CommitStore`].

use crate::commit_store::CommitStore;
use crate::game::{Game, GameId};
use crate::types::Address;
use std::collections::HashMap;

/// Fixed-capacity ring of game ids with a next-write cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryRing {
    slots: Vec<GameId>,
    capacity: usize,
    next: usize,
}

impl HistoryRing {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            slots: Vec::with_capacity(capacity),
            capacity,
            next: 0,
        }
    }

    pub fn push(&mut self, game_id: GameId) {
        if self.slots.len() < self.capacity {
            self.slots.push(game_id);
        } else {
            self.slots[self.next] = game_id;
        }
        self.next = (self.next + 1) % self.capacity;
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Up to `n` ids, most recent first.
    pub fn latest(&self, n: usize) -> Vec<GameId> {
        // while filling, `next` equals the length so the walk never leaves the filled prefix
        (1..=n.min(self.slots.len()))
            .map(|back| self.slots[(self.next + self.capacity - back) % self.capacity])
            .collect()
    }

    /// All ids, oldest first.
    pub fn oldest_first(&self) -> Vec<GameId> {
        let mut ids = self.latest(self.slots.len());
        ids.reverse();
        ids
    }
}

#[derive(Debug, Clone)]
pub struct GameRegistry {
    capacity: usize,
    global: HistoryRing,
    by_player: HashMap<Address, HistoryRing>,
}

impl GameRegistry {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            global: HistoryRing::new(capacity),
            by_player: HashMap::new(),
        }
    }

    /// Rebuilds the indices from persisted ids, each list oldest first.
    pub fn from_rings(
        capacity: usize,
        global: Vec<GameId>,
        by_player: Vec<(Address, Vec<GameId>)>,
    ) -> Self {
        let mut registry = Self::new(capacity);
        for id in global {
            registry.global.push(id);
        }
        for (player, ids) in by_player {
            let ring = registry
                .by_player
                .entry(player)
                .or_insert_with(|| HistoryRing::new(capacity));
            for id in ids {
                ring.push(id);
            }
        }
        registry
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Appends a just-settled game to the global and player indices.
    pub fn record(&mut self, game: &Game) {
        self.global.push(game.id);
        self.by_player
            .entry(game.player.clone())
            .or_insert_with(|| HistoryRing::new(self.capacity))
            .push(game.id);
    }

    pub fn global(&self) -> &HistoryRing {
        &self.global
    }

    pub fn players(&self) -> impl Iterator<Item = (&Address, &HistoryRing)> {
        self.by_player.iter()
    }

    /// Up to `min(n, capacity)` settled games, most recent first.
    pub fn latest_games(&self, store: &CommitStore, n: usize) -> Vec<Game> {
        resolve(store, self.global.latest(n.min(self.capacity)))
    }

    pub fn latest_games_of(&self, store: &CommitStore, player: &Address, n: usize) -> Vec<Game> {
        match self.by_player.get(player) {
            Some(ring) => resolve(store, ring.latest(n.min(self.capacity))),
            None => Vec::new(),
        }
    }
}

fn resolve(store: &CommitStore, ids: Vec<GameId>) -> Vec<Game> {
    ids.into_iter()
        .filter_map(|id| store.game(id).cloned())
        .collect()
}
