use crate::chain::LocalChain;
use crate::commit_store::CommitStore;
use crate::commitment::CommitHash;
use crate::error::{HouseError, Result};
use crate::events::EmittedEvent;
use crate::game::{Game, GameId, Move, Outcome};
use crate::house::{House, HouseState};
use crate::ledger::{LiquidityLedger, LiquidityState, Reservation};
use crate::payments::{PaymentReason, Payments, Transfer};
use crate::registry::GameRegistry;
use crate::storage::Storage;
use crate::types::{Address, Amount, BlockInfo};
use chrono::Utc;
use rusqlite::params;
use std::collections::BTreeSet;

const GLOBAL_SCOPE: &str = "*";

/// Raw `games` row before validation.
type GameRow = (i64, String, String, String, i64, i64, u8, u8, u8, String);

pub struct HouseStore<'a> {
    storage: &'a Storage,
}

impl<'a> HouseStore<'a> {
    pub fn new(storage: &'a Storage) -> Self {
        Self { storage }
    }

    /// Writes the house, the chain tip and any new events and transfers in one
    /// transaction. Only games named by `events` are written; every other game
    /// row is already current.
    pub async fn save<P: Payments>(
        &self,
        house: &House<P>,
        chain: &LocalChain,
        events: &[EmittedEvent],
        transfers: &[Transfer],
    ) -> Result<()> {
        let mut conn = self.storage.get_connection().await;
        let tx = conn.transaction()?;

        let touched: BTreeSet<GameId> = events.iter().filter_map(|e| e.event.game_id()).collect();
        for game_id in touched {
            let game = house.commits().game(game_id).ok_or_else(|| {
                HouseError::internal(format!("event names unknown game {}", game_id))
            })?;
            tx.execute(
                "INSERT OR REPLACE INTO games
                 (id, player, commit_hash, participation_fee, commit_block, reveal_block,
                  user_move, bot_move, winner, prize_money)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
                params![
                    game.id as i64,
                    game.player.as_str(),
                    game.commit_hash.to_hex(),
                    amount_text(game.participation_fee),
                    game.commit_block as i64,
                    game.reveal_block as i64,
                    game.user_move.as_u8(),
                    game.bot_move.as_u8(),
                    u8::from(game.winner),
                    amount_text(game.prize_money),
                ],
            )?;
        }

        tx.execute("DELETE FROM active_games", [])?;
        for game in house.commits().games().filter(|g| g.is_pending()) {
            tx.execute(
                "INSERT INTO active_games (player, game_id) VALUES (?1, ?2)",
                params![game.player.as_str(), game.id as i64],
            )?;
        }

        let ledger = house.ledger().state();
        tx.execute(
            "INSERT OR REPLACE INTO ledger (id, total_balance, reserved, escrowed)
             VALUES (1, ?1, ?2, ?3)",
            params![
                amount_text(ledger.total_balance),
                amount_text(ledger.reserved),
                amount_text(ledger.escrowed),
            ],
        )?;

        tx.execute("DELETE FROM reservations", [])?;
        for reservation in house.ledger().reservations() {
            tx.execute(
                "INSERT INTO reservations (game_id, max_payout, stake) VALUES (?1, ?2, ?3)",
                params![
                    reservation.game_id as i64,
                    amount_text(reservation.max_payout),
                    amount_text(reservation.stake),
                ],
            )?;
        }

        tx.execute("DELETE FROM history", [])?;
        let registry = house.registry();
        let scopes = std::iter::once((GLOBAL_SCOPE, registry.global()))
            .chain(registry.players().map(|(player, ring)| (player.as_str(), ring)));
        for (scope, ring) in scopes {
            for (position, game_id) in ring.oldest_first().into_iter().enumerate() {
                tx.execute(
                    "INSERT INTO history (scope, position, game_id) VALUES (?1, ?2, ?3)",
                    params![scope, position as i64, game_id as i64],
                )?;
            }
        }

        let tip = chain.tip();
        tx.execute(
            "INSERT OR REPLACE INTO chain (id, height, timestamp, hash) VALUES (1, ?1, ?2, ?3)",
            params![
                tip.height as i64,
                tip.timestamp.timestamp_millis(),
                hex::encode(tip.hash),
            ],
        )?;

        for emitted in events {
            tx.execute(
                "INSERT INTO events (block_height, kind, payload) VALUES (?1, ?2, ?3)",
                params![
                    emitted.block_height as i64,
                    emitted.event.name(),
                    serde_json::to_string(&emitted.event)?,
                ],
            )?;
        }

        for transfer in transfers {
            tx.execute(
                "INSERT INTO transfers (block_height, recipient, amount, reason)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    transfer.block_height as i64,
                    transfer.to.as_str(),
                    amount_text(transfer.amount),
                    reason_text(transfer.reason),
                ],
            )?;
        }

        tx.commit()?;

        tracing::debug!(
            "Saved house at block {} ({} events, {} transfers)",
            tip.height,
            events.len(),
            transfers.len()
        );
        Ok(())
    }

    /// Loads the persisted house parts, or `None` if nothing has been saved yet.
    pub async fn load_state(&self, history_capacity: usize) -> Result<Option<HouseState>> {
        let conn = self.storage.get_connection().await;

        let ledger_row: Option<(String, String, String)> = {
            let mut stmt =
                conn.prepare("SELECT total_balance, reserved, escrowed FROM ledger WHERE id = 1")?;
            let mut rows = stmt.query_map([], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                ))
            })?;
            rows.next().transpose()?
        };
        let Some((total_balance, reserved, escrowed)) = ledger_row else {
            return Ok(None);
        };

        let mut stmt = conn.prepare("SELECT game_id, max_payout, stake FROM reservations")?;
        let reservation_rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let mut reservations = Vec::new();
        for row in reservation_rows {
            let (game_id, max_payout, stake) = row?;
            reservations.push(Reservation {
                game_id: game_id as GameId,
                max_payout: parse_amount(&max_payout)?,
                stake: parse_amount(&stake)?,
            });
        }
        let ledger = LiquidityLedger::from_parts(
            LiquidityState {
                total_balance: parse_amount(&total_balance)?,
                reserved: parse_amount(&reserved)?,
                escrowed: parse_amount(&escrowed)?,
            },
            reservations,
        )?;

        let mut stmt = conn.prepare(
            "SELECT id, player, commit_hash, participation_fee, commit_block, reveal_block,
                    user_move, bot_move, winner, prize_money
             FROM games ORDER BY id",
        )?;
        let game_rows = stmt.query_map([], |row| -> rusqlite::Result<GameRow> {
            Ok((
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                row.get(3)?,
                row.get(4)?,
                row.get(5)?,
                row.get(6)?,
                row.get(7)?,
                row.get(8)?,
                row.get(9)?,
            ))
        })?;
        let mut games = Vec::new();
        for row in game_rows {
            games.push(game_from_row(row?)?);
        }
        let commits = CommitStore::from_games(games)?;

        let active: i64 = conn.query_row("SELECT COUNT(*) FROM active_games", [], |row| row.get(0))?;
        if active as usize != commits.pending_count() {
            return Err(HouseError::internal(format!(
                "{} active slots stored for {} pending games",
                active,
                commits.pending_count()
            )));
        }

        let mut stmt =
            conn.prepare("SELECT scope, game_id FROM history ORDER BY scope, position")?;
        let history_rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;
        let mut global = Vec::new();
        let mut by_player: Vec<(Address, Vec<GameId>)> = Vec::new();
        for row in history_rows {
            let (scope, game_id) = row?;
            let game_id = game_id as GameId;
            if scope == GLOBAL_SCOPE {
                global.push(game_id);
                continue;
            }
            let player: Address = scope.parse()?;
            match by_player.last_mut() {
                Some((last, ids)) if *last == player => ids.push(game_id),
                _ => by_player.push((player, vec![game_id])),
            }
        }
        let registry = GameRegistry::from_rings(history_capacity, global, by_player);

        Ok(Some(HouseState {
            ledger,
            commits,
            registry,
        }))
    }

    pub async fn load_chain(&self) -> Result<Option<LocalChain>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare("SELECT height, timestamp, hash FROM chain WHERE id = 1")?;
        let mut rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, i64>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;
        let Some(row) = rows.next().transpose()? else {
            return Ok(None);
        };

        let (height, millis, hash_hex) = row;
        let timestamp = chrono::DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now);
        let hash: [u8; 32] = hex::decode(&hash_hex)
            .ok()
            .and_then(|bytes| bytes.try_into().ok())
            .ok_or_else(|| HouseError::internal(format!("corrupt block hash {}", hash_hex)))?;

        Ok(Some(LocalChain::from_tip(BlockInfo::new(
            height as u64,
            timestamp,
            hash,
        ))))
    }

    /// Most recent events, newest first.
    pub async fn recent_events(&self, limit: usize) -> Result<Vec<EmittedEvent>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT block_height, payload FROM events ORDER BY seq DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        let mut events = Vec::new();
        for row in rows {
            let (block_height, payload) = row?;
            events.push(EmittedEvent {
                block_height: block_height as u64,
                event: serde_json::from_str(&payload)?,
            });
        }
        Ok(events)
    }

    /// Transfers to `recipient`, oldest first.
    pub async fn transfers_to(&self, recipient: &Address) -> Result<Vec<Transfer>> {
        let conn = self.storage.get_connection().await;

        let mut stmt = conn.prepare(
            "SELECT block_height, amount, reason FROM transfers
             WHERE recipient = ?1 ORDER BY seq",
        )?;
        let rows = stmt.query_map(params![recipient.as_str()], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
            ))
        })?;

        let mut transfers = Vec::new();
        for row in rows {
            let (block_height, amount, reason) = row?;
            transfers.push(Transfer {
                to: recipient.clone(),
                amount: parse_amount(&amount)?,
                reason: parse_reason(&reason)?,
                block_height: block_height as u64,
            });
        }
        Ok(transfers)
    }
}

fn game_from_row(row: GameRow) -> Result<Game> {
    let (id, player, hash, fee, commit_block, reveal_block, user_move, bot_move, winner, prize) =
        row;

    Ok(Game {
        id: id as GameId,
        player: player.parse()?,
        commit_hash: hash.parse::<CommitHash>()?,
        participation_fee: parse_amount(&fee)?,
        commit_block: commit_block as u64,
        reveal_block: reveal_block as u64,
        user_move: Move::try_from(user_move)?,
        bot_move: Move::try_from(bot_move)?,
        winner: Outcome::try_from(winner)?,
        prize_money: parse_amount(&prize)?,
    })
}

fn amount_text(amount: Amount) -> String {
    amount.base_units().to_string()
}

fn parse_amount(text: &str) -> Result<Amount> {
    text.parse::<u128>()
        .map(Amount::from_base_units)
        .map_err(|_| HouseError::InvalidAmount(text.to_string()))
}

fn reason_text(reason: PaymentReason) -> &'static str {
    match reason {
        PaymentReason::Prize => "prize",
        PaymentReason::Refund => "refund",
        PaymentReason::Withdrawal => "withdrawal",
    }
}

fn parse_reason(text: &str) -> Result<PaymentReason> {
    match text {
        "prize" => Ok(PaymentReason::Prize),
        "refund" => Ok(PaymentReason::Refund),
        "withdrawal" => Ok(PaymentReason::Withdrawal),
        other => Err(HouseError::internal(format!("unknown transfer reason {}", other))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::commitment::{commit_move, generate_salt};
    use crate::config::HouseConfig;
    use crate::events::HouseEvent;
    use crate::oracle::FixedMoveOracle;
    use crate::payments::PaymentLog;
    use crate::types::CallContext;
    use tempfile::tempdir;

    fn addr(n: u8) -> Address {
        format!("0x{:040x}", n).parse().unwrap()
    }

    fn house(config: &HouseConfig) -> House {
        House::with_parts(
            config.clone(),
            Box::new(FixedMoveOracle(Move::Scissors)),
            PaymentLog::new(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_empty_database_has_no_state() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(&dir.path().join("house.db")).await.unwrap();
        let store = HouseStore::new(&storage);

        assert!(store.load_state(30).await.unwrap().is_none());
        assert!(store.load_chain().await.unwrap().is_none());
        assert!(store.recent_events(10).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_save_and_reload_house() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(&dir.path().join("house.db")).await.unwrap();
        let store = HouseStore::new(&storage);

        let owner = addr(0xff);
        let config = HouseConfig::new(owner.clone());
        let mut house = house(&config);
        let mut chain = LocalChain::genesis(Utc::now());
        let (winner, waiting) = (addr(1), addr(2));

        let ctx = |caller: &Address, chain: &mut LocalChain| {
            CallContext::new(caller.clone(), chain.next_block(Utc::now()))
        };

        house
            .deposit(&ctx(&owner, &mut chain), Amount::from_whole(10))
            .unwrap();
        let salt = generate_salt();
        house
            .commit_move(
                &ctx(&winner, &mut chain),
                commit_move(Move::Rock, &salt),
                Amount::from_whole(1),
            )
            .unwrap();
        house
            .commit_move(
                &ctx(&waiting, &mut chain),
                commit_move(Move::Paper, &generate_salt()),
                Amount::from_whole(2),
            )
            .unwrap();
        house
            .reveal_move(&ctx(&winner, &mut chain), Move::Rock, &salt)
            .unwrap();

        let events = house.drain_events();
        let transfers = house.payments_mut().drain();
        store.save(&house, &chain, &events, &transfers).await.unwrap();

        let state = store.load_state(30).await.unwrap().unwrap();
        let restored = House::restore(
            config,
            state,
            Box::new(FixedMoveOracle(Move::Scissors)),
            PaymentLog::new(),
        )
        .unwrap();

        assert_eq!(restored.stats(), house.stats());
        assert_eq!(restored.current_game(&waiting), house.current_game(&waiting));
        assert_eq!(restored.latest_games(30), house.latest_games(30));
        assert_eq!(
            restored.latest_games_of(&winner, 30),
            house.latest_games_of(&winner, 30)
        );
        assert_eq!(store.load_chain().await.unwrap().unwrap(), chain);

        let stored_events = store.recent_events(10).await.unwrap();
        assert_eq!(stored_events.len(), 4);
        assert!(matches!(stored_events[0].event, HouseEvent::MoveRevealed(_)));

        let paid = store.transfers_to(&winner).await.unwrap();
        assert_eq!(paid.len(), 1);
        assert_eq!(paid[0].amount, Amount::from_whole(2));
        assert_eq!(paid[0].reason, PaymentReason::Prize);
    }

    #[tokio::test]
    async fn test_resave_replaces_state() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(&dir.path().join("house.db")).await.unwrap();
        let store = HouseStore::new(&storage);

        let owner = addr(0xff);
        let config = HouseConfig::new(owner.clone());
        let mut house = house(&config);
        let mut chain = LocalChain::genesis(Utc::now());
        let player = addr(3);

        house
            .deposit(
                &CallContext::new(owner.clone(), chain.next_block(Utc::now())),
                Amount::from_whole(5),
            )
            .unwrap();
        house
            .commit_move(
                &CallContext::new(player.clone(), chain.next_block(Utc::now())),
                commit_move(Move::Paper, &generate_salt()),
                Amount::from_whole(1),
            )
            .unwrap();
        let events = house.drain_events();
        store.save(&house, &chain, &events, &[]).await.unwrap();

        house
            .forfeit_current_game(&CallContext::new(
                player.clone(),
                chain.next_block(Utc::now()),
            ))
            .unwrap();
        let events = house.drain_events();
        store.save(&house, &chain, &events, &[]).await.unwrap();

        let state = store.load_state(30).await.unwrap().unwrap();
        assert_eq!(state.commits.pending_count(), 0);
        assert_eq!(state.ledger.reservations().count(), 0);
        assert!(state.commits.game(1).unwrap().is_forfeited());
        assert_eq!(state.ledger.total_balance(), Amount::from_whole(6));
        assert_eq!(store.recent_events(1).await.unwrap()[0].event.name(), "GameForfeited");
    }

    /// House with `players` pending games of 1 unit each, funded with 10 units.
    fn house_with_pending(config: &HouseConfig, players: &[Address], chain: &mut LocalChain) -> House {
        let mut house = house(config);
        house
            .deposit(
                &CallContext::new(config.owner.clone(), chain.next_block(Utc::now())),
                Amount::from_whole(10),
            )
            .unwrap();
        for player in players {
            house
                .commit_move(
                    &CallContext::new(player.clone(), chain.next_block(Utc::now())),
                    commit_move(Move::Rock, &generate_salt()),
                    Amount::from_whole(1),
                )
                .unwrap();
        }
        house
    }

    #[tokio::test]
    async fn test_save_writes_only_touched_games() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(&dir.path().join("house.db")).await.unwrap();
        let store = HouseStore::new(&storage);

        let config = HouseConfig::new(addr(0xff));
        let (first, second) = (addr(1), addr(2));
        let mut chain = LocalChain::genesis(Utc::now());
        let mut house = house_with_pending(&config, &[first.clone(), second.clone()], &mut chain);
        let events = house.drain_events();
        store.save(&house, &chain, &events, &[]).await.unwrap();

        storage
            .get_connection()
            .await
            .execute("UPDATE games SET commit_block = 99 WHERE id = 1", [])
            .unwrap();

        house
            .forfeit_current_game(&CallContext::new(second, chain.next_block(Utc::now())))
            .unwrap();
        let events = house.drain_events();
        store.save(&house, &chain, &events, &[]).await.unwrap();

        let state = store.load_state(30).await.unwrap().unwrap();
        // game 1 was not part of the last operation, so its row was left alone
        assert_eq!(state.commits.game(1).unwrap().commit_block, 99);
        assert!(state.commits.game(2).unwrap().is_forfeited());
        assert_eq!(state.commits.pending_count(), 1);
        assert!(state.commits.active_game(&first).is_some());
    }

    #[tokio::test]
    async fn test_load_rejects_missing_active_slot() {
        let dir = tempdir().unwrap();
        let storage = Storage::new(&dir.path().join("house.db")).await.unwrap();
        let store = HouseStore::new(&storage);

        let config = HouseConfig::new(addr(0xff));
        let mut chain = LocalChain::genesis(Utc::now());
        let mut house = house_with_pending(&config, &[addr(1), addr(2)], &mut chain);
        let events = house.drain_events();
        store.save(&house, &chain, &events, &[]).await.unwrap();

        storage
            .get_connection()
            .await
            .execute("DELETE FROM active_games WHERE game_id = 2", [])
            .unwrap();

        let err = store.load_state(30).await.unwrap_err();
        assert!(matches!(err, HouseError::Internal(_)));
    }
}
