use comfy_table::{presets::UTF8_FULL, Table};
use rps_core::{Address, HouseEvent, HouseManager, Result};
use std::path::Path;

pub async fn show_history(data_dir: &Path, player: Option<&Address>, count: usize) -> Result<()> {
    let manager = HouseManager::open(data_dir).await?;
    let house = manager.house();

    let games = match player {
        Some(player) => house.latest_games_of(player, count),
        None => house.latest_games(count),
    };

    if games.is_empty() {
        println!("No settled games yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec![
        "Game", "Player", "Fee", "Move", "House", "Winner", "Prize", "Block",
    ]);

    for game in &games {
        let forfeited = game.is_forfeited();
        table.add_row(vec![
            game.id.to_string(),
            game.player.short(),
            game.participation_fee.to_string(),
            if forfeited { "-".to_string() } else { game.user_move.to_string() },
            if forfeited { "-".to_string() } else { game.bot_move.to_string() },
            if forfeited { "Forfeit".to_string() } else { game.winner.to_string() },
            game.prize_money.to_string(),
            game.reveal_block.to_string(),
        ]);
    }

    println!("{}", table);
    if count > house.config().history_capacity {
        println!(
            "Only the last {} games are kept.",
            house.config().history_capacity
        );
    }
    Ok(())
}

pub async fn show_events(data_dir: &Path, limit: usize, json: bool) -> Result<()> {
    let manager = HouseManager::open(data_dir).await?;
    let events = manager.recent_events(limit).await?;

    if json {
        for emitted in &events {
            println!("{}", serde_json::to_string(emitted)?);
        }
        return Ok(());
    }

    if events.is_empty() {
        println!("No events yet.");
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["Block", "Event", "Details"]);

    for emitted in &events {
        let details = match &emitted.event {
            HouseEvent::MoveCommitted {
                player,
                game_id,
                fee,
                reserved,
            } => format!(
                "game {} by {}, fee {}, reserved {}",
                game_id,
                player.short(),
                fee,
                reserved
            ),
            HouseEvent::MoveRevealed(record) => format!(
                "game {}: {} vs {}, {} wins, prize {}",
                record.game_id, record.user_move, record.bot_move, record.winner, record.prize_money
            ),
            HouseEvent::GameForfeited(record) => {
                format!("game {} by {}", record.game_id, record.player.short())
            }
            HouseEvent::Deposited { amount, .. } => amount.to_string(),
            HouseEvent::Withdrawn { amount, .. } => amount.to_string(),
        };
        table.add_row(vec![
            emitted.block_height.to_string(),
            emitted.event.name().to_string(),
            details,
        ]);
    }

    println!("{}", table);
    Ok(())
}
