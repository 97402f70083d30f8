use rps_core::{
    commit_move, generate_salt, Address, Amount, Game, HouseManager, Move, Outcome, Result, Salt,
};
use std::path::Path;

/// Hex input is taken as raw bytes; anything else as short text.
fn parse_salt(input: &str) -> Result<Salt> {
    let body = input.strip_prefix("0x").unwrap_or(input);
    if body.len() == 64 && body.chars().all(|c| c.is_ascii_hexdigit()) {
        input.parse()
    } else {
        Salt::from_text(input)
    }
}

pub fn show_hash(mv: Move, salt: &str) -> Result<()> {
    let salt = parse_salt(salt)?;
    println!("{}", commit_move(mv, &salt));
    Ok(())
}

pub async fn commit(
    data_dir: &Path,
    player: &Address,
    mv: Move,
    fee: Amount,
    salt: Option<&str>,
) -> Result<()> {
    if !mv.is_playable() {
        return Err(rps_core::HouseError::InvalidMove(mv.to_string()));
    }

    let (salt, generated) = match salt {
        Some(salt) => (parse_salt(salt)?, false),
        None => (generate_salt(), true),
    };
    let hash = commit_move(mv, &salt);

    let mut manager = HouseManager::open(data_dir).await?;
    let game_id = manager
        .execute(player, |house, ctx| house.commit_move(ctx, hash, fee))
        .await?;

    println!("Committed game {}", game_id);
    println!("  Fee: {}", fee);
    println!("  Commitment: {}", hash);
    if generated {
        println!();
        println!("Salt: 0x{}", hex::encode(salt.as_bytes()));
        println!("Keep this salt secret; it is needed to reveal.");
    }
    println!();
    println!("Reveal with 'rps reveal {} {} <salt>'", player, mv);
    Ok(())
}

pub async fn reveal(data_dir: &Path, player: &Address, mv: Move, salt: &str) -> Result<()> {
    let salt = parse_salt(salt)?;

    let mut manager = HouseManager::open(data_dir).await?;
    let game = manager
        .execute(player, |house, ctx| house.reveal_move(ctx, mv, &salt))
        .await?;

    print_result(&game);
    Ok(())
}

pub async fn forfeit(data_dir: &Path, player: &Address) -> Result<()> {
    let mut manager = HouseManager::open(data_dir).await?;
    let game = manager
        .execute(player, |house, ctx| house.forfeit_current_game(ctx))
        .await?;

    println!("Game {} forfeited; the fee of {} goes to the house.", game.id, game.participation_fee);
    Ok(())
}

fn print_result(game: &Game) {
    println!("Game {}: {} vs {}", game.id, game.user_move, game.bot_move);
    match game.winner {
        Outcome::Player => println!("You win! Paid out {}", game.prize_money),
        Outcome::Draw => println!("Draw. Refunded {}", game.prize_money),
        Outcome::Bot => println!("The house wins."),
        Outcome::Pending => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_salt_forms() {
        let hex = format!("0x{}", "ab".repeat(32));
        assert_eq!(parse_salt(&hex).unwrap(), Salt::from([0xab; 32]));
        assert_eq!(parse_salt(&"ab".repeat(32)).unwrap(), Salt::from([0xab; 32]));
        assert_eq!(
            parse_salt("hunter2").unwrap(),
            Salt::from_text("hunter2").unwrap()
        );
        assert!(parse_salt(&"x".repeat(40)).is_err());
    }
}
