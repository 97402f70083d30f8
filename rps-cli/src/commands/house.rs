use comfy_table::{presets::UTF8_FULL, Table};
use dialoguer::Confirm;
use rps_core::{Address, Amount, HouseConfig, HouseError, HouseManager, Result};
use std::path::Path;

pub async fn init_house(
    data_dir: &Path,
    owner: Address,
    min_fee: Option<Amount>,
    max_fee: Option<Amount>,
    multiplier: Option<u64>,
) -> Result<()> {
    let mut config = HouseConfig::new(owner);
    if min_fee.is_some() || max_fee.is_some() {
        let min_fee = min_fee.unwrap_or(config.min_fee);
        let max_fee = max_fee.unwrap_or(config.max_fee);
        config = config.with_fee_range(min_fee, max_fee);
    }
    if let Some(multiplier) = multiplier {
        config = config.with_payout_multiplier(multiplier);
    }

    let manager = HouseManager::create(data_dir, config).await?;
    let config = manager.house().config();

    println!("House created in {}", manager.data_dir().display());
    println!("  Owner: {}", config.owner);
    println!("  Fee range: {} - {}", config.min_fee, config.max_fee);
    println!("  Payout multiplier: {}x", config.payout_multiplier);
    println!();
    println!("Deposit liquidity with 'rps deposit {} <amount>'", config.owner);
    Ok(())
}

pub async fn deposit(data_dir: &Path, owner: &Address, amount: Amount) -> Result<()> {
    let mut manager = HouseManager::open(data_dir).await?;
    manager
        .execute(owner, |house, ctx| house.deposit(ctx, amount))
        .await?;

    let house = manager.house();
    println!("Deposited {}", amount);
    println!("  House balance: {}", house.house_balance());
    println!("  Unreserved: {}", house.unreserved_liquidity());
    Ok(())
}

pub async fn withdraw(
    data_dir: &Path,
    owner: &Address,
    amount: Option<Amount>,
    yes: bool,
) -> Result<()> {
    let mut manager = HouseManager::open(data_dir).await?;

    let withdrawn = match amount {
        Some(amount) => {
            manager
                .execute(owner, |house, ctx| house.withdraw(ctx, amount))
                .await?;
            amount
        }
        None => {
            let available = manager.house().unreserved_liquidity();
            if !yes && !available.is_zero() {
                let confirm = Confirm::new()
                    .with_prompt(format!("Withdraw all unreserved liquidity ({})?", available))
                    .default(false)
                    .interact()
                    .map_err(|e| HouseError::internal(format!("Prompt failed: {}", e)))?;

                if !confirm {
                    println!("Withdrawal cancelled.");
                    return Ok(());
                }
            }

            manager
                .execute(owner, |house, ctx| house.withdraw_all_unreserved(ctx))
                .await?
        }
    };

    let house = manager.house();
    println!("Withdrew {}", withdrawn);
    println!("  House balance: {}", house.house_balance());
    println!("  Still reserved: {}", house.reserved_house_liquidity());
    Ok(())
}

pub async fn show_status(data_dir: &Path, player: Option<&Address>) -> Result<()> {
    let manager = HouseManager::open(data_dir).await?;
    let house = manager.house();

    if let Some(player) = player {
        match house.current_game(player) {
            Some(game) => {
                println!("Pending game for {}:", player);
                println!("  Game ID: {}", game.id);
                println!("  Fee: {}", game.participation_fee);
                println!("  Commitment: {}", game.commit_hash);
                println!("  Committed at block: {}", game.commit_block);
                println!();
                println!("Reveal with 'rps reveal {} <move> <salt>'", player);
            }
            None => println!("No pending game for {}", player),
        }
        return Ok(());
    }

    let stats = house.stats();
    let tip = manager.chain().tip();

    let mut table = Table::new();
    table.load_preset(UTF8_FULL);
    table.set_header(vec!["", "Value"]);
    table.add_row(vec!["Owner".to_string(), house.owner().to_string()]);
    table.add_row(vec!["Balance".to_string(), stats.balance.to_string()]);
    table.add_row(vec!["House balance".to_string(), stats.house_balance.to_string()]);
    table.add_row(vec!["Reserved".to_string(), stats.reserved.to_string()]);
    table.add_row(vec!["Unreserved".to_string(), stats.unreserved.to_string()]);
    table.add_row(vec!["Pending stakes".to_string(), stats.escrowed.to_string()]);
    table.add_row(vec!["Games".to_string(), stats.total_games.to_string()]);
    table.add_row(vec!["Pending games".to_string(), stats.pending_games.to_string()]);
    table.add_row(vec![
        "Block".to_string(),
        format!("{} ({})", tip.height, tip.timestamp.format("%Y-%m-%d %H:%M:%S")),
    ]);

    println!("{}", table);
    Ok(())
}
