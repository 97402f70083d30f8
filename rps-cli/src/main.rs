mod commands;
mod config;

use clap::{Parser, Subcommand};
use config::CliConfig;
use rps_core::{Address, Amount, HouseError, Move};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "rps")]
#[command(about = "Commit-reveal rock-paper-scissors against the house")]
#[command(version)]
struct Cli {
    /// Data directory for house storage
    #[arg(short, long, global = true)]
    data_dir: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a new house
    Init {
        /// Owner address allowed to deposit and withdraw
        #[arg(long)]
        owner: Address,
        /// Minimum participation fee
        #[arg(long)]
        min_fee: Option<Amount>,
        /// Maximum participation fee
        #[arg(long)]
        max_fee: Option<Amount>,
        /// Payout multiplier for a player win
        #[arg(long)]
        multiplier: Option<u64>,
    },
    /// Add liquidity to the house
    Deposit {
        /// Owner address
        owner: Address,
        /// Amount in whole units, e.g. 1.5
        amount: Amount,
    },
    /// Withdraw unreserved liquidity
    Withdraw {
        /// Owner address
        owner: Address,
        /// Amount to withdraw; everything unreserved if omitted
        amount: Option<Amount>,
        /// Skip the confirmation prompt
        #[arg(short, long)]
        yes: bool,
    },
    /// Compute the commitment for a move and salt
    Hash {
        /// rock, paper or scissors
        #[arg(value_name = "MOVE")]
        mv: Move,
        /// Salt as 32 hex bytes or up to 31 characters of text
        salt: String,
    },
    /// Commit to a move and pay the participation fee
    Commit {
        /// Player address
        player: Address,
        /// rock, paper or scissors
        #[arg(value_name = "MOVE")]
        mv: Move,
        /// Participation fee
        fee: Amount,
        /// Salt to use; a random one is generated and printed if omitted
        #[arg(long)]
        salt: Option<String>,
    },
    /// Reveal the committed move and settle the game
    Reveal {
        /// Player address
        player: Address,
        /// The committed move
        #[arg(value_name = "MOVE")]
        mv: Move,
        /// The salt used for the commitment
        salt: String,
    },
    /// Abandon the pending game
    Forfeit {
        /// Player address
        player: Address,
    },
    /// Show house liquidity, or a player's pending game
    Status {
        /// Player address
        player: Option<Address>,
    },
    /// Show recently settled games
    History {
        /// Only games of this player
        #[arg(short, long)]
        player: Option<Address>,
        /// Number of games to show
        #[arg(short, long, default_value_t = 10)]
        count: usize,
    },
    /// Show recent house events
    Events {
        /// Number of events to show
        #[arg(short, long, default_value_t = 20)]
        limit: usize,
        /// Print events as JSON lines
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = CliConfig::default();
    if let Some(data_dir) = cli.data_dir {
        config.data_dir = data_dir;
    }
    config.verbose = cli.verbose;

    // Initialize logging
    let log_level = if config.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "rps={},rps_core={}",
            log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    tokio::fs::create_dir_all(&config.data_dir).await?;
    let data_dir = config.data_dir.as_path();
    tracing::debug!("Using data directory {}", data_dir.display());

    let result = match cli.command {
        Commands::Init {
            owner,
            min_fee,
            max_fee,
            multiplier,
        } => commands::init_house(data_dir, owner, min_fee, max_fee, multiplier).await,
        Commands::Deposit { owner, amount } => commands::deposit(data_dir, &owner, amount).await,
        Commands::Withdraw { owner, amount, yes } => {
            commands::withdraw(data_dir, &owner, amount, yes).await
        }
        Commands::Hash { mv, salt } => commands::show_hash(mv, &salt),
        Commands::Commit {
            player,
            mv,
            fee,
            salt,
        } => commands::commit(data_dir, &player, mv, fee, salt.as_deref()).await,
        Commands::Reveal { player, mv, salt } => {
            commands::reveal(data_dir, &player, mv, &salt).await
        }
        Commands::Forfeit { player } => commands::forfeit(data_dir, &player).await,
        Commands::Status { player } => commands::show_status(data_dir, player.as_ref()).await,
        Commands::History { player, count } => {
            commands::show_history(data_dir, player.as_ref(), count).await
        }
        Commands::Events { limit, json } => commands::show_events(data_dir, limit, json).await,
    };

    if let Err(e) = result {
        match e {
            HouseError::NotOwner => {
                eprintln!("Error: Only the house owner can do that");
            }
            HouseError::InsufficientLiquidity { need, available } => {
                eprintln!("Error: The house cannot cover this wager right now");
                eprintln!("Need: {}, Available: {}", need, available);
            }
            HouseError::ActiveGameExists { game_id } => {
                eprintln!("Error: Game {} is still pending", game_id);
                eprintln!("Use 'rps reveal' or 'rps forfeit' to finish it first");
            }
            HouseError::NoActiveGame => {
                eprintln!("Error: No pending game for this player");
                eprintln!("Use 'rps commit' to start one");
            }
            HouseError::HashMismatch => {
                eprintln!("Error: Invalid move or salt");
                eprintln!("The game is still pending; reveal again with the committed values");
            }
            _ => {
                eprintln!("Error: {}", e);
            }
        }
        std::process::exit(1);
    }

    Ok(())
}
