//! QuickThree service binary
//!
//! `run` resumes every enabled group and keeps drawing until Ctrl+C. The
//! local messenger logs chat traffic instead of talking to a platform.

use clap::{Parser, Subcommand};
use quickthree::{
    admin::HISTORY_LIMIT,
    config::{ConfigLoader, QuickThreeConfig, MAX_DRAW_CYCLE_MINUTES},
    errors::{QuickThreeResult, ValidationError},
    ledger_store::LedgerStore,
    messenger::LocalMessenger,
    models::{Account, ChatId, Group, GroupId, OddsConfig},
    storage::OptimizedStorage,
    BetCategory, ServiceBuilder, ServiceContainer,
};
use rand::Rng;
use rust_decimal::Decimal;
use std::{path::PathBuf, sync::Arc, time::Duration};
use tracing::{info, warn};

/// QuickThree dice round service
#[derive(Parser)]
#[command(name = "quickthree")]
#[command(about = "Scheduled dice rounds with wager settlement for group chats")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Root directory for the ledger and round cache databases
    #[arg(short, long)]
    data_dir: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Resume every enabled group and run draws until interrupted
    Run {
        /// Member count reported by the local messenger
        #[arg(short, long, default_value = "3")]
        members: u32,

        /// Seconds between simulated wagers (0 disables them)
        #[arg(short, long, default_value = "0")]
        bet_interval_secs: u64,
    },

    /// Create a group with odds and funded accounts
    Seed {
        /// Platform chat id of the group
        #[arg(long, default_value = "-1001", allow_negative_numbers = true)]
        chat_id: i64,

        #[arg(long, default_value = "Quick Three")]
        title: String,

        /// Number of member accounts to create
        #[arg(short, long, default_value = "3")]
        accounts: u32,

        /// Starting balance per account
        #[arg(short, long, default_value = "1000")]
        balance: Decimal,

        /// Draw cycle in minutes (defaults to the configured value)
        #[arg(long)]
        cycle: Option<u32>,
    },

    /// Print recent draws and balances for a group
    Inspect {
        group_id: String,

        #[arg(short, long, default_value_t = HISTORY_LIMIT)]
        limit: usize,
    },
}

fn init_tracing(config: &QuickThreeConfig, verbose: bool) {
    let level = if verbose {
        "debug"
    } else {
        config.monitoring.log_level.as_filter()
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("quickthree={}", level).into()),
        )
        .init();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let mut loader = ConfigLoader::new();
    if let Some(path) = &cli.config {
        loader = loader.with_path(path);
    }
    let mut config = loader.load()?;

    if let Some(dir) = &cli.data_dir {
        config.storage.data_directory = dir.join("ledger").to_string_lossy().to_string();
        config.storage.cache_directory = dir.join("round_cache").to_string_lossy().to_string();
    }

    init_tracing(&config, cli.verbose);

    match cli.command {
        Commands::Run {
            members,
            bet_interval_secs,
        } => run(config, members, bet_interval_secs).await?,
        Commands::Seed {
            chat_id,
            title,
            accounts,
            balance,
            cycle,
        } => seed(config, chat_id, title, accounts, balance, cycle)?,
        Commands::Inspect { group_id, limit } => inspect(config, GroupId::new(group_id), limit)?,
    }

    Ok(())
}

async fn run(config: QuickThreeConfig, members: u32, bet_interval_secs: u64) -> QuickThreeResult<()> {
    let services = ServiceBuilder::new(config)
        .with_messenger(Arc::new(LocalMessenger::new(members)))
        .build()?;
    let services = Arc::new(services);

    let scheduler = services.scheduler();
    let resumed = scheduler.resume_all().await?;
    if resumed == 0 {
        warn!("No enabled groups; run `quickthree seed` first");
    }

    if bet_interval_secs > 0 {
        tokio::spawn(simulate_bettors(
            Arc::clone(&services),
            Duration::from_secs(bet_interval_secs),
        ));
    }

    tokio::signal::ctrl_c().await?;
    info!("Shutting down");
    scheduler.stop_all().await;

    let reaped = services.context().locks.reap_idle();
    info!(reaped, "Lock registry cleaned up");
    Ok(())
}

/// Places random wagers for random members of every playable group
async fn simulate_bettors(services: Arc<ServiceContainer>, every: Duration) {
    let mut ticker = tokio::time::interval(every);
    let store = services.store();
    let wagers = services.wagers();

    loop {
        ticker.tick().await;

        let groups = match store.playable_groups() {
            Ok(groups) => groups,
            Err(e) => {
                warn!("Simulation paused: {}", e);
                continue;
            }
        };

        for group in groups {
            let accounts = match store.accounts_in_group(&group.id) {
                Ok(accounts) if !accounts.is_empty() => accounts,
                _ => continue,
            };

            let (account, category, stake) = {
                let mut rng = rand::thread_rng();
                let account = accounts[rng.gen_range(0..accounts.len())].id.clone();
                let category = BetCategory::ALL[rng.gen_range(0..BetCategory::ALL.len())];
                let stake = Decimal::from(rng.gen_range(1..=20u32) * 5);
                (account, category, stake)
            };

            let decision = wagers.place(&group.id, &account, category, stake).await;
            if let Some(reason) = decision.reason() {
                info!(group_id = %group.id, account_id = %account, "Simulated wager rejected: {}", reason);
            }
        }
    }
}

fn seed(
    config: QuickThreeConfig,
    chat_id: i64,
    title: String,
    accounts: u32,
    balance: Decimal,
    cycle: Option<u32>,
) -> QuickThreeResult<()> {
    let cycle = cycle.unwrap_or(config.game.default_draw_cycle_minutes);
    if cycle == 0 || cycle > MAX_DRAW_CYCLE_MINUTES {
        return Err(ValidationError::DrawCycleOutOfRange(cycle).into());
    }

    let storage = OptimizedStorage::open(&config.storage.data_directory, &config.storage)?;
    let store = LedgerStore::new(Arc::new(storage));

    let mut group = Group::new(ChatId(chat_id), title, cycle);
    group.gameplay_enabled = true;

    let mut tx = store.begin();
    tx.put_group(&group)?;
    tx.put_odds(&OddsConfig {
        group_id: group.id.clone(),
        simple_odds: config.game.default_simple_odds,
        triplet_odds: config.game.default_triplet_odds,
    })?;

    let mut created = Vec::new();
    for n in 0..accounts {
        let mut account = Account::new(group.id.clone(), 10_000 + i64::from(n), format!("member{}", n + 1));
        account.balance = balance;
        tx.put_account(&account)?;
        created.push(account);
    }
    tx.commit()?;

    println!("Group {} ({}) created, draw every {} minute(s)", group.id, group.title, group.draw_cycle_minutes);
    for account in created {
        println!("  account {} {} balance {}", account.id, account.username, account.balance);
    }
    Ok(())
}

fn inspect(config: QuickThreeConfig, group_id: GroupId, limit: usize) -> QuickThreeResult<()> {
    let storage = OptimizedStorage::open(&config.storage.data_directory, &config.storage)?;
    let store = LedgerStore::new(Arc::new(storage));

    let Some(group) = store.group(&group_id)? else {
        println!("Group {} not found", group_id);
        return Ok(());
    };
    println!(
        "Group {} '{}' status {:?}, gameplay {}, cycle {} min",
        group.id,
        group.title,
        group.status,
        if group.gameplay_enabled { "on" } else { "off" },
        group.draw_cycle_minutes
    );

    println!("Recent draws:");
    for draw in store.recent_draws(&group_id, limit)? {
        println!("  {}", quickthree::draw::result_message(&draw));
    }

    println!("Accounts:");
    for account in store.accounts_in_group(&group_id)? {
        println!("  {} {} balance {}", account.id, account.username, account.balance);
        for wager in store.recent_wagers(&account.id, limit)? {
            let result = wager
                .result
                .map(|r| format!("{:?} {}", r.outcome, r.amount))
                .unwrap_or_else(|| "unsettled".to_string());
            println!("    issue {} {} {} -> {}", wager.issue, wager.category, wager.stake, result);
        }
    }
    Ok(())
}
