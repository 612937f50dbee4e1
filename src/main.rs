//! Binary entrypoint for the mcadmin CLI.
//!
//! Commands:
//! - `init` - write a starter `config.toml` and create the data directory
//! - `status` - summarize stored players, jails and enabled modules
//! - `inspect <uuid>` - print a stored player document as JSON
//! - `console` - interactive dispatcher session against an in-memory server
//!
//! See the library crate docs for module-level details: `mcadmin::`.
use std::sync::Arc;

use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand};
use log::info;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use uuid::Uuid;

use mcadmin::command::{CommandDispatcher, DeferredOutcome, Outcome, Warning};
use mcadmin::config::Config;
use mcadmin::host::memory::MemoryHost;
use mcadmin::host::GameServer;
use mcadmin::metrics;
use mcadmin::modules::{builtin_registry, MODULES};
use mcadmin::storage::{JailRegistry, PlayerStoreBuilder};
use mcadmin::types::{Caller, PlayerId, Rotation};

#[derive(Parser)]
#[command(name = "mcadmin")]
#[command(about = "Command pipeline and player state for game server administration")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path (can be used before or after subcommand)
    #[arg(short, long, default_value = "config.toml", global = true)]
    config: String,

    /// Verbose logging (-v, -vv for more; may appear before or after subcommand)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default configuration file
    Init,
    /// Show stored players, jails and module status
    Status,
    /// Print one player's stored document
    Inspect {
        /// Player UUID
        player: String,
    },
    /// Run commands interactively against an in-memory server
    Console,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Init => {
            init_logging(&None, cli.verbose);
            Config::create_default(&cli.config).await?;
            let config = Config::default();
            tokio::fs::create_dir_all(&config.storage.data_dir).await?;
            info!("Configuration file created at {}", cli.config);
        }
        Commands::Status => {
            let config = load_config(&cli.config, cli.verbose).await?;
            show_status(&config)?;
        }
        Commands::Inspect { player } => {
            let config = load_config(&cli.config, cli.verbose).await?;
            let uuid = Uuid::parse_str(player.trim()).map_err(|e| anyhow!("invalid player id '{}': {}", player, e))?;
            let id = PlayerId(uuid);
            let store = PlayerStoreBuilder::new(&config.storage.data_dir).open()?;
            if !store.exists(id) {
                println!("No stored document for {}", id);
                return Ok(());
            }
            let doc = store.get(id)?;
            println!("{}", serde_json::to_string_pretty(&doc)?);
        }
        Commands::Console => {
            let config = load_config(&cli.config, cli.verbose).await?;
            run_console(config).await?;
        }
    }

    Ok(())
}

async fn load_config(path: &str, verbosity: u8) -> Result<Config> {
    let config = Config::load(path).await?;
    init_logging(&Some(config.clone()), verbosity);
    Ok(config)
}

fn show_status(config: &Config) -> Result<()> {
    let store = PlayerStoreBuilder::new(&config.storage.data_dir).open()?;
    let jails = JailRegistry::open(store.root())?;
    println!("mcadmin v{}", env!("CARGO_PKG_VERSION"));
    println!("data directory: {}", store.root().display());
    println!("stored players: {}", store.stored_ids()?.len());
    let names = jails.names();
    if names.is_empty() {
        println!("jails: (none)");
    } else {
        println!("jails: {}", names.join(", "));
    }
    for module in MODULES {
        let state = if config.modules.is_enabled(module) { "enabled" } else { "disabled" };
        println!("module {:<8} {}", module, state);
    }
    if !config.commands.is_empty() {
        println!("command overrides: {}", config.commands.len());
    }
    Ok(())
}

const CONSOLE_HELP: &str = "\
  /<command> [args]          run as the console
  @<player> /<command> ...   run as a player (joins them first if needed)
  join <player> | leave <player>
  grant <player> <node> | revoke <player> <node>
  balance <player> <amount>
  move <player>              nudge a player (cancels warmups)
  stats | help | exit";

async fn run_console(config: Config) -> Result<()> {
    let host = Arc::new(MemoryHost::new());
    let store = Arc::new(PlayerStoreBuilder::new(&config.storage.data_dir).open()?);
    let (tx, mut rx) = mpsc::unbounded_channel::<DeferredOutcome>();
    let console = Caller::console(config.server.console_name.clone());
    let dispatcher = CommandDispatcher::builder(builtin_registry()?, store, host.clone(), host.clone())
        .config(config)
        .economy(host.clone())
        .deferred(tx)
        .build()?;

    tokio::spawn(async move {
        while let Some(done) = rx.recv().await {
            println!("[{} /{}] {}", done.caller.name, done.command, done.outcome);
        }
    });

    println!("{}", CONSOLE_HELP);
    let mut seen_messages = 0usize;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await? {
        let line = line.trim();
        let mut words = line.split_whitespace();
        match words.next() {
            None => continue,
            Some("exit") | Some("quit") => break,
            Some("help") => println!("{}", CONSOLE_HELP),
            Some("stats") => {
                let s = metrics::snapshot();
                println!(
                    "dispatched={} succeeded={} failed={} denied={} warmups={} persistence_failures={}",
                    s.dispatched, s.succeeded, s.failed, s.denied, s.warmups_started, s.persistence_failures
                );
                let ledger = dispatcher.ledger_stats();
                println!(
                    "ledger: callers={} pending_warmups={} cooldowns={}",
                    ledger.tracked_callers, ledger.pending_warmups, ledger.active_cooldowns
                );
            }
            Some("join") => {
                if let Some(name) = words.next() {
                    join(&host, &dispatcher, name);
                }
            }
            Some("leave") => {
                if let Some(p) = words.next().and_then(|n| host.find_online(n)) {
                    dispatcher.on_disconnect(p.id)?;
                    host.set_online(p.id, false);
                    println!("{} left", p.name);
                }
            }
            Some(op @ ("grant" | "revoke")) => match (words.next().and_then(|n| host.find_user(n)), words.next()) {
                (Some(p), Some(node)) if op == "grant" => host.grant(p.id, node),
                (Some(p), Some(node)) => host.revoke(p.id, node),
                _ => println!("usage: {} <player> <node>", op),
            },
            Some("balance") => match (
                words.next().and_then(|n| host.find_user(n)),
                words.next().and_then(|a| a.parse::<f64>().ok()),
            ) {
                (Some(p), Some(amount)) => host.set_balance(p.id, amount),
                _ => println!("usage: balance <player> <amount>"),
            },
            Some("move") => {
                if let Some(p) = words.next().and_then(|n| host.find_online(n)) {
                    if let Some((at, rotation)) = host.player_location(p.id) {
                        host.move_player(p.id, at.offset(1.0, 0.0, 0.0), rotation);
                    }
                    let cancelled = dispatcher.on_player_moved(p.id);
                    println!("{} moved ({} warmup(s) cancelled)", p.name, cancelled);
                }
            }
            Some(first) if first.starts_with('@') => {
                let id = join(&host, &dispatcher, &first[1..]);
                let rest = line[first.len()..].trim();
                let caller = Caller::player(id, first[1..].to_string());
                print_outcome(&dispatcher.dispatch(&caller, rest).await);
            }
            Some(_) => print_outcome(&dispatcher.dispatch(&console, line).await),
        }

        let messages = host.messages();
        for (to, message) in messages.iter().skip(seen_messages) {
            match to {
                Some(id) => println!("  -> {}: {}", id, message),
                None => println!("  -> console: {}", message),
            }
        }
        seen_messages = messages.len();
    }

    let saved = dispatcher.shutdown().await?;
    info!("console closed, saved {} player document(s)", saved);
    Ok(())
}

/// Bring `name` online, creating the player on first use.
fn join(host: &MemoryHost, dispatcher: &CommandDispatcher, name: &str) -> PlayerId {
    if let Some(p) = host.find_online(name) {
        return p.id;
    }
    let id = match host.find_user(name) {
        Some(p) => {
            host.set_online(p.id, true);
            p.id
        }
        None => host.add_player(name, true),
    };
    host.move_player(id, host.default_spawn(), Rotation::default());
    match dispatcher.on_join(id) {
        Ok(_) => println!("{} joined as {}", name, id),
        Err(e) => println!("{} joined but login handling failed: {}", name, e),
    }
    id
}

fn print_outcome(outcome: &Outcome) {
    println!("{}", outcome);
    if let Some(report) = outcome.report() {
        for warning in &report.warnings {
            match warning {
                Warning::PersistenceFailed(e) => println!("  warning: could not save ({})", e),
            }
        }
    }
}

fn init_logging(config: &Option<Config>, verbosity: u8) {
    use std::io::Write;
    let mut builder = env_logger::Builder::new();
    // CLI verbosity overrides the configured level
    let base_level = match verbosity {
        0 => config
            .as_ref()
            .and_then(|c| c.logging.level.parse().ok())
            .unwrap_or(log::LevelFilter::Info),
        1 => log::LevelFilter::Debug,
        _ => log::LevelFilter::Trace,
    };
    builder.filter_level(base_level);

    let Some(cfg) = config else {
        builder.format(|fmt, record| {
            let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
            writeln!(fmt, "{} [{}] {}", ts, record.level(), record.args())
        });
        let _ = builder.try_init();
        return;
    };

    let security_path = cfg.logging.security_file.clone();
    let file = cfg.logging.file.as_ref().and_then(|path| {
        std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .ok()
    });
    let file = file.map(|f| std::sync::Arc::new(std::sync::Mutex::new(f)));
    // Foreground sessions also echo to the terminal
    let is_tty = atty::is(atty::Stream::Stdout);

    builder.format(move |fmt, record| {
        let ts = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
        let line = format!("{} [{}] {}", ts, record.level(), record.args());

        if let Some(file) = &file {
            if let Ok(mut guard) = file.lock() {
                let _ = writeln!(guard, "{}", line);
            }
        }

        if record.target() == mcadmin::logutil::SECURITY_TARGET {
            if let Some(ref sec_path) = security_path {
                if let Ok(mut sf) = std::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(sec_path)
                {
                    let _ = writeln!(sf, "{}", line);
                }
            }
        }

        if file.is_none() || is_tty {
            writeln!(fmt, "{}", line)
        } else {
            Ok(())
        }
    });
    let _ = builder.try_init();
}
