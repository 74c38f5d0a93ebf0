use anyhow::{bail, Context, Result};
use chrono::{Duration as ChronoDuration, Utc};
use clap::{Parser, Subcommand};
use log::{error, info, LevelFilter};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use vitals::ai::HealthAnalyzer;
use vitals::alerts::{DesktopSink, Notifier};
use vitals::chat::ChatService;
use vitals::config::Config;
use vitals::providers::fetch_window;
use vitals::samples::TimeRange;
use vitals::scheduler::{local_now, HealthCheckScheduler, WINDOW_HOURS};
use vitals::score::HealthScore;
use vitals::serializer::ToonSerializer;
use vitals::store::Database;

/// Command-line arguments for the health check assistant
#[derive(Parser, Debug)]
#[command(
    name = "vitals",
    about = "Personal health assistant - periodic AI health checks and chat",
    long_about = "Reads the last 24 hours of health data on a schedule, asks a language model \
                  whether anything is worth telling you, and shows the answer as a desktop \
                  notification. Also keeps a local chat with the assistant."
)]
struct Cli {
    /// Path to configuration file
    #[arg(
        short,
        long,
        value_name = "FILE",
        help = "Configuration file path (TOML format)"
    )]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, help = "Enable verbose logging output (debug level)")]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug, PartialEq)]
enum Command {
    /// Run health checks periodically until interrupted
    Run,
    /// Run a single health check now
    Check {
        /// Ignore the enabled flag and the allowed hours
        #[arg(long)]
        force: bool,
    },
    /// Inspect or prune notification history
    #[command(subcommand)]
    History(HistoryCommand),
    /// Show or change notification settings
    #[command(subcommand)]
    Settings(SettingsCommand),
    /// Chat with the health assistant
    #[command(subcommand)]
    Chat(ChatCommand),
    /// Print the serialized last-24h window and its score
    Window,
}

#[derive(Subcommand, Debug, PartialEq)]
enum HistoryCommand {
    List {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    Delete {
        id: i64,
    },
    Clear {
        /// Only remove entries older than this many days
        #[arg(long, value_name = "DAYS")]
        older_than_days: Option<i64>,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
enum SettingsCommand {
    Show,
    Set {
        #[arg(long)]
        enabled: Option<bool>,
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..24))]
        start_hour: Option<u8>,
        #[arg(long, value_parser = clap::value_parser!(u8).range(0..24))]
        end_hour: Option<u8>,
        #[arg(long)]
        allow_overnight: Option<bool>,
        /// Check interval in minutes (values below 15 run every 15)
        #[arg(long, value_name = "MINUTES")]
        interval: Option<u32>,
    },
}

#[derive(Subcommand, Debug, PartialEq)]
enum ChatCommand {
    New {
        title: Option<String>,
    },
    List,
    Show {
        id: String,
    },
    Send {
        id: String,
        text: String,
    },
    Delete {
        id: String,
    },
}

impl Cli {
    /// Validate the CLI arguments
    fn validate(&self) -> Result<(), String> {
        if let Some(ref config_path) = self.config {
            // Missing files fall back to defaults in Config::load
            if config_path.exists() && !config_path.is_file() {
                return Err(format!(
                    "Configuration path is not a file: {}",
                    config_path.display()
                ));
            }
        }

        Ok(())
    }
}

fn init_logging(verbose: bool, config: &Config) {
    let mut builder = env_logger::Builder::from_env(
        env_logger::Env::default().default_filter_or(config.logging.level.as_str()),
    );
    if verbose {
        builder.filter_level(LevelFilter::Debug);
    }
    builder.init();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = cli.validate() {
        bail!("Invalid arguments: {}", e);
    }

    let (config, source) =
        Config::load(cli.config.as_deref()).context("Failed to load configuration")?;
    init_logging(cli.verbose, &config);
    source.report();

    let db = Database::open(&config.database.path).with_context(|| {
        format!(
            "Failed to open database at {}",
            config.database.path.display()
        )
    })?;
    db.seed_notification_settings(&config.notifications)?;

    match cli.command {
        Command::Run => run_daemon(&config, db).await,
        Command::Check { force } => {
            let scheduler = build_scheduler(&config, db)?;
            let outcome = scheduler.run_once(force).await;
            println!("{}", outcome);
            Ok(())
        }
        Command::History(command) => history_command(&db, command),
        Command::Settings(command) => settings_command(&db, command),
        Command::Chat(command) => chat_command(&config, db, command).await,
        Command::Window => print_window(&config).await,
    }
}

fn build_scheduler(config: &Config, db: Database) -> Result<HealthCheckScheduler> {
    let analyzer = HealthAnalyzer::new(config.build_backend()?, config.profile.clone());
    let notifier = Notifier::new(Arc::new(DesktopSink), db.clone());
    Ok(HealthCheckScheduler::new(
        db,
        config.build_provider(),
        analyzer,
        notifier,
    ))
}

async fn run_daemon(config: &Config, db: Database) -> Result<()> {
    let scheduler = build_scheduler(config, db)?;

    let (shutdown_sender, shutdown_receiver) = watch::channel(false);
    ctrlc::set_handler(move || {
        info!("Received interrupt signal (SIGINT), shutting down gracefully...");
        if let Err(e) = shutdown_sender.send(true) {
            error!("Failed to send shutdown signal: {}", e);
        }
    })
    .context("Error setting SIGINT handler for graceful shutdown")?;

    info!("Health checks are running. Press Ctrl+C to stop.");
    scheduler.run(shutdown_receiver).await;
    Ok(())
}

fn history_command(db: &Database, command: HistoryCommand) -> Result<()> {
    match command {
        HistoryCommand::List { limit } => {
            let entries = db.notification_history(limit)?;
            if entries.is_empty() {
                println!("No notifications yet");
            }
            for entry in entries {
                println!(
                    "{:>5}  {}  [{}]  {}",
                    entry.id,
                    entry.timestamp.format("%Y-%m-%d %H:%M"),
                    entry.category.as_deref().unwrap_or("-"),
                    entry.message
                );
            }
        }
        HistoryCommand::Delete { id } => {
            if !db.delete_notification(id)? {
                bail!("No notification with id {}", id);
            }
            println!("Deleted notification {}", id);
        }
        HistoryCommand::Clear { older_than_days } => {
            let removed = match older_than_days {
                Some(days) if days < 0 => bail!("--older-than-days must not be negative"),
                Some(days) => {
                    let cutoff = ChronoDuration::try_days(days)
                        .and_then(|age| Utc::now().checked_sub_signed(age));
                    match cutoff {
                        Some(cutoff) => db.delete_notifications_older_than(cutoff)?,
                        None => bail!("--older-than-days {} is out of range", days),
                    }
                }
                None => db.clear_notification_history()?,
            };
            println!("Removed {} notifications", removed);
        }
    }
    Ok(())
}

fn settings_command(db: &Database, command: SettingsCommand) -> Result<()> {
    match command {
        SettingsCommand::Show => {}
        SettingsCommand::Set {
            enabled,
            start_hour,
            end_hour,
            allow_overnight,
            interval,
        } => {
            let mut settings = db.notification_settings()?;
            if let Some(enabled) = enabled {
                settings.enabled = enabled;
            }
            if let Some(hour) = start_hour {
                settings.start_hour = hour;
            }
            if let Some(hour) = end_hour {
                settings.end_hour = hour;
            }
            if let Some(allow) = allow_overnight {
                settings.allow_overnight = allow;
            }
            if let Some(minutes) = interval {
                settings.check_interval_minutes = minutes;
            }
            if let Err(e) = settings.validate() {
                bail!("Invalid settings: {}", e);
            }
            db.save_notification_settings(&settings)?;
            info!("Saved notification settings");
        }
    }

    let settings = db.notification_settings()?;
    println!("enabled:          {}", settings.enabled);
    println!("start_hour:       {}", settings.start_hour);
    println!("end_hour:         {}", settings.end_hour);
    println!("allow_overnight:  {}", settings.allow_overnight);
    println!(
        "interval:         {} min (effective {} min)",
        settings.check_interval_minutes,
        settings.effective_interval_minutes()
    );
    Ok(())
}

async fn chat_command(config: &Config, db: Database, command: ChatCommand) -> Result<()> {
    let chat = ChatService::new(db, config.build_backend()?, config.profile.clone());

    match command {
        ChatCommand::New { title } => {
            let session = chat.create_session(title.as_deref().unwrap_or(""))?;
            println!("{}", session.id);
        }
        ChatCommand::List => {
            for session in chat.list_sessions()? {
                let title = if session.title.is_empty() {
                    "(untitled)"
                } else {
                    session.title.as_str()
                };
                println!(
                    "{}  {}  {}",
                    session.id,
                    session.updated_at.format("%Y-%m-%d %H:%M"),
                    title
                );
            }
        }
        ChatCommand::Show { id } => {
            for message in chat.messages(&id)? {
                println!("{}: {}", message.role, message.content);
            }
        }
        ChatCommand::Send { id, text } => {
            let reply = chat.send_message(&id, &text).await?;
            println!("{}", reply.content);
        }
        ChatCommand::Delete { id } => {
            chat.delete_session(&id)?;
            println!("Deleted chat session {}", id);
        }
    }
    Ok(())
}

async fn print_window(config: &Config) -> Result<()> {
    let now = local_now();
    let provider = config.build_provider();
    let range = TimeRange::last_hours(now.with_timezone(&Utc), WINDOW_HOURS);
    let window = fetch_window(provider.as_ref(), range).await?;

    println!("{}", ToonSerializer::new(*now.offset()).serialize(&window));
    println!();
    println!("score: {}", HealthScore::compute(&window));
    Ok(())
}
