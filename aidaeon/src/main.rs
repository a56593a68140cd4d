//! aidaeon - AidaEon administrative CLI
//!
//! Runs data-access handlers against the local store and prints dashboard
//! summaries.

use aidaeon_core::api::{Request, HANDLERS};
use aidaeon_core::db::schema::INDEX_CATALOG;
use aidaeon_core::{
    AssistantStats, Config, ConversationStats, Database, MessageStats, TimeRange, UserStats,
};
use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "aidaeon")]
#[command(about = "Query and administer the AidaEon data store")]
#[command(version)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run a handler, e.g. `aidaeon call users:create --args '{"email": ...}'`
    Call {
        /// Handler name in `<collection>:<operation>` form
        handler: String,

        /// Handler arguments as a JSON object
        #[arg(short, long, default_value = "{}")]
        args: String,
    },

    /// Print the dashboard summary (users, assistants, conversations, messages)
    Stats {
        /// Output format: text (default) or json
        #[arg(short, long, default_value = "text")]
        format: String,

        /// Time window for conversation and message counts: today, week, month, all
        #[arg(short, long, default_value = "all")]
        time_range: TimeRange,
    },

    /// Show database location, schema version and collection sizes
    Info,
}

fn main() -> Result<()> {
    let args = Args::parse();

    Config::ensure_xdg_env();

    // Load configuration
    let config = Config::load().context("failed to load configuration")?;

    // Initialize logging
    let _log_guard =
        aidaeon_core::logging::init(&config.logging).context("failed to initialize logging")?;

    // Open database
    let db_path = config.resolved_database_path();
    tracing::info!(path = %db_path.display(), "Opening database");
    let db = Database::from_config(&config).context("failed to open database")?;
    db.migrate().context("failed to run database migrations")?;

    match args.command {
        Command::Call { handler, args } => run_call(&db, &handler, &args),
        Command::Stats { format, time_range } => run_stats(&db, &format, time_range),
        Command::Info => run_info(&db, &config),
    }
}

fn run_call(db: &Database, handler: &str, raw_args: &str) -> Result<()> {
    let args: Value = serde_json::from_str(raw_args)
        .with_context(|| format!("--args is not valid JSON: {}", raw_args))?;

    if !HANDLERS.contains(&handler) {
        anyhow::bail!(
            "unknown handler '{}'. Run `aidaeon info` to list handlers",
            handler
        );
    }

    let request = Request::parse(handler, args)?;
    let result = db
        .dispatch(request)
        .with_context(|| format!("{} failed", handler))?;

    tracing::info!(handler, "Handler call complete");
    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}

struct Dashboard {
    users: UserStats,
    assistants: AssistantStats,
    conversations: ConversationStats,
    messages: MessageStats,
}

fn run_stats(db: &Database, format: &str, time_range: TimeRange) -> Result<()> {
    let dashboard = Dashboard {
        users: db.user_stats().context("failed to compute user stats")?,
        assistants: db
            .assistant_stats()
            .context("failed to compute assistant stats")?,
        conversations: db
            .conversation_stats(None, time_range)
            .context("failed to compute conversation stats")?,
        messages: db
            .message_stats(None, None, time_range)
            .context("failed to compute message stats")?,
    };

    if format == "json" {
        let value = json!({
            "timeRange": time_range,
            "users": dashboard.users,
            "assistants": dashboard.assistants,
            "conversations": dashboard.conversations,
            "messages": dashboard.messages,
        });
        println!("{}", serde_json::to_string_pretty(&value)?);
        return Ok(());
    }

    print_dashboard(&dashboard, time_range);
    Ok(())
}

fn print_dashboard(dashboard: &Dashboard, time_range: TimeRange) {
    let Dashboard {
        users,
        assistants,
        conversations,
        messages,
    } = dashboard;

    println!(
        "AidaEon dashboard ({}, generated {})",
        time_range,
        chrono::Local::now().format("%Y-%m-%d %H:%M")
    );
    println!();

    println!("Users: {}", users.total);
    println!(
        "  active {}  inactive {}  suspended {}  recent logins {}",
        users.active, users.inactive, users.suspended, users.recent_logins
    );
    println!(
        "  admin {}  user {}  agent {}",
        users.by_role.admin, users.by_role.user, users.by_role.agent
    );
    println!();

    println!("Assistants: {}", assistants.total);
    println!(
        "  active {}  inactive {}  training {}",
        assistants.active, assistants.inactive, assistants.training
    );
    println!(
        "  conversations {}  messages {}  success rate {:.1}%  response time {:.0}ms",
        assistants.total_conversations,
        assistants.total_messages,
        assistants.average_success_rate,
        assistants.average_response_time
    );
    println!();

    println!("Conversations: {}", conversations.total);
    println!(
        "  active {}  completed {}  abandoned {}  transferred {}  resolved {}",
        conversations.active,
        conversations.completed,
        conversations.abandoned,
        conversations.transferred,
        conversations.resolved
    );
    println!(
        "  whatsapp {}  telegram {}  webchat {}  api {}",
        conversations.by_platform.whatsapp,
        conversations.by_platform.telegram,
        conversations.by_platform.webchat,
        conversations.by_platform.api
    );
    println!(
        "  average duration {}",
        format_duration_ms(conversations.average_duration)
    );
    println!();

    println!("Messages: {}", messages.total);
    println!(
        "  user {}  assistant {}  system {}",
        messages.by_sender.user, messages.by_sender.assistant, messages.by_sender.system
    );
    println!(
        "  sent {}  delivered {}  read {}  failed {}",
        messages.by_status.sent,
        messages.by_status.delivered,
        messages.by_status.read,
        messages.by_status.failed
    );
    if !messages.by_type.is_empty() {
        let by_type: Vec<String> = messages
            .by_type
            .iter()
            .map(|(kind, count)| format!("{} {}", kind, count))
            .collect();
        println!("  {}", by_type.join("  "));
    }
    println!(
        "  average response time {}",
        format_duration_ms(messages.average_response_time)
    );
}

fn format_duration_ms(ms: f64) -> String {
    let secs = (ms / 1000.0).round() as i64;
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

fn run_info(db: &Database, config: &Config) -> Result<()> {
    println!("Database:      {}", config.resolved_database_path().display());
    println!("Schema:        v{}", db.schema_version()?);
    println!("Counter mode:  {:?}", db.counter_mode());
    println!("Log file:      {}", aidaeon_core::logging::log_file_path().display());
    println!();

    println!("Collections:");
    for (name, count) in db
        .collection_counts()
        .context("failed to count documents")?
    {
        let indexes: Vec<&str> = INDEX_CATALOG
            .iter()
            .filter(|idx| idx.collection == name)
            .map(|idx| idx.name)
            .collect();
        println!("  {:<16} {:>6}  [{}]", name, count, indexes.join(", "));
    }
    println!();

    println!("Handlers:");
    for handler in HANDLERS {
        println!("  {}", handler);
    }
    Ok(())
}
