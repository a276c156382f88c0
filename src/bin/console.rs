//! OpenConsole CLI
//!
//! Talks to the gateway from a terminal: health checks, tool calls, the
//! session board, the live event stream and the notification inbox.

use std::path::PathBuf;

use anyhow::{bail, Context};
use chrono::Utc;
use clap::{Parser, Subcommand};
use console::style;
use secrecy::ExposeSecret;
use tracing_subscriber::EnvFilter;

use openconsole::activity::summarize;
use openconsole::config::{
    apply_env_overrides, config_path, load_config, load_config_from_path, save_config,
    validate_config, Config, LogConfig, LogFormat,
};
use openconsole::core::StateStore;
use openconsole::format::{format_tokens, relative_time, truncate};
use openconsole::gateway::{ConnectionState, EventFilter, GatewayEvent, ToolResultBody};
use openconsole::notify::{NewNotification, NotificationKind};
use openconsole::palette::{Execution, OPEN_SHORTCUT, OPEN_SHORTCUT_MAC};
use openconsole::prefs::ConnectionSettings;
use openconsole::service::open_state;
use openconsole::sessions::SessionStatus;
use openconsole::{Console, VERSION};

#[derive(Parser)]
#[command(
    name = "openconsole",
    version = VERSION,
    about = "OpenConsole - operator console for an agent gateway",
    long_about = None
)]
struct Cli {
    /// Config file (defaults to the config directory)
    #[arg(long, global = true, env = "OPENCONSOLE_CONFIG")]
    config: Option<PathBuf>,

    /// Gateway URL, overriding config
    #[arg(long, global = true)]
    gateway_url: Option<String>,

    /// Keep state in memory only
    #[arg(long, global = true)]
    ephemeral: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Probe the gateway's health endpoint
    Health,

    /// Invoke a gateway tool
    Invoke {
        /// Tool name (e.g. sessions_list)
        tool: String,
        /// Arguments as a JSON object
        #[arg(long, default_value = "{}")]
        args: String,
    },

    /// List sessions with inferred status
    Sessions {
        /// Maximum sessions to fetch
        #[arg(short, long)]
        limit: Option<u32>,
    },

    /// Stream gateway events until interrupted
    Watch,

    /// Manage the notification inbox
    Notifications {
        #[command(subcommand)]
        action: Option<NotificationAction>,
    },

    /// Search or run palette commands
    Palette {
        /// Fuzzy query
        query: Option<String>,
        /// Run the command with this id
        #[arg(long)]
        run: Option<String>,
    },

    /// Save gateway URL and token for later runs
    Login {
        /// Gateway URL
        #[arg(long)]
        url: String,
        /// Bearer token
        #[arg(long, env = "OPENCONSOLE_TOKEN")]
        token: String,
    },

    /// Forget saved connection settings
    Logout,

    /// Inspect configuration
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
enum NotificationAction {
    /// List notifications (default)
    List,
    /// Mark one notification read
    Read { id: String },
    /// Mark all notifications read
    ReadAll,
    /// Remove one notification
    Remove { id: String },
    /// Remove all notifications
    Clear,
    /// Add a system notification
    Add {
        title: String,
        #[arg(long)]
        body: Option<String>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the effective configuration (token omitted)
    Show,
    /// Print the config file path
    Path,
    /// Validate the effective configuration
    Validate,
    /// Write a default config file
    Init {
        /// Overwrite an existing file
        #[arg(long, short)]
        force: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = match cli.config {
        Some(ref path) => {
            let mut config = load_config_from_path(path)?;
            apply_env_overrides(&mut config);
            config
        }
        None => load_config()?,
    };
    if let Some(ref url) = cli.gateway_url {
        config.gateway.url = url.clone();
    }
    init_tracing(&config.log);

    let storage = if cli.ephemeral {
        StateStore::in_memory()
    } else {
        open_state().context("Failed to open state directory")?
    };

    match cli.command {
        Commands::Health => health(config, storage).await,
        Commands::Invoke { tool, args } => invoke(config, storage, &tool, &args).await,
        Commands::Sessions { limit } => sessions(config, storage, limit).await,
        Commands::Watch => watch(config, storage).await,
        Commands::Notifications { action } => {
            notifications(config, storage, action.unwrap_or(NotificationAction::List))
        }
        Commands::Palette { query, run } => palette(config, storage, query, run).await,
        Commands::Login { url, token } => login(&storage, url, token),
        Commands::Logout => {
            ConnectionSettings::forget(&storage)?;
            println!("{} Saved connection settings removed", style("✓").green());
            Ok(())
        }
        Commands::Config { action } => config_command(config, cli.config, action),
    }
}

fn init_tracing(log: &LogConfig) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr);
    match log.format {
        LogFormat::Json => builder.json().init(),
        LogFormat::Pretty => builder.init(),
    }
}

// ============================================================================
// Gateway commands
// ============================================================================

async fn health(config: Config, storage: StateStore) -> anyhow::Result<()> {
    let console = Console::open(config, storage)?;
    let url = console.tools().base_url().to_string();

    match console.tools().health().await {
        Ok(status) if status.ok => {
            println!(
                "{} {} is healthy ({} ms)",
                style("✓").green(),
                url,
                status.latency.as_millis()
            );
            Ok(())
        }
        Ok(status) => bail!("{} answered HTTP {}", url, status.status),
        Err(e) => bail!("{} is unreachable: {}", url, e),
    }
}

async fn invoke(config: Config, storage: StateStore, tool: &str, args: &str) -> anyhow::Result<()> {
    let args: serde_json::Value =
        serde_json::from_str(args).context("--args must be a JSON object")?;
    if !args.is_object() {
        bail!("--args must be a JSON object");
    }

    let console = Console::open(config, storage)?;
    let result = console.tools().invoke(tool, args).await?;

    println!("{}", render_result(&result)?);
    Ok(())
}

/// Structured output pretty-printed, otherwise the text parts
fn render_result(result: &ToolResultBody) -> anyhow::Result<String> {
    Ok(match result.structured() {
        Some(value) => serde_json::to_string_pretty(&value)?,
        None => result
            .text()
            .unwrap_or_else(|| style("(no output)").dim().to_string()),
    })
}

async fn sessions(config: Config, storage: StateStore, limit: Option<u32>) -> anyhow::Result<()> {
    let limit = limit.unwrap_or(config.polling.limit);
    let console = Console::open(config, storage)?;

    let fetched = console.tools().list_sessions(limit).await?;
    console.board().apply_poll(fetched);

    let now = Utc::now();
    let rows = console.board().rows(now);
    if rows.is_empty() {
        println!("No sessions");
        return Ok(());
    }

    println!(
        "{}",
        style(format!(
            "{:<36} {:<10} {:>8} {:<20} {}",
            "SESSION", "STATUS", "TOKENS", "MODEL", "UPDATED"
        ))
        .bold()
    );
    for row in rows {
        let s = &row.session;
        let updated = s
            .updated_at
            .map(|t| relative_time(t, now))
            .unwrap_or_else(|| "-".to_string());
        println!(
            "{:<36} {:<10} {:>8} {:<20} {}",
            truncate(s.display_name(), 36),
            status_label(row.status),
            format_tokens(s.total_tokens),
            truncate(s.model.as_deref().unwrap_or("-"), 20),
            updated
        );
    }
    Ok(())
}

fn status_label(status: SessionStatus) -> String {
    let text = format!("{:<10}", status.as_str());
    match status {
        SessionStatus::Running => style(text).green().to_string(),
        SessionStatus::Idle | SessionStatus::Waiting => style(text).yellow().to_string(),
        SessionStatus::Failed => style(text).red().to_string(),
        SessionStatus::Sleeping | SessionStatus::Completed => style(text).dim().to_string(),
    }
}

async fn watch(config: Config, storage: StateStore) -> anyhow::Result<()> {
    let console = Console::open(config, storage)?;

    console.client().on(EventFilter::Wildcard, |event| match event {
        GatewayEvent::ConnectionState(state) => {
            let label = match state {
                ConnectionState::Connected => style(state.as_str()).green(),
                ConnectionState::Disconnected => style(state.as_str()).red(),
                _ => style(state.as_str()).yellow(),
            };
            println!("{} gateway {}", style("●").dim(), label);
        }
        other => {
            println!(
                "{} {:<18} {}",
                style(Utc::now().format("%H:%M:%S")).dim(),
                style(other.name()).cyan(),
                summarize(other)
            );
        }
    });

    console.start()?;
    println!(
        "Watching {} (Ctrl+C to stop)",
        style(console.client().url()).bold()
    );

    tokio::signal::ctrl_c().await?;
    console.stop().await;

    let unread = console.notifications().unread_count();
    if unread > 0 {
        println!("{} unread notification(s)", unread);
    }
    Ok(())
}

// ============================================================================
// Local state commands
// ============================================================================

fn notifications(
    config: Config,
    storage: StateStore,
    action: NotificationAction,
) -> anyhow::Result<()> {
    let console = Console::new(config, storage)?;
    let store = console.notifications();

    match action {
        NotificationAction::List => {
            let items = store.snapshot();
            if items.is_empty() {
                println!("No notifications");
                return Ok(());
            }
            let now = Utc::now();
            for n in items.iter() {
                let marker = if n.read {
                    style("○").dim()
                } else {
                    style("●").cyan()
                };
                println!(
                    "{} {} {:<18} {} {}",
                    marker,
                    style(&n.id[..8.min(n.id.len())]).dim(),
                    n.kind.as_str(),
                    n.title,
                    style(relative_time(n.timestamp, now)).dim()
                );
                if let Some(ref body) = n.body {
                    println!("    {}", truncate(body, 100));
                }
            }
            println!("\n{} unread", store.unread_count());
        }
        NotificationAction::Read { id } => {
            let full = resolve_id(store.snapshot().iter().map(|n| n.id.as_str()), &id)?;
            store.mark_read(&full);
        }
        NotificationAction::ReadAll => {
            store.mark_all_read();
        }
        NotificationAction::Remove { id } => {
            let full = resolve_id(store.snapshot().iter().map(|n| n.id.as_str()), &id)?;
            store.remove(&full);
        }
        NotificationAction::Clear => {
            store.clear();
        }
        NotificationAction::Add { title, body } => {
            let mut new = NewNotification::new(NotificationKind::System, title);
            new.body = body;
            let created = store.add(new);
            println!("{}", created.id);
        }
    }
    Ok(())
}

/// Accept a unique id prefix
fn resolve_id<'a>(ids: impl Iterator<Item = &'a str>, prefix: &str) -> anyhow::Result<String> {
    let matches: Vec<&str> = ids.filter(|id| id.starts_with(prefix)).collect();
    match matches.as_slice() {
        [one] => Ok(one.to_string()),
        [] => bail!("No notification matches {}", prefix),
        _ => bail!("{} is ambiguous", prefix),
    }
}

async fn palette(
    config: Config,
    storage: StateStore,
    query: Option<String>,
    run: Option<String>,
) -> anyhow::Result<()> {
    let console = Console::open(config, storage)?;
    let palette = console.palette();

    if let Some(id) = run {
        match palette.execute(&id) {
            Execution::Navigate(view) => println!("→ {}", view),
            Execution::Ran => {
                // Give spawned actions a moment to report back
                tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                println!("{} {}", style("✓").green(), id);
            }
            Execution::Failed => {}
        }
        for toast in console.toasts().snapshot().iter() {
            println!("[{}] {}", toast.kind.as_str(), toast.message);
        }
        return Ok(());
    }

    println!(
        "{}",
        style(format!("Open with {} / {}", OPEN_SHORTCUT, OPEN_SHORTCUT_MAC)).dim()
    );
    for hit in palette.search(query.as_deref().unwrap_or("")) {
        let c = &hit.command;
        let tag = if hit.recent {
            style("recent").magenta().to_string()
        } else {
            style(&c.section).dim().to_string()
        };
        println!("{:<22} {:<32} {}", c.id, c.title, tag);
    }
    Ok(())
}

fn login(storage: &StateStore, url: String, token: String) -> anyhow::Result<()> {
    url::Url::parse(&url).with_context(|| format!("Invalid gateway URL: {}", url))?;
    ConnectionSettings::new(&url, token).save(storage)?;
    println!("{} Saved connection settings for {}", style("✓").green(), url);
    Ok(())
}

fn config_command(
    config: Config,
    explicit_path: Option<PathBuf>,
    action: ConfigAction,
) -> anyhow::Result<()> {
    let path = explicit_path.unwrap_or_else(config_path);

    match action {
        ConfigAction::Show => {
            println!("{}", toml::to_string_pretty(&config)?);
            let token = if config.gateway.token.expose_secret().is_empty() {
                "(not set)"
            } else {
                "(set)"
            };
            println!("# gateway.token {}", token);
        }
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Validate => {
            let result = validate_config(&config);
            for issue in &result.errors {
                println!("{} {}", style("error").red().bold(), issue);
            }
            for issue in &result.warnings {
                println!("{} {}", style("warning").yellow().bold(), issue);
            }
            if !result.valid {
                bail!("Configuration has {} error(s)", result.errors.len());
            }
            println!("{} Configuration is valid", style("✓").green());
        }
        ConfigAction::Init { force } => {
            if path.exists() && !force {
                bail!("{} already exists (use --force to overwrite)", path.display());
            }
            save_config(&Config::default(), &path)?;
            println!("{} Wrote {}", style("✓").green(), path.display());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_render_result_prefers_details() {
        let result = ToolResultBody {
            content: Some(json!([{"type": "text", "text": "2 jobs"}])),
            details: Some(json!({"jobs": 2})),
        };
        assert_eq!(render_result(&result).unwrap(), "{\n  \"jobs\": 2\n}");
    }

    #[test]
    fn test_render_result_falls_back_to_text() {
        let result = ToolResultBody {
            content: Some(json!([{"type": "text", "text": "all good"}])),
            details: None,
        };
        assert_eq!(render_result(&result).unwrap(), "all good");

        let empty = ToolResultBody::default();
        assert!(render_result(&empty).unwrap().contains("(no output)"));
    }
}
