//! Teamtask CLI - command-line front end for the teamtask backend
//!
//! Every data command restores the saved session first and prints its result as a
//! `{data, error}` JSON document.

use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::json;
use std::path::{Path, PathBuf};
use teamtask_api::{ResultEnvelope, TaskInput, TeamInput};
use teamtask_core::{
    config_error, init_logging, ErrorContext, TeamtaskConfig, TeamtaskError, TeamtaskResult,
};
use teamtask_session::SessionManager;
use tracing::{debug, info};

const NOT_SIGNED_IN: &str = "Not signed in. Run 'teamtask login' first.";
const ADMIN_REQUIRED: &str = "Administrator access required";

#[derive(Parser)]
#[command(name = "teamtask")]
#[command(about = "Manage teams and tasks on a teamtask WordPress backend")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the REST API base address
    #[arg(long, global = true)]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in and remember the session
    Login {
        #[arg(short, long)]
        username: String,

        #[arg(short, long, env = "TEAMTASK_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Forget the saved session
    Logout,

    /// Show who is signed in
    Status,

    /// Manage teams (changes require an administrator)
    Teams {
        #[command(subcommand)]
        command: TeamCommands,
    },

    /// Manage tasks
    Tasks {
        #[command(subcommand)]
        command: TaskCommands,
    },

    /// Manage configuration
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
enum TeamCommands {
    List,

    Create {
        #[arg(long)]
        name: String,

        #[arg(long)]
        description: Option<String>,
    },

    Update {
        id: u64,

        #[arg(long)]
        name: Option<String>,

        #[arg(long)]
        description: Option<String>,
    },

    Delete {
        id: u64,
    },
}

#[derive(Subcommand)]
enum TaskCommands {
    List,

    Create {
        #[arg(long)]
        title: String,

        /// Team the task belongs to
        #[arg(long)]
        team_id: String,

        #[arg(long)]
        description: Option<String>,

        #[arg(long, default_value = "medium")]
        priority: String,

        #[arg(long, default_value = "pending")]
        status: String,

        /// Due date, YYYY-MM-DD
        #[arg(long)]
        due_date: Option<String>,
    },

    Update {
        id: u64,

        #[arg(long)]
        title: Option<String>,

        #[arg(long)]
        team_id: Option<String>,

        #[arg(long)]
        description: Option<String>,

        #[arg(long)]
        priority: Option<String>,

        #[arg(long)]
        status: Option<String>,

        #[arg(long)]
        due_date: Option<String>,
    },

    Delete {
        id: u64,
    },

    /// Change only the status of a task
    SetStatus {
        id: u64,

        status: String,
    },
}

#[derive(Subcommand)]
enum ConfigCommands {
    /// Show the effective configuration
    Show,

    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate the effective configuration
    Validate,
}

/// Who may run a data command
#[derive(Clone, Copy)]
enum Access {
    Member,
    Administrator,
}

#[tokio::main]
async fn main() -> TeamtaskResult<()> {
    let cli = Cli::parse();

    // `config` subcommands must still run against a broken file so it can be fixed.
    let validate = !matches!(cli.command, Commands::Config { .. });
    let config = effective_config(cli.config.as_ref(), cli.base_url.as_deref(), validate)?;

    let mut logging_config = config.logging.clone();
    if cli.verbose {
        logging_config.level = "debug".to_string();
    }

    init_logging(&logging_config).map_err(|e| TeamtaskError::Config {
        message: format!("Failed to initialize logging: {}", e),
        source: Some(e),
        context: ErrorContext::new("cli")
            .with_operation("init_logging")
            .with_suggestion("Check logging configuration"),
    })?;

    info!("Starting teamtask CLI v{}", env!("CARGO_PKG_VERSION"));

    match cli.command {
        Commands::Login { username, password } => {
            handle_login(&username, &password, &config).await
        }
        Commands::Logout => handle_logout(&config),
        Commands::Status => handle_status(&config).await,
        Commands::Teams { command } => handle_teams(command, &config).await,
        Commands::Tasks { command } => handle_tasks(command, &config).await,
        Commands::Config { command } => handle_config(command, cli.config.as_ref(), &config),
    }
}

fn load_config(config_path: Option<&PathBuf>) -> TeamtaskResult<TeamtaskConfig> {
    if let Some(path) = config_path {
        debug!("Loading configuration from {:?}", path);
        return TeamtaskConfig::from_file(path);
    }

    // Try to load from default locations
    let default_paths = [
        dirs::config_dir().map(|d| d.join("teamtask").join("config.toml")),
        dirs::home_dir().map(|d| d.join(".teamtask").join("config.toml")),
        Some(PathBuf::from("teamtask.toml")),
    ];

    for path in default_paths.iter().flatten() {
        if path.exists() {
            debug!("Loading configuration from {:?}", path);
            return TeamtaskConfig::from_file(path);
        }
    }

    debug!("No configuration file found, using defaults");
    Ok(TeamtaskConfig::default())
}

/// File, then environment, then `--base-url`; validated before any request is made
fn effective_config(
    config_path: Option<&PathBuf>,
    base_url: Option<&str>,
    validate: bool,
) -> TeamtaskResult<TeamtaskConfig> {
    let mut config = load_config(config_path)?;
    config.apply_env_overrides();
    if let Some(base_url) = base_url {
        config.set_base_url(base_url);
    }

    if validate {
        config.validate()?;
    }
    Ok(config)
}

fn default_config_path() -> TeamtaskResult<PathBuf> {
    dirs::config_dir()
        .or_else(|| dirs::home_dir().map(|d| d.join(".config")))
        .map(|dir| dir.join("teamtask").join("config.toml"))
        .ok_or_else(|| config_error!("Cannot determine the configuration directory", "cli"))
}

/// Expand a leading `~` in the configured data directory
fn resolve_data_dir(data_dir: &str) -> TeamtaskResult<PathBuf> {
    let rest = match data_dir.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return Ok(PathBuf::from(data_dir)),
    };

    let home = dirs::home_dir()
        .ok_or_else(|| config_error!("Cannot determine the home directory", "cli"))?;
    Ok(if rest.is_empty() { home } else { home.join(rest) })
}

fn open_manager(config: &TeamtaskConfig) -> TeamtaskResult<SessionManager> {
    let data_dir = resolve_data_dir(&config.storage.data_dir)?;
    SessionManager::open(config, data_dir)
}

/// Restore the saved session and check the caller may proceed
async fn restore_session(
    config: &TeamtaskConfig,
    access: Access,
) -> TeamtaskResult<Result<SessionManager, String>> {
    let manager = open_manager(config)?;
    manager.check_session().await;

    if !manager.is_authenticated() {
        return Ok(Err(NOT_SIGNED_IN.to_string()));
    }
    if matches!(access, Access::Administrator) && !manager.is_authorized() {
        return Ok(Err(ADMIN_REQUIRED.to_string()));
    }
    Ok(Ok(manager))
}

/// Print a result envelope; a failed one ends the process with status 1
fn emit<T: Serialize>(envelope: ResultEnvelope<T>) -> TeamtaskResult<()> {
    print_json(&envelope)?;
    if !envelope.is_success() {
        std::process::exit(1);
    }
    Ok(())
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> TeamtaskResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

async fn handle_login(
    username: &str,
    password: &str,
    config: &TeamtaskConfig,
) -> TeamtaskResult<()> {
    let manager = open_manager(config)?;
    let outcome = manager.login(username, password).await;
    print_json(&outcome)?;

    if !outcome.success {
        std::process::exit(1);
    }
    Ok(())
}

fn handle_logout(config: &TeamtaskConfig) -> TeamtaskResult<()> {
    open_manager(config)?.logout();
    print_json(&json!({ "success": true }))
}

async fn handle_status(config: &TeamtaskConfig) -> TeamtaskResult<()> {
    let manager = open_manager(config)?;
    manager.check_session().await;

    let status = manager.status();
    print_json(&json!({
        "state": status.state,
        "session": status.session,
        "administrator": manager.is_authorized(),
        "base_url": manager.gateway().base_url(),
    }))
}

async fn handle_teams(command: TeamCommands, config: &TeamtaskConfig) -> TeamtaskResult<()> {
    let access = match command {
        TeamCommands::List => Access::Member,
        _ => Access::Administrator,
    };
    let manager = match restore_session(config, access).await? {
        Ok(manager) => manager,
        Err(message) => return emit(ResultEnvelope::<()>::error(message)),
    };
    let gateway = manager.gateway();

    match command {
        TeamCommands::List => emit(ResultEnvelope::from(gateway.list_teams().await)),
        TeamCommands::Create { name, description } => {
            let team = TeamInput {
                name: Some(name),
                description,
            };
            emit(ResultEnvelope::from(gateway.create_team(&team).await))
        }
        TeamCommands::Update {
            id,
            name,
            description,
        } => {
            let team = TeamInput { name, description };
            emit(ResultEnvelope::from(gateway.update_team(id, &team).await))
        }
        TeamCommands::Delete { id } => emit(ResultEnvelope::from(gateway.delete_team(id).await)),
    }
}

async fn handle_tasks(command: TaskCommands, config: &TeamtaskConfig) -> TeamtaskResult<()> {
    let access = match command {
        TaskCommands::Create { .. } | TaskCommands::Delete { .. } => Access::Administrator,
        _ => Access::Member,
    };
    let manager = match restore_session(config, access).await? {
        Ok(manager) => manager,
        Err(message) => return emit(ResultEnvelope::<()>::error(message)),
    };
    let gateway = manager.gateway();

    match command {
        TaskCommands::List => emit(ResultEnvelope::from(gateway.list_tasks().await)),
        TaskCommands::Create {
            title,
            team_id,
            description,
            priority,
            status,
            due_date,
        } => {
            let task = TaskInput {
                title: Some(title),
                description,
                team_id: Some(team_id),
                priority: Some(priority),
                status: Some(status),
                due_date,
            };
            emit(ResultEnvelope::from(gateway.create_task(&task).await))
        }
        TaskCommands::Update {
            id,
            title,
            team_id,
            description,
            priority,
            status,
            due_date,
        } => {
            let task = TaskInput {
                title,
                description,
                team_id,
                priority,
                status,
                due_date,
            };
            emit(ResultEnvelope::from(gateway.update_task(id, &task).await))
        }
        TaskCommands::Delete { id } => emit(ResultEnvelope::from(gateway.delete_task(id).await)),
        TaskCommands::SetStatus { id, status } => {
            let change = TaskInput::status_change(status);
            emit(ResultEnvelope::from(gateway.update_task(id, &change).await))
        }
    }
}

fn handle_config(
    command: ConfigCommands,
    config_path: Option<&PathBuf>,
    config: &TeamtaskConfig,
) -> TeamtaskResult<()> {
    match command {
        ConfigCommands::Show => {
            let rendered = toml::to_string_pretty(config).map_err(|e| TeamtaskError::Config {
                message: format!("Failed to render configuration: {}", e),
                source: Some(Box::new(e)),
                context: ErrorContext::new("cli").with_operation("config_show"),
            })?;
            println!("{}", rendered);
        }
        ConfigCommands::Init { force } => {
            let path = match config_path {
                Some(path) => path.clone(),
                None => default_config_path()?,
            };
            init_config(&path, force)?;
            println!("Configuration initialized at: {}", path.display());
        }
        ConfigCommands::Validate => {
            config.validate()?;
            println!("Configuration is valid");
        }
    }
    Ok(())
}

fn init_config(path: &Path, force: bool) -> TeamtaskResult<()> {
    if path.exists() && !force {
        return Err(config_error!(
            format!(
                "{} already exists; pass --force to overwrite it",
                path.display()
            ),
            "cli"
        ));
    }
    TeamtaskConfig::default().save_to_file(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;
    use tempfile::TempDir;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_task_create_defaults() {
        let cli = Cli::try_parse_from([
            "teamtask", "tasks", "create", "--title", "Ship", "--team-id", "4",
        ])
        .unwrap();

        match cli.command {
            Commands::Tasks {
                command:
                    TaskCommands::Create {
                        priority, status, ..
                    },
            } => {
                assert_eq!(priority, "medium");
                assert_eq!(status, "pending");
            }
            _ => panic!("expected tasks create"),
        }
    }

    #[test]
    fn test_resolve_data_dir() {
        let home = dirs::home_dir().unwrap();
        assert_eq!(resolve_data_dir("~").unwrap(), home);
        assert_eq!(
            resolve_data_dir("~/.teamtask").unwrap(),
            home.join(".teamtask")
        );
        assert_eq!(
            resolve_data_dir("/var/lib/teamtask").unwrap(),
            PathBuf::from("/var/lib/teamtask")
        );
        assert_eq!(
            resolve_data_dir("~other/x").unwrap(),
            PathBuf::from("~other/x")
        );
    }

    #[test]
    fn test_effective_config_is_validated() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        std::fs::write(&path, "[api]\ntimeout_seconds = 0\n").unwrap();

        let error = effective_config(Some(&path), None, true).unwrap_err();
        assert!(matches!(error, TeamtaskError::Config { .. }));
        assert!(error.to_string().contains("timeout_seconds"));

        let unchecked = effective_config(Some(&path), None, false).unwrap();
        assert_eq!(unchecked.api.timeout_seconds, 0);
    }

    #[test]
    fn test_base_url_flag_is_validated() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");
        TeamtaskConfig::default().save_to_file(&path).unwrap();

        assert!(effective_config(Some(&path), Some("not a url"), true).is_err());

        let config =
            effective_config(Some(&path), Some("https://example.com/wp-json"), true).unwrap();
        assert_eq!(config.api.base_url, "https://example.com/wp-json");
    }

    #[test]
    fn test_init_config_refuses_to_overwrite() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("nested").join("config.toml");

        init_config(&path, false).unwrap();
        assert!(init_config(&path, false).is_err());
        init_config(&path, true).unwrap();

        let loaded = TeamtaskConfig::from_file(&path).unwrap();
        assert_eq!(loaded.api.base_url, TeamtaskConfig::default().api.base_url);
    }
}
