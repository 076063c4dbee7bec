//! PPG Hub CLI - sign in to the PPG Hub API and manage the local session
//!
//! This binary can:
//! - Log in or register an account and keep the session across runs
//! - Show and validate the stored session
//! - Make authorized requests against the API
//! - Log out (locally first, then on the server)

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use ppghub_core::flow::{self, SessionValidation, SignOutOutcome};
use ppghub_core::gateway::{self, AuthClient, LoginRequest, RegisterRequest};
use ppghub_core::storage::{self, SessionStorage};
use ppghub_core::{AuthError, AuthGateway, SessionStore, UserIdentity};
use std::io::{BufRead, Write};

/// Environment variable consulted when `--password` is not given
const ENV_PASSWORD: &str = "PPGHUB_PASSWORD";

type Store = SessionStore<Box<dyn SessionStorage>>;

#[derive(Parser)]
#[command(name = "ppghub")]
#[command(author = "PPG Hub Team")]
#[command(version)]
#[command(about = "Command-line client for the PPG Hub academic program service")]
#[command(long_about = "
PPG Hub CLI signs you in to the PPG Hub API and keeps your session
between runs, so other commands can make authorized requests.

Quick start:
  1. Sign in:       ppghub login --email you@ppg.br
  2. Check session: ppghub status
  3. Call the API:  ppghub get /programas
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output format
    #[arg(short, long, global = true, default_value = "text")]
    pub format: OutputFormat,
}

#[derive(Clone, Copy, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output for scripting
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Log in with email and password
    Login {
        #[arg(short, long)]
        email: String,
        /// Password (falls back to PPGHUB_PASSWORD, then stdin)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Create an account and log in with it
    Register {
        #[arg(short, long)]
        name: String,
        #[arg(short, long)]
        email: String,
        /// Password (falls back to PPGHUB_PASSWORD, then stdin)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Clear the local session and invalidate it on the server
    #[command(alias = "sair")]
    Logout,

    /// Show the stored session, validated against the server
    Status,

    /// Fetch the current user from the server
    Whoami,

    /// Make an authorized GET request and print the JSON response
    Get {
        /// API path, e.g. /programas
        path: String,
    },

    /// Show configuration paths and settings
    Config,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| {
                format!("ppghub={},ppghub_core={}", log_level, log_level).into()
            }),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut store = SessionStore::open(storage::default_storage()?);

    if let Commands::Config = cli.command {
        return cmd_config(&cli, &store);
    }

    let client = AuthClient::from_env()?;

    let outcome = match &cli.command {
        Commands::Login { email, password } => {
            cmd_login(&cli, &client, &mut store, email, password.clone()).await
        }
        Commands::Register {
            name,
            email,
            password,
        } => cmd_register(&cli, &client, &mut store, name, email, password.clone()).await,
        Commands::Logout => cmd_logout(&cli, &client, &mut store).await,
        Commands::Status => cmd_status(&cli, &client, &mut store).await,
        Commands::Whoami => cmd_whoami(&cli, &client, &mut store).await,
        Commands::Get { path } => cmd_get(&cli, &client, &mut store, path).await,
        Commands::Config => Ok(()),
    };

    match outcome {
        Ok(()) => Ok(()),
        Err(CommandError::Auth(e)) => {
            report_auth_error(&cli, &e);
            std::process::exit(1);
        }
        Err(CommandError::Other(e)) => Err(e),
    }
}

/// Auth failures get a user-facing message and exit code 1; everything else
/// propagates as an ordinary error.
enum CommandError {
    Auth(AuthError),
    Other(anyhow::Error),
}

impl From<AuthError> for CommandError {
    fn from(e: AuthError) -> Self {
        CommandError::Auth(e)
    }
}

impl From<anyhow::Error> for CommandError {
    fn from(e: anyhow::Error) -> Self {
        CommandError::Other(e)
    }
}

type CommandResult = std::result::Result<(), CommandError>;

fn report_auth_error(cli: &Cli, err: &AuthError) {
    tracing::debug!("Command failed: {}", err);
    match cli.format {
        OutputFormat::Text => eprintln!("Error: {}", err.user_message()),
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "status": "error",
                    "error": err.to_string(),
                    "message": err.user_message(),
                    "user_correctable": err.is_user_correctable(),
                })
            );
        }
    }
}

/// Resolve the password from the flag, the environment, or stdin.
fn resolve_password(password: Option<String>) -> Result<String> {
    if let Some(p) = password {
        return Ok(p);
    }
    if let Ok(p) = std::env::var(ENV_PASSWORD) {
        return Ok(p);
    }

    eprint!("Password: ");
    std::io::stderr().flush().ok();
    let mut line = String::new();
    std::io::stdin()
        .lock()
        .read_line(&mut line)
        .context("Failed to read password from stdin")?;
    Ok(line.trim_end_matches(['\r', '\n']).to_string())
}

fn user_json(user: &UserIdentity) -> serde_json::Value {
    serde_json::json!({
        "id": user.id,
        "name": user.display_name,
        "email": user.email,
        "roles": user.roles,
    })
}

fn print_user(user: &UserIdentity) {
    println!("Name:   {}", user.display_name);
    println!("Email:  {}", user.email);
    let roles: Vec<&str> = user.roles.iter().map(String::as_str).collect();
    println!(
        "Roles:  {}",
        if roles.is_empty() {
            "-".to_string()
        } else {
            roles.join(", ")
        }
    );
}

fn already_logged_in(cli: &Cli, store: &Store) -> bool {
    let Some(user) = store.user() else {
        return false;
    };
    match cli.format {
        OutputFormat::Text => {
            println!("Already logged in as {}", user.email);
            println!("Use 'ppghub logout' to sign out first.");
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "status": "already_logged_in",
                    "user": user_json(user),
                })
            );
        }
    }
    true
}

fn report_signed_in(cli: &Cli, status: &str, user: &UserIdentity) {
    match cli.format {
        OutputFormat::Text => {
            println!("Logged in as {} ({})", user.display_name, user.email);
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "status": status,
                    "user": user_json(user),
                })
            );
        }
    }
}

async fn cmd_login(
    cli: &Cli,
    client: &AuthClient,
    store: &mut Store,
    email: &str,
    password: Option<String>,
) -> CommandResult {
    if already_logged_in(cli, store) {
        return Ok(());
    }
    let password = resolve_password(password)?;
    let user = flow::sign_in(client, store, LoginRequest::new(email, password)).await?;
    report_signed_in(cli, "logged_in", &user);
    Ok(())
}

async fn cmd_register(
    cli: &Cli,
    client: &AuthClient,
    store: &mut Store,
    name: &str,
    email: &str,
    password: Option<String>,
) -> CommandResult {
    if already_logged_in(cli, store) {
        return Ok(());
    }
    let password = resolve_password(password)?;
    let user = flow::sign_up(client, store, RegisterRequest::new(name, email, password)).await?;
    report_signed_in(cli, "registered", &user);
    Ok(())
}

async fn cmd_logout(cli: &Cli, client: &AuthClient, store: &mut Store) -> CommandResult {
    let email = store.user().map(|u| u.email.clone());
    let outcome = flow::sign_out(client, store).await;

    match cli.format {
        OutputFormat::Text => match &outcome {
            SignOutOutcome::NotLoggedIn => println!("Not logged in."),
            SignOutOutcome::Invalidated => {
                println!("Logged out {}", email.unwrap_or_default());
            }
            SignOutOutcome::ServerFailed(e) => {
                println!("Logged out {} locally", email.unwrap_or_default());
                println!("Server could not be notified: {}", e.user_message());
            }
        },
        OutputFormat::Json => {
            let (status, server_error) = match &outcome {
                SignOutOutcome::NotLoggedIn => ("not_logged_in", None),
                SignOutOutcome::Invalidated => ("logged_out", None),
                SignOutOutcome::ServerFailed(e) => ("logged_out", Some(e.to_string())),
            };
            println!(
                "{}",
                serde_json::json!({
                    "status": status,
                    "email": email,
                    "server_error": server_error,
                })
            );
        }
    }
    Ok(())
}

async fn cmd_status(cli: &Cli, client: &AuthClient, store: &mut Store) -> CommandResult {
    let validation = flow::validate_session(client, store).await;

    match cli.format {
        OutputFormat::Text => match &validation {
            SessionValidation::Anonymous => {
                println!("Status: Not logged in");
                println!();
                println!("Run 'ppghub login --email <EMAIL>' to authenticate.");
            }
            SessionValidation::Revoked => {
                println!("Status: Session expired (cleared)");
                println!();
                println!("Run 'ppghub login --email <EMAIL>' to authenticate again.");
            }
            SessionValidation::Valid(user) => {
                println!("Status: Logged in");
                print_user(user);
            }
            SessionValidation::Unverified(reason) => {
                println!("Status: Logged in (not verified: {})", reason);
                if let Some(user) = store.user() {
                    print_user(user);
                }
            }
        },
        OutputFormat::Json => {
            let verified = matches!(validation, SessionValidation::Valid(_));
            println!(
                "{}",
                serde_json::json!({
                    "authenticated": store.is_authenticated(),
                    "verified": verified,
                    "user": store.user().map(user_json),
                    "storage_info": store.storage().describe(),
                })
            );
        }
    }
    Ok(())
}

async fn cmd_whoami(cli: &Cli, client: &AuthClient, store: &mut Store) -> CommandResult {
    let token = store
        .access_token()
        .map(str::to_owned)
        .ok_or(AuthError::Unauthorized)?;

    let user = match client.fetch_current_user(&token).await {
        Ok(user) => user,
        Err(AuthError::Unauthorized) => {
            store.logout();
            return Err(AuthError::Unauthorized.into());
        }
        Err(e) => return Err(e.into()),
    };

    match cli.format {
        OutputFormat::Text => print_user(&user),
        OutputFormat::Json => println!("{}", user_json(&user)),
    }
    Ok(())
}

async fn cmd_get(cli: &Cli, client: &AuthClient, store: &mut Store, path: &str) -> CommandResult {
    match client.get_json(path, store.state()).await {
        Ok(body) => {
            let rendered = match cli.format {
                OutputFormat::Text => serde_json::to_string_pretty(&body),
                OutputFormat::Json => serde_json::to_string(&body),
            }
            .context("Failed to render response")?;
            println!("{}", rendered);
            Ok(())
        }
        Err(AuthError::Unauthorized) => {
            // Stale token: drop it rather than retrying with it.
            store.logout();
            Err(AuthError::Unauthorized.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn cmd_config(cli: &Cli, store: &Store) -> Result<()> {
    let api_config = gateway::load_api_config();
    let config_path = gateway::config::get_config_file_path_string();
    let storage_info = store.storage().describe();

    match cli.format {
        OutputFormat::Text => {
            println!("Configuration");
            println!("=============");
            println!();
            println!("Config file:      {}", config_path);
            println!(
                "API endpoint:     {} (from {})",
                api_config.base_url, api_config.source
            );
            println!("Request timeout:  {}s", api_config.timeout.as_secs());
            println!("Session storage:  {}", storage_info);
            println!();
            println!("Environment variables:");
            println!("  {} - Override API endpoint", gateway::config::ENV_API_URL);
            println!("  {} - Password for login/register", ENV_PASSWORD);
            println!();
            println!("Example config.toml:");
            println!();
            println!("{}", gateway::config::generate_example_config());
        }
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "config_file": config_path,
                    "api_url": api_config.base_url,
                    "api_source": api_config.source.to_string(),
                    "timeout_secs": api_config.timeout.as_secs(),
                    "session_storage": storage_info,
                })
            );
        }
    }

    Ok(())
}
