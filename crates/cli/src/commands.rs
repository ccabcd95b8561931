//! CLI commands

use anyhow::{Context, Result, bail};
use bidtun_core::{CredentialStore, SessionStore};
use bidtun_http::client::GatewayClientBuilder;
use bidtun_http::types::LoginRequest;
use bidtun_http::{GatewayClient, GatewayConfig, Method};
use chrono::Utc;
use clap::Subcommand;
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use crate::config;

/// File holding the persisted session inside the state directory
const SESSION_FILE: &str = "session.json";

#[derive(Subcommand)]
pub enum Commands {
    /// Sign in and store the session
    Login {
        /// Account email
        #[arg(long)]
        email: String,

        /// Account password
        #[arg(long, env = "BIDTUN_PASSWORD", hide_env_values = true)]
        password: String,
    },

    /// Sign out and clear the stored session
    Logout,

    /// Show the stored session
    Whoami,

    /// Manage the guest identity used before signing in
    Guest {
        #[command(subcommand)]
        command: GuestCommands,
    },

    /// Send a request to the API through the authenticated gateway
    Request {
        /// HTTP method, e.g. GET or POST
        method: String,

        /// Path under the base URL, e.g. /listings/
        path: String,

        /// JSON request body
        #[arg(long)]
        body: Option<String>,
    },

    /// Manage configuration files
    Config {
        #[command(subcommand)]
        command: ConfigCommands,
    },
}

#[derive(Subcommand)]
pub enum GuestCommands {
    /// Use the given guest id for unauthenticated requests
    Set {
        /// Guest identifier issued by the backend
        id: String,
    },

    /// Forget the guest id
    Clear,
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// Generate a default gateway configuration file
    Init {
        /// Output file path (defaults to <state dir>/config.toml)
        output: Option<PathBuf>,
    },
}

/// What a command needs from the environment it runs in
struct CommandEnv {
    state_dir: PathBuf,
    config_file: Option<PathBuf>,
}

impl CommandEnv {
    fn store(&self) -> Arc<SessionStore> {
        Arc::new(SessionStore::persistent(self.state_dir.join(SESSION_FILE)))
    }

    fn config(&self) -> Result<GatewayConfig> {
        config::load_gateway_config(self.config_file.as_deref(), &self.state_dir)
            .context("failed to load gateway configuration")
    }

    fn gateway(&self, store: Arc<SessionStore>) -> Result<GatewayClient> {
        let config = self.config()?;
        debug!(base_url = %config.base_url, "Building gateway");

        let client = GatewayClientBuilder::from_config(&config)
            .store(store)
            .on_redirect(|login_path| {
                eprintln!("Session expired, run `bidtun login` to sign in again ({login_path})");
            })
            .build()?;
        Ok(client)
    }
}

impl Commands {
    pub async fn execute(self, state_dir: PathBuf, config_file: Option<PathBuf>) -> Result<()> {
        let ctx = CommandEnv {
            state_dir,
            config_file,
        };

        match self {
            Self::Login { email, password } => login(&ctx, email, password).await,
            Self::Logout => logout(&ctx).await,
            Self::Whoami => {
                whoami(&ctx);
                Ok(())
            }
            Self::Guest { command } => {
                command.execute(&ctx);
                Ok(())
            }
            Self::Request { method, path, body } => request(&ctx, &method, &path, body).await,
            Self::Config { command } => command.execute(&ctx),
        }
    }
}

impl GuestCommands {
    fn execute(self, ctx: &CommandEnv) {
        let store = ctx.store();
        match self {
            Self::Set { id } => {
                store.set_guest(id);
                println!("Guest id saved");
            }
            Self::Clear => {
                store.reset_guest();
                println!("Guest id cleared");
            }
        }
    }
}

impl ConfigCommands {
    fn execute(self, ctx: &CommandEnv) -> Result<()> {
        match self {
            Self::Init { output } => {
                let config_path =
                    output.unwrap_or_else(|| ctx.state_dir.join(config::DEFAULT_CONFIG_FILE));

                // Create parent directory if it doesn't exist
                if let Some(parent) = config_path.parent() {
                    std::fs::create_dir_all(parent)?;
                }

                config::generate_default_config(&config_path)?;
                println!(
                    "Generated gateway configuration at: {}",
                    config_path.display()
                );
                Ok(())
            }
        }
    }
}

async fn login(ctx: &CommandEnv, email: String, password: String) -> Result<()> {
    let store = ctx.store();
    let client = ctx.gateway(store.clone())?;

    let response = client.login(&LoginRequest { email, password }).await?;
    info!("Session stored in {}", ctx.state_dir.display());

    match response.user.get("email").and_then(|email| email.as_str()) {
        Some(email) => println!("Signed in as {email}"),
        None => println!("Signed in"),
    }
    Ok(())
}

async fn logout(ctx: &CommandEnv) -> Result<()> {
    let store = ctx.store();
    if !store.current().is_authenticated() {
        println!("Not signed in");
        return Ok(());
    }

    let client = ctx.gateway(store)?;
    client.logout().await?;
    println!("Signed out");
    Ok(())
}

fn whoami(ctx: &CommandEnv) {
    let session = ctx.store().current();

    if session.is_authenticated() {
        println!("user:    {}", session.subject_id().unwrap_or("(unknown)"));
        if let Some(expires_at) = session.user.as_ref().and_then(|user| user.expires_at()) {
            let state = if session.is_access_expired(Utc::now()) {
                "expired"
            } else {
                "valid"
            };
            println!("access:  {state} until {expires_at}");
        }
        let refresh = if session.refresh_token().is_some() {
            "present"
        } else {
            "missing"
        };
        println!("refresh: {refresh}");
    } else {
        println!("Not signed in");
    }

    if let Some(guest) = session.guest_id() {
        println!("guest:   {guest}");
    }
}

async fn request(ctx: &CommandEnv, method: &str, path: &str, body: Option<String>) -> Result<()> {
    let method = parse_method(method)?;
    let client = ctx.gateway(ctx.store())?;

    let mut pending = client.request(method, path);
    if let Some(body) = body {
        let json: serde_json::Value =
            serde_json::from_str(&body).context("--body is not valid JSON")?;
        pending = pending.json(&json)?;
    }

    let response = client.send(pending).await?;
    let status = response.status();
    let text = response.text().await?;
    info!(%status, "Request completed");

    match serde_json::from_str::<serde_json::Value>(&text) {
        Ok(json) => println!("{}", serde_json::to_string_pretty(&json)?),
        Err(_) => println!("{text}"),
    }
    Ok(())
}

fn parse_method(method: &str) -> Result<Method> {
    let method = Method::from_bytes(method.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid HTTP method: {method}"))?;
    if matches!(method, Method::CONNECT | Method::TRACE) {
        bail!("unsupported HTTP method: {method}");
    }
    Ok(method)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_method() {
        assert_eq!(parse_method("get").unwrap(), Method::GET);
        assert_eq!(parse_method("PATCH").unwrap(), Method::PATCH);
        assert!(parse_method("CONNECT").is_err());
        assert!(parse_method("not a method").is_err());
    }

    #[test]
    fn test_guest_commands_persist() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let ctx = CommandEnv {
            state_dir: temp_dir.path().to_path_buf(),
            config_file: None,
        };

        GuestCommands::Set { id: "g-1".into() }.execute(&ctx);
        assert_eq!(ctx.store().current().guest_id(), Some("g-1"));

        GuestCommands::Clear.execute(&ctx);
        assert_eq!(ctx.store().current().guest_id(), None);
    }
}
