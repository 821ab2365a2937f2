use std::time::Duration;

use authsession::{AuthConfig, AuthError, AuthState, AuthStore, GateDecision, LoginStatus, decide, spawn_session_poller};
use clap::{Parser, Subcommand};
use tracing::{debug, warn};

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error("missing password; pass --password or set AUTH_PASSWORD")]
    MissingPassword,
    #[error("login failed: {0}")]
    LoginFailed(String),
    #[error("signal handler failed: {0}")]
    Signal(#[from] std::io::Error),
}

#[derive(Parser, Debug)]
#[command(name = "authsession", about = "Session authority client: status, login, watch")]
struct Cli {
    /// Overrides `AUTH_BASE_URL`.
    #[arg(long)]
    base_url: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Resolve the current session and print what a protected view would do.
    Status,
    /// Log in, optionally keeping the session under watch until it ends.
    Login {
        #[arg(long)]
        username: String,

        #[arg(long, env = "AUTH_PASSWORD", hide_env_values = true)]
        password: Option<String>,

        /// Poll the session until the server ends it or Ctrl-C (which logs out).
        #[arg(long, default_value_t = false)]
        watch: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), CliError> {
    tracing_subscriber::fmt::init();
    match dotenvy::dotenv() {
        Ok(path) => debug!(path = %path.display(), "loaded .env"),
        Err(e) if e.not_found() => {}
        Err(e) => warn!(error = %e, "ignoring unreadable .env"),
    }

    let cli = Cli::parse();
    let mut config = AuthConfig::from_env()?;
    if let Some(url) = cli.base_url.as_deref() {
        config = config.with_base_url(url)?;
    }
    let poll_interval = config.poll_interval;

    let store = AuthStore::from_config(config)?;
    let state = store.initialize().await;

    let result = match cli.command {
        Command::Status => {
            print_state(&state);
            Ok(())
        }
        Command::Login { username, password, watch } => {
            run_login(&store, &username, password, watch, poll_interval).await
        }
    };
    store.shutdown();
    result
}

async fn run_login(
    store: &AuthStore,
    username: &str,
    password: Option<String>,
    watch: bool,
    poll_interval: Duration,
) -> Result<(), CliError> {
    let password = password.ok_or(CliError::MissingPassword)?;
    if let Err(e) = store.login(username, &password).await {
        let message = store.snapshot().error.unwrap_or_else(|| e.to_string());
        return Err(CliError::LoginFailed(message));
    }
    print_state(&store.snapshot());
    if !watch {
        return Ok(());
    }

    let poller = spawn_session_poller(store.clone(), poll_interval);
    let mut rx = store.subscribe();
    tokio::select! {
        ended = rx.wait_for(|s| s.status != LoginStatus::LoggedIn) => {
            if ended.is_ok() {
                println!("session ended by server");
            }
        }
        signal = tokio::signal::ctrl_c() => {
            signal?;
            println!("interrupted; logging out");
            poller.cancel();
            if let Err(e) = store.logout().await {
                warn!(error = %e, "logout on exit failed");
            }
        }
    }
    poller.stop().await;
    print_state(&store.snapshot());
    Ok(())
}

fn print_state(state: &AuthState) {
    let status = match state.status {
        LoginStatus::Pending => "pending",
        LoginStatus::LoggedIn => "logged in",
        LoginStatus::LoggedOut => "logged out",
    };
    println!("status:         {status}");
    if let Some(name) = &state.username {
        println!("username:       {name}");
    }
    println!("csrf token:     {}", if state.csrf_token.is_some() { "present" } else { "missing" });
    if let Some(error) = &state.error {
        println!("error:          {error}");
    }
    let gate = match decide(state) {
        GateDecision::Pending => "pending".to_owned(),
        GateDecision::Admit => "admit".to_owned(),
        GateDecision::Redirect { to } => format!("redirect to {to}"),
    };
    println!("protected view: {gate}");
}
