//! `streckenheld` - sign in to Streckenheld from the terminal.
//!
//! Configuration comes from `STRECKENHELD_*` environment variables (a
//! `.env` file is honored). Sign-in opens the system browser and waits for
//! the loopback redirect.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::time::Duration;
use streckenheld_core::environment::SystemClock;
use streckenheld_session::providers::{
    FileLocalStore, HostedIdentityProvider, JwksTokenValidator, KeyringSecureStore,
    LogNotifier, LoopbackBrowser,
};
use streckenheld_session::{
    DarkMode, HttpAccountsApi, SessionConfig, SessionEnvironment, SessionManager,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type Manager = SessionManager<
    HostedIdentityProvider,
    LoopbackBrowser,
    KeyringSecureStore,
    FileLocalStore,
    LogNotifier,
    JwksTokenValidator,
    SystemClock,
    HttpAccountsApi,
>;

#[derive(Debug, Parser)]
#[command(name = "streckenheld", version, about = "Streckenheld account session")]
struct Cli {
    /// Print the browser URL instead of opening it.
    #[arg(long, global = true)]
    headless: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Sign in with an existing account.
    Login,
    /// Create an account.
    Register,
    /// Sign out here and at the provider.
    Logout,
    /// Show the signed-in user and preferences.
    Status,
    /// Change the theme preference.
    DarkMode {
        /// `system`, `light` or `dark`
        mode: DarkMode,
    },
    /// Finish onboarding.
    Onboard,
    /// Request deletion of the signed-in account.
    DeleteAccount,
}

fn init_tracing() {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "streckenheld=info,streckenheld_session=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false).with_writer(std::io::stderr))
        .init();
}

async fn build_manager(config: &SessionConfig, headless: bool) -> Result<Manager> {
    let http = config.http_client()?;
    let provider_config = config
        .resolve(&http)
        .await
        .context("failed to resolve identity provider")?;

    let mut browser = LoopbackBrowser::new(config.operation_timeout);
    if headless {
        browser = browser.headless();
    }

    let environment = SessionEnvironment::new(
        HostedIdentityProvider::new(http.clone(), &provider_config),
        browser,
        KeyringSecureStore::new(),
        FileLocalStore::new()?,
        LogNotifier::terminal(),
        JwksTokenValidator::new(http.clone(), provider_config.endpoints.jwks_uri.clone()),
        SystemClock,
        provider_config,
    );
    let accounts = HttpAccountsApi::new(http, config.api_base_url.clone());

    Ok(SessionManager::new(config, environment, accounts)?)
}

async fn status(manager: &Manager) -> Result<()> {
    let session = manager.snapshot().await;
    match &session.user {
        Some(user) => {
            println!("Signed in as {} ({})", user.display_name(), user.id);
            if let Some(email) = &user.email {
                println!("Email: {email}");
            }
        },
        None => println!("Not signed in"),
    }
    println!("Theme: {}", session.dark_mode.as_str());
    println!("Route: {:?}", manager.current_route().await?);
    Ok(())
}

async fn run(cli: Cli) -> Result<()> {
    let config = SessionConfig::from_env().context("invalid configuration")?;
    let manager = build_manager(&config, cli.headless).await?;
    manager.start().await?;

    match cli.command {
        Command::Login => {
            let user = manager.login().await?;
            println!("Signed in as {}", user.display_name());
        },
        Command::Register => {
            let user = manager.register().await?;
            println!("Welcome, {}", user.display_name());
        },
        Command::Logout => {
            manager.logout().await?;
            println!("Signed out");
        },
        Command::Status => status(&manager).await?,
        Command::DarkMode { mode } => {
            let mode = manager.set_dark_mode(Some(mode)).await?;
            println!("Theme: {}", mode.as_str());
        },
        Command::Onboard => {
            manager.mark_onboarded().await?;
            println!("Route: {:?}", manager.current_route().await?);
        },
        Command::DeleteAccount => {
            if !manager.delete_account().await? {
                anyhow::bail!("account deletion was not accepted");
            }
        },
    }

    manager.shutdown(Duration::from_secs(5)).await?;
    Ok(())
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    if let Err(error) = run(cli).await {
        eprintln!("{error:#}");
        std::process::exit(1);
    }
}
