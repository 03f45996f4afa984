//! Reddit Account Transfer Tool
//!
//! Copies subscriptions, saved items, friends and preferences from one
//! Reddit account to another.

// reddit-transfer/src/main.rs
mod auth;
mod config;
mod errors;
mod reddit;
mod sync;
mod utils;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use config::{AppConfig, ResourceKind, Strategy, TransferOverrides, load_transfer_config};
use std::path::PathBuf;
use std::process::ExitCode;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Conventional exit status for a run stopped by SIGINT.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Debug, Parser)]
#[command(name = "reddit-transfer", version, about = "Transfer a Reddit account's data to another account")]
struct Cli {
    /// Path to config.json
    #[arg(long, global = true, env = "REDDIT_TRANSFER_CONFIG", default_value = "config.json")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Log in to an account and store its token in the credential cache
    Login {
        /// Account to log in as (with or without the u/ prefix)
        username: String,
    },
    /// Make NEW_USERNAME mirror OLD_USERNAME
    Transfer {
        /// Account to copy from
        old_username: String,
        /// Account to copy to; its current data is replaced
        new_username: String,
        /// How list categories are reconciled
        #[arg(long, value_enum)]
        strategy: Option<Strategy>,
        /// Fetch and plan everything, write nothing
        #[arg(long)]
        dry_run: bool,
        /// Leave a category untouched (repeatable)
        #[arg(long, value_enum)]
        skip: Vec<ResourceKind>,
    },
}

/// Main entry point for the transfer tool
#[tokio::main]
async fn main() -> ExitCode {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_writer(std::io::stderr)
        .compact()
        .init();

    let cli = Cli::parse();
    match run_app(cli).await {
        Ok(()) => {
            println!("✅ Operation completed successfully.");
            ExitCode::SUCCESS
        }
        Err(e) if e.downcast_ref::<sync::Interrupted>().is_some() => {
            eprintln!("⚠️ {}", e);
            ExitCode::from(EXIT_INTERRUPTED)
        }
        Err(e) => {
            eprintln!("❌ Error: {:?}", e);
            ExitCode::FAILURE
        }
    }
}

async fn run_app(cli: Cli) -> Result<()> {
    let app_config = AppConfig::load(&cli.config).with_context(|| {
        format!(
            "Failed to load application configuration from {}",
            cli.config.display()
        )
    })?;

    match cli.command {
        Commands::Login { username } => {
            auth::run_login_flow(&app_config, &username).await?;
        }
        Commands::Transfer {
            old_username,
            new_username,
            strategy,
            dry_run,
            skip,
        } => {
            let overrides = TransferOverrides {
                strategy,
                dry_run,
                skip,
            };
            let transfer_config = load_transfer_config(
                &app_config.raw_json_config,
                &old_username,
                &new_username,
                &overrides,
            )
            .context("Invalid transfer arguments")?;

            let cancel = CancellationToken::new();
            let on_interrupt = cancel.clone();
            tokio::spawn(async move {
                if watch_interrupts(on_interrupt, tokio::signal::ctrl_c).await {
                    eprintln!("\n❌ Second interrupt, exiting immediately.");
                    std::process::exit(i32::from(EXIT_INTERRUPTED));
                }
            });

            let summary = sync::run_sync_flow(&app_config, &transfer_config, cancel).await?;
            if summary.total_failures() > 0 {
                println!(
                    "⚠️ {} item(s) could not be transferred; see the summary above.",
                    summary.total_failures()
                );
            }
        }
    }
    Ok(())
}

/// Cancels `cancel` on the first interrupt so the transfer stops before its
/// next request. Returns true when a second interrupt asks for a hard exit.
async fn watch_interrupts<S, F>(cancel: CancellationToken, mut next_signal: S) -> bool
where
    S: FnMut() -> F,
    F: Future<Output = std::io::Result<()>>,
{
    if next_signal().await.is_err() {
        return false;
    }
    println!("\n⚠️ Interrupt received, finishing the current request... (press Ctrl-C again to quit now)");
    cancel.cancel();
    next_signal().await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition_is_valid() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_transfer_arguments_parse() {
        let cli = Cli::try_parse_from([
            "reddit-transfer",
            "transfer",
            "u/old",
            "new",
            "--strategy",
            "diff",
            "--dry-run",
            "--skip",
            "preferences",
            "--skip",
            "friends",
        ])
        .expect("valid arguments");

        match cli.command {
            Commands::Transfer {
                old_username,
                new_username,
                strategy,
                dry_run,
                skip,
            } => {
                assert_eq!(old_username, "u/old");
                assert_eq!(new_username, "new");
                assert_eq!(strategy, Some(Strategy::Diff));
                assert!(dry_run);
                assert_eq!(skip, vec![ResourceKind::Preferences, ResourceKind::Friends]);
            }
            other => panic!("unexpected command {:?}", other),
        }
    }

    #[test]
    fn test_transfer_requires_both_accounts() {
        assert!(Cli::try_parse_from(["reddit-transfer", "transfer", "old"]).is_err());
    }

    #[tokio::test]
    async fn test_first_interrupt_cancels_second_forces_exit() {
        let cancel = CancellationToken::new();
        let forced = watch_interrupts(cancel.clone(), || async { Ok(()) }).await;
        assert!(cancel.is_cancelled());
        assert!(forced);
    }

    #[tokio::test]
    async fn test_failed_signal_listener_never_forces_exit() {
        let cancel = CancellationToken::new();
        let mut calls = 0;
        let forced = watch_interrupts(cancel.clone(), || {
            calls += 1;
            let result = if calls == 1 {
                Ok(())
            } else {
                Err(std::io::Error::other("listener closed"))
            };
            async move { result }
        })
        .await;
        assert!(cancel.is_cancelled());
        assert!(!forced);

        let untouched = CancellationToken::new();
        let forced = watch_interrupts(untouched.clone(), || async {
            Err(std::io::Error::other("no signal support"))
        })
        .await;
        assert!(!untouched.is_cancelled());
        assert!(!forced);
    }
}
