//! Subcommand handlers.

use std::time::Duration;

use anyhow::{bail, Context, Result};
use tokio::time::MissedTickBehavior;
use tracing::{debug, info};

use vwatch_core::{normalize_address, SettingsPatch};
use vwatch_store::parse_address_list;
use vwatch_wprdc::ViolationSearch;

use crate::app::App;
use crate::cli::{AddressCommand, Command, EmailCommand};
use crate::terminal::Terminal;

pub async fn dispatch(app: &App, terminal: &Terminal, command: Command) -> Result<()> {
    match command {
        Command::Run => run(app, terminal).await,
        Command::Check => {
            let outcome = app.orchestrator.run_saved().await;
            terminal.print_outcome(&outcome)
        }
        Command::Enable => {
            let due = app.scheduler.enable().await?;
            // The timer lives only as long as this process; a `vwatch run`
            // daemon adopts the persisted time on its next sync.
            app.scheduler.shutdown().await;
            terminal.print_next_check(due, app.scheduler.timezone())
        }
        Command::Disable => {
            app.scheduler.disable().await;
            terminal.print_ok("Daily checks disabled.")
        }
        Command::Status => status(app, terminal).await,
        Command::Reset { addresses } => {
            let remote = app.scheduler.reset().await;
            if addresses {
                app.addresses.clear().await?;
            }
            if app.settings.has_remote() && !remote {
                terminal.print_warning("Remote settings could not be reset; local cache was.")?;
            }
            terminal.print_ok("Settings reset and known violations cleared.")
        }
        Command::Search { addresses } => {
            let normalized: Vec<String> = addresses
                .iter()
                .map(|a| normalize_address(a))
                .filter(|a| !a.is_empty())
                .collect();
            if normalized.is_empty() {
                bail!("no usable address given");
            }
            let records = app.search.search(&normalized).await?;
            terminal.print_violations(&records)
        }
        Command::Addresses(cmd) => addresses(app, terminal, cmd).await,
        Command::Email(cmd) => email(app, terminal, cmd).await,
    }
}

async fn run(app: &App, terminal: &Terminal) -> Result<()> {
    let action = app.scheduler.recover_on_startup().await?;
    terminal.print_recovery(&action, app.scheduler.timezone())?;

    info!("Waiting for scheduled checks (Ctrl-C to stop)");
    let mut poll = tokio::time::interval(Duration::from_secs(app.config.schedule.settings_poll_secs));
    poll.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // The first tick completes immediately; recovery just synced.
    poll.tick().await;

    loop {
        tokio::select! {
            signal = tokio::signal::ctrl_c() => {
                signal.context("failed to listen for Ctrl-C")?;
                break;
            }
            _ = poll.tick() => {
                let status = app.scheduler.sync_with_persisted().await;
                debug!(status = ?status, "Synced schedule with persisted settings");
            }
        }
    }

    info!("Shutting down");
    app.scheduler.shutdown().await;
    Ok(())
}

async fn status(app: &App, terminal: &Terminal) -> Result<()> {
    let (settings, reachable) = match app.settings.load().await {
        Some(s) => (s, Some(true)),
        None if app.settings.has_remote() => (app.settings.load_local_cache(), Some(false)),
        None => (app.settings.load_local_cache(), None),
    };
    let address_count = app.addresses.list().await.ok().map(|a| a.len());
    terminal.print_status(&settings, reachable, address_count, app.scheduler.timezone())
}

async fn addresses(app: &App, terminal: &Terminal, cmd: AddressCommand) -> Result<()> {
    match cmd {
        AddressCommand::List => {
            let all = app.addresses.list().await?;
            if all.is_empty() {
                return terminal.print_info("No saved addresses.");
            }
            for a in all {
                println!("{a}");
            }
            Ok(())
        }
        AddressCommand::Add { addresses } => add_all(app, terminal, &addresses).await,
        AddressCommand::Remove { addresses } => {
            for a in &addresses {
                if app.addresses.remove(a).await? {
                    terminal.print_ok(&format!("Removed {}", normalize_address(a)))?;
                } else {
                    terminal.print_warning(&format!("Not saved: {a}"))?;
                }
            }
            Ok(())
        }
        AddressCommand::Import { file } => {
            let text = std::fs::read_to_string(&file)
                .with_context(|| format!("failed to read {}", file.display()))?;
            let parsed = parse_address_list(&text);
            if parsed.is_empty() {
                bail!("{} contains no addresses", file.display());
            }
            add_all(app, terminal, &parsed).await
        }
    }
}

async fn add_all(app: &App, terminal: &Terminal, addresses: &[String]) -> Result<()> {
    let mut added = 0usize;
    for a in addresses {
        if app.addresses.add(a).await? {
            added += 1;
        } else {
            terminal.print_info(&format!("Skipped (duplicate or empty): {a}"))?;
        }
    }
    terminal.print_ok(&format!("Saved {added} of {} address(es).", addresses.len()))
}

async fn email(app: &App, terminal: &Terminal, cmd: EmailCommand) -> Result<()> {
    match cmd {
        EmailCommand::Set { address } => {
            let address = address.trim().to_string();
            if !address.contains('@') {
                bail!("'{address}' does not look like an email address");
            }
            save_or_warn(
                app,
                terminal,
                SettingsPatch {
                    email_address: Some(address.clone()),
                    ..Default::default()
                },
            )
            .await?;
            terminal.print_ok(&format!("Reports will be sent to {address}."))
        }
        EmailCommand::On => {
            let current = app.settings.effective().await;
            if current.email_address.trim().is_empty() {
                bail!("set an address first with `vwatch email set <address>`");
            }
            save_or_warn(
                app,
                terminal,
                SettingsPatch {
                    email_enabled: Some(true),
                    ..Default::default()
                },
            )
            .await?;
            terminal.print_ok("Email reports on.")
        }
        EmailCommand::Off => {
            save_or_warn(
                app,
                terminal,
                SettingsPatch {
                    email_enabled: Some(false),
                    ..Default::default()
                },
            )
            .await?;
            terminal.print_ok("Email reports off.")
        }
        EmailCommand::Test { to } => {
            let to = match to {
                Some(t) => t,
                None => {
                    let current = app.settings.effective().await;
                    if current.email_address.trim().is_empty() {
                        bail!("no report address set; pass --to or run `vwatch email set`");
                    }
                    current.email_address
                }
            };
            if !app.notifier.is_enabled() {
                bail!("email is not configured (set EMAILJS_* or SMTP_*)");
            }
            if app.notifier.send_test(&to).await {
                terminal.print_ok(&format!("Test email sent to {to}."))
            } else {
                bail!("test email to {to} was not accepted; see logs")
            }
        }
    }
}

async fn save_or_warn(app: &App, terminal: &Terminal, patch: SettingsPatch) -> Result<()> {
    if !app.settings.save(&patch).await && app.settings.has_remote() {
        terminal.print_warning("Remote settings store unavailable; saved locally only.")?;
    }
    Ok(())
}
