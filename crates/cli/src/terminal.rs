use std::io::{self, Write};

use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use crossterm::{
    execute,
    style::{Color, Print, ResetColor, SetForegroundColor},
};

use vwatch_core::{ScheduleSettings, ViolationRecord};
use vwatch_scheduler::time::to_local;
use vwatch_scheduler::{CheckOutcome, EmailOutcome, RecoveryAction};

/// Color scheme for terminal output.
struct Colors;

impl Colors {
    const HEADER: Color = Color::Magenta;
    const ADDRESS: Color = Color::Cyan;
    const OK: Color = Color::Green;
    const WARN: Color = Color::Yellow;
    const ERROR: Color = Color::Red;
    const DIM: Color = Color::DarkGrey;
}

/// Human-readable output for CLI commands.
pub struct Terminal;

impl Terminal {
    pub fn new() -> Self {
        Self
    }

    fn colored(&self, color: Color, text: &str) -> Result<()> {
        let mut stdout = io::stdout();
        execute!(stdout, SetForegroundColor(color), Print(text), ResetColor)?;
        stdout.flush()?;
        Ok(())
    }

    pub fn print_info(&self, message: &str) -> Result<()> {
        self.colored(Colors::DIM, &format!("{message}\n"))
    }

    pub fn print_ok(&self, message: &str) -> Result<()> {
        self.colored(Colors::OK, &format!("{message}\n"))
    }

    pub fn print_warning(&self, message: &str) -> Result<()> {
        self.colored(Colors::WARN, &format!("{message}\n"))
    }

    pub fn print_error(&self, message: &str) -> Result<()> {
        let mut stderr = io::stderr();
        execute!(
            stderr,
            SetForegroundColor(Colors::ERROR),
            Print(format!("error: {message}\n")),
            ResetColor,
        )?;
        Ok(())
    }

    pub fn print_violations(&self, records: &[ViolationRecord]) -> Result<()> {
        if records.is_empty() {
            return self.print_info("No violations found.");
        }
        for r in records {
            self.colored(Colors::ADDRESS, &format!("{}  ", r.address))?;
            self.colored(Colors::DIM, &format!("[{}]", r.id))?;
            println!();
            println!(
                "    {}",
                r.description.as_deref().unwrap_or("(no description)")
            );
            let mut meta = Vec::new();
            if let Some(status) = &r.status {
                meta.push(format!("status: {status}"));
            }
            if let Some(date) = &r.investigation_date {
                meta.push(format!("investigated: {date}"));
            }
            if !meta.is_empty() {
                self.colored(Colors::DIM, &format!("    {}\n", meta.join(", ")))?;
            }
        }
        Ok(())
    }

    pub fn print_outcome(&self, outcome: &CheckOutcome) -> Result<()> {
        match outcome {
            CheckOutcome::Skipped => {
                self.print_warning("No saved addresses; add some with `vwatch addresses add`.")
            }
            CheckOutcome::Abandoned { reason } => {
                self.print_error(&format!("check abandoned: {reason}"))
            }
            CheckOutcome::Completed {
                checked,
                new_violations,
                email,
            } => {
                self.colored(
                    Colors::HEADER,
                    &format!(
                        "Checked {checked} address(es): {} new violation(s)\n",
                        new_violations.len()
                    ),
                )?;
                if !new_violations.is_empty() {
                    self.print_violations(new_violations)?;
                }
                match email {
                    EmailOutcome::Sent => self.print_ok("Report emailed."),
                    EmailOutcome::Failed => {
                        self.print_error("the email report could not be sent; see logs")
                    }
                    EmailOutcome::NotRequested => Ok(()),
                }
            }
        }
    }

    pub fn print_next_check(&self, due: DateTime<Utc>, tz: Tz) -> Result<()> {
        self.print_ok(&format!(
            "Next check: {} ({})",
            due.with_timezone(&tz).format("%Y-%m-%d %H:%M %Z"),
            to_local(due).format("%Y-%m-%d %H:%M %:z local")
        ))
    }

    pub fn print_recovery(&self, action: &RecoveryAction, tz: Tz) -> Result<()> {
        match action {
            RecoveryAction::Disabled => {
                self.print_info("Daily checks are disabled; run `vwatch enable` to turn them on.")
            }
            RecoveryAction::FiredImmediately { outcome, next } => {
                self.print_warning("A scheduled check was missed; ran it now.")?;
                self.print_outcome(outcome)?;
                self.print_next_check(*next, tz)
            }
            RecoveryAction::Rearmed { due } | RecoveryAction::Scheduled { due } => {
                self.print_next_check(*due, tz)
            }
        }
    }

    pub fn print_status(
        &self,
        settings: &ScheduleSettings,
        remote_reachable: Option<bool>,
        address_count: Option<usize>,
        tz: Tz,
    ) -> Result<()> {
        self.colored(Colors::HEADER, "vwatch status\n")?;

        let remote = match remote_reachable {
            None => "not configured (local files)".to_string(),
            Some(true) => "reachable".to_string(),
            Some(false) => "unreachable (showing local cache)".to_string(),
        };
        println!("  settings store: {remote}");
        println!(
            "  daily checks:   {}",
            if settings.checks_enabled { "on" } else { "off" }
        );
        match settings.next_check_at {
            Some(due) => println!(
                "  next check:     {} / {}",
                due.with_timezone(&tz).format("%Y-%m-%d %H:%M %Z"),
                to_local(due).format("%Y-%m-%d %H:%M %:z local")
            ),
            None => println!("  next check:     none"),
        }
        let email = match (settings.email_enabled, settings.email_address.as_str()) {
            (_, "") => "no address set".to_string(),
            (true, addr) => format!("on, to {addr}"),
            (false, addr) => format!("off ({addr})"),
        };
        println!("  email reports:  {email}");
        match address_count {
            Some(n) => println!("  saved addresses: {n}"),
            None => println!("  saved addresses: unavailable"),
        }
        Ok(())
    }
}
