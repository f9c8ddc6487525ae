//! Email reports for violation checks.
//!
//! This crate provides:
//! - `EmailTransport` trait for pluggable delivery
//! - EmailJS (HTTP) and SMTP transport implementations
//! - `EmailNotifier`, the best-effort send wrapper the scheduler uses
//! - Minijinja rendering of the violation report

pub mod emailjs;
pub mod notifier;
pub mod report;
pub mod smtp;
pub mod traits;

pub use notifier::EmailNotifier;
pub use report::{render_report, text_to_html, Report};
pub use traits::{EmailMessage, EmailTransport, NotifyError};
