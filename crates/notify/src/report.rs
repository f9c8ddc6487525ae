//! Minijinja rendering of the post-check violation report.
//!
//! The report lists address, description and status for each new
//! violation, or a fixed message when the check found nothing new. The
//! HTML variant is the plain text with markup characters escaped and line
//! breaks mapped to `<br>`.

use serde::Serialize;

use vwatch_core::ViolationRecord;

use crate::traits::NotifyError;

/// Body used when a check surfaced no new violations.
pub const NO_NEW_VIOLATIONS: &str = "No new violations were found for your saved addresses.";

const REPORT_TEMPLATE: &str = "\
{% if violations %}
{{ violations|length }} new violation{% if violations|length != 1 %}s{% endif %} found:
{% for v in violations %}

Address: {{ v.address }}
Description: {{ v.description or \"Not provided\" }}
Status: {{ v.status or \"Unknown\" }}
{% endfor %}
{% else %}
{{ no_new }}
{% endif %}";

/// A rendered report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Report {
    pub subject: String,
    pub text: String,
}

impl Report {
    pub fn html(&self) -> String {
        text_to_html(&self.text)
    }
}

#[derive(Serialize)]
struct ReportContext<'a> {
    violations: &'a [ViolationRecord],
    no_new: &'a str,
}

fn build_env() -> minijinja::Environment<'static> {
    let mut env = minijinja::Environment::new();
    env.set_trim_blocks(true);
    env
}

/// Render the report for the violations a check found to be new.
pub fn render_report(violations: &[ViolationRecord]) -> Result<Report, NotifyError> {
    let env = build_env();
    let ctx = ReportContext {
        violations,
        no_new: NO_NEW_VIOLATIONS,
    };
    let text = env
        .render_str(REPORT_TEMPLATE, &ctx)
        .map_err(|e| NotifyError::Template(e.to_string()))?;

    let subject = match violations.len() {
        0 => "Pittsburgh violation check: no new violations".to_string(),
        1 => "Pittsburgh violation check: 1 new violation".to_string(),
        n => format!("Pittsburgh violation check: {n} new violations"),
    };

    Ok(Report { subject, text })
}

/// Minimal HTML rendering of a plain-text body.
pub fn text_to_html(text: &str) -> String {
    let mut html = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        match ch {
            '&' => html.push_str("&amp;"),
            '<' => html.push_str("&lt;"),
            '>' => html.push_str("&gt;"),
            '\r' => {}
            '\n' => html.push_str("<br>"),
            c => html.push(c),
        }
    }
    html
}
