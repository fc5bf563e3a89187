//! `gotify-slack doctor`: config validation and connectivity audit.
//!
//! Prints a structured report with `[ok]`, `[warn]`, `[fail]`, `[skip]`, or
//! `[info]` status indicators per item.

use std::path::Path;

use {
    anyhow::{Result, bail},
    gotify_slack_bridge::SlackService,
    gotify_slack_config::{AppConfig, Severity, ValidationResult, validate},
    gotify_slack_gotify::GotifyNotifier,
    gotify_slack_slack::SlackRtmService,
    secrecy::ExposeSecret,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Status {
    Ok,
    Warn,
    Fail,
    Skip,
    Info,
}

impl Status {
    /// `[label]`, colored for the terminal.
    fn tag(self) -> String {
        let (label, sgr) = match self {
            Self::Ok => ("ok", "32"),
            Self::Warn => ("warn", "33"),
            Self::Fail => ("fail", "31"),
            Self::Skip => ("skip", "2"),
            Self::Info => ("info", "36"),
        };
        format!("[\x1b[{sgr}m{label}\x1b[0m]")
    }
}

impl From<Severity> for Status {
    fn from(severity: Severity) -> Self {
        match severity {
            Severity::Error => Self::Fail,
            Severity::Warning => Self::Warn,
            Severity::Info => Self::Info,
        }
    }
}

struct Section {
    title: String,
    items: Vec<(Status, String)>,
}

impl Section {
    fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            items: Vec::new(),
        }
    }

    fn push(&mut self, status: Status, message: impl Into<String>) {
        self.items.push((status, message.into()));
    }
}

fn render(sections: &[Section]) -> String {
    let mut out = String::new();
    for section in sections {
        out.push_str(&section.title);
        out.push('\n');
        for (status, message) in &section.items {
            out.push_str(&format!("  {}  {message}\n", status.tag()));
        }
        out.push('\n');
    }
    out
}

fn tally(sections: &[Section], status: Status) -> usize {
    sections
        .iter()
        .flat_map(|s| &s.items)
        .filter(|(st, _)| *st == status)
        .count()
}

pub async fn handle_doctor(path: Option<&Path>, verbose: bool, offline: bool) -> Result<()> {
    eprintln!("gotify-slack doctor\n");

    let result = validate::validate(path);
    let mut sections = vec![check_config(&result, verbose)];

    let config = match result.config_path.as_deref() {
        Some(p) if !result.has_errors() => gotify_slack_config::load_config(p).unwrap_or_default(),
        _ => AppConfig::default(),
    };

    sections.push(check_gotify(&config));
    sections.push(if offline {
        let mut section = Section::new("Slack");
        section.push(Status::Skip, "token check skipped (--offline)");
        section
    } else {
        check_slack(&SlackRtmService::new(), &config).await
    });

    if verbose {
        eprintln!(
            "{}\n",
            serde_json::to_string_pretty(&gotify_slack_config::redacted(&config))?
        );
    }

    eprint!("{}", render(&sections));
    let errors = tally(&sections, Status::Fail);
    let warnings = tally(&sections, Status::Warn);
    eprintln!("Summary: {errors} error(s), {warnings} warning(s)");

    if errors > 0 {
        bail!("doctor found {errors} error(s)");
    }
    Ok(())
}

fn check_config(result: &ValidationResult, verbose: bool) -> Section {
    let label = result
        .config_path
        .as_ref()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "defaults".into());
    let mut section = Section::new(format!("Config ({label})"));

    let syntax_errors: Vec<_> = result
        .diagnostics
        .iter()
        .filter(|d| d.category == "syntax" && d.severity == Severity::Error)
        .collect();
    if !syntax_errors.is_empty() {
        for d in syntax_errors {
            section.push(Status::Fail, d.message.clone());
        }
        return section;
    }
    if result.config_path.is_some() {
        section.push(Status::Ok, "Syntax valid");
    }

    if !result.diagnostics.iter().any(|d| d.category == "unknown-field") {
        section.push(Status::Ok, "All fields recognized");
    }

    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }
        let msg = if d.path.is_empty() {
            d.message.clone()
        } else {
            format!("{}: {}", d.path, d.message)
        };
        section.push(d.severity.into(), msg);
    }

    section
}

fn check_gotify(config: &AppConfig) -> Section {
    let mut section = Section::new("Gotify");
    match GotifyNotifier::new(&config.gotify.url, config.gotify.token.clone()) {
        Ok(notifier) => section.push(Status::Ok, format!("Endpoint {}", notifier.endpoint())),
        Err(e) => section.push(Status::Fail, e.to_string()),
    }
    if config.gotify.token.expose_secret().is_empty() {
        section.push(Status::Fail, "Application token missing");
    }
    section
}

async fn check_slack(slack: &dyn SlackService, config: &AppConfig) -> Section {
    let mut section = Section::new("Slack");
    if !config.slack.has_token() {
        section.push(Status::Skip, "No token configured");
    } else if slack.validate(&config.slack.token).await {
        section.push(Status::Ok, "Token accepted by auth.test");
    } else {
        section.push(Status::Fail, "Token rejected by auth.test");
    }
    section
}
