//! Terminal rendering of the application state.
//!
//! The popup-style UI is reduced to a `Screen` view model that the
//! orchestrator mutates and a single `render` pass that prints it. No
//! global element cache: state flows in explicitly.

use chrono::{DateTime, NaiveDateTime};
use console::style;

/// The three user-visible application states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum View {
    /// Unregistered.
    Initial,
    /// Registered, awaiting email verification.
    Pending,
    /// Verified.
    Main,
}

impl Default for View {
    fn default() -> Self {
        Self::Initial
    }
}

/// Severity of a transient message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Level {
    Info,
    Success,
    Error,
}

/// A transient user-facing message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message {
    pub level: Level,
    pub text: String,
}

/// One row of the rendered device list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceRow {
    pub identifier: String,
    pub created_at: String,
    pub is_current: bool,
}

/// Everything the terminal shows after an action completes.
#[derive(Debug, Clone, Default)]
pub struct Screen {
    pub view: View,
    pub email: Option<String>,
    pub messages: Vec<Message>,
    /// Raw ISO timestamps of the saved review schedule.
    pub schedule: Option<Vec<String>>,
    pub devices: Option<Vec<DeviceRow>>,
}

impl Screen {
    pub fn show_view(&mut self, view: View) {
        self.view = view;
    }

    pub fn info(&mut self, text: impl Into<String>) {
        self.push(Level::Info, text.into());
    }

    pub fn success(&mut self, text: impl Into<String>) {
        self.push(Level::Success, text.into());
    }

    pub fn error(&mut self, text: impl Into<String>) {
        self.push(Level::Error, text.into());
    }

    /// Drop the transient result sections (schedule, device list).
    pub fn clear_results(&mut self) {
        self.schedule = None;
        self.devices = None;
        self.email = None;
    }

    fn push(&mut self, level: Level, text: String) {
        self.messages.push(Message { level, text });
    }
}

/// Print the screen to stdout.
pub fn render(screen: &Screen) {
    match screen.view {
        View::Initial => {
            println!("{}", style("Not registered.").dim());
            println!("Run `restudy register <email>` to get started.");
        }
        View::Pending => {
            let email = screen.email.as_deref().unwrap_or("(unknown)");
            println!("Registered as {}.", style(email).bold());
            println!("Check your inbox for the verification link, then run `restudy check-auth`.");
        }
        View::Main => {
            let email = screen.email.as_deref().unwrap_or("(unknown)");
            println!("Signed in as {}.", style(email).bold());
        }
    }

    if let Some(schedule) = &screen.schedule {
        println!();
        println!("{}", style("Review schedule:").bold());
        for raw in schedule {
            println!("  - {}", format_date(raw));
        }
    }

    if let Some(devices) = &screen.devices {
        println!();
        println!("{}", style("Devices:").bold());
        if devices.is_empty() {
            println!("  (none)");
        }
        for row in devices {
            let marker = if row.is_current {
                format!("  {}", style("(current device)").green())
            } else {
                String::new()
            };
            println!(
                "  {}  registered {}{}",
                short_identifier(&row.identifier),
                format_date(&row.created_at),
                marker
            );
        }
    }

    for message in &screen.messages {
        let prefix = match message.level {
            Level::Info => style("i").cyan(),
            Level::Success => style("ok").green(),
            Level::Error => style("error").red(),
        };
        println!("[{prefix}] {}", message.text);
    }
}

/// Render an ISO timestamp as `YYYY-MM-DD HH:MM`.
///
/// The server emits zone-less `LocalDateTime` strings; RFC 3339 inputs are
/// accepted too. Unparseable input is shown as-is.
pub fn format_date(raw: &str) -> String {
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return dt.format("%Y-%m-%d %H:%M").to_string();
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return dt.format("%Y-%m-%d %H:%M").to_string();
    }
    raw.to_string()
}

/// Opaque device tokens are long; show a 20-character prefix.
fn short_identifier(identifier: &str) -> String {
    let prefix: String = identifier.chars().take(20).collect();
    if prefix.len() < identifier.len() {
        format!("{prefix}...")
    } else {
        prefix
    }
}
