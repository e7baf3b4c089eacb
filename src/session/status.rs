//! Session status reporting

use crate::sync::change::Conflict;
use crate::types::SessionID;
use chrono::{DateTime, Utc};
use comfy_table::presets::UTF8_BORDERS_ONLY;
use comfy_table::Table;
use owo_colors::OwoColorize;
use serde::{Deserialize, Serialize};
use std::fmt;

/// What a session is currently doing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CyclePhase {
    /// Waiting for the next cycle
    Idle,
    Connecting,
    Scanning,
    Reconciling,
    Transitioning,
    Saving,
    /// Stopped on an error that needs user action
    Halted,
    Terminated,
}

impl fmt::Display for CyclePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let description = match self {
            CyclePhase::Idle => "Watching for changes",
            CyclePhase::Connecting => "Connecting to endpoints",
            CyclePhase::Scanning => "Scanning files",
            CyclePhase::Reconciling => "Reconciling changes",
            CyclePhase::Transitioning => "Applying changes",
            CyclePhase::Saving => "Saving archive",
            CyclePhase::Halted => "Halted on error",
            CyclePhase::Terminated => "Terminated",
        };
        f.write_str(description)
    }
}

/// Connection state of one endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointStatus {
    pub location: String,
    pub connected: bool,
}

/// Externally visible state of a session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionStatus {
    pub session: SessionID,
    pub state: CyclePhase,
    pub paused: bool,
    pub alpha: EndpointStatus,
    pub beta: EndpointStatus,
    pub last_error: Option<String>,
    pub conflicts: Vec<Conflict>,
    pub cycles_completed: u64,
    pub last_cycle: Option<DateTime<Utc>>,
}

impl SessionStatus {
    pub fn new(session: SessionID, alpha: String, beta: String) -> Self {
        Self {
            session,
            state: CyclePhase::Idle,
            paused: false,
            alpha: EndpointStatus {
                location: alpha,
                connected: false,
            },
            beta: EndpointStatus {
                location: beta,
                connected: false,
            },
            last_error: None,
            conflicts: Vec::new(),
            cycles_completed: 0,
            last_cycle: None,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

/// Format a section heading with bold/underline.
pub fn format_section_heading(title: &str) -> String {
    format!("{}", title.bold().underline())
}

fn format_endpoint(label: &str, endpoint: &EndpointStatus) -> String {
    let connection = if endpoint.connected {
        format!("{}", "Connected".green())
    } else {
        format!("{}", "Disconnected".yellow())
    };
    format!("  {}: {} ({})\n", label, endpoint.location, connection)
}

/// Format session status as human-readable text.
pub fn format_session_status_text(status: &SessionStatus) -> String {
    let mut out = String::new();
    let mut heading = format!("Session {}", status.session);
    if status.paused {
        heading.push_str(" [Paused]");
    }
    out.push_str(&format!("{}\n", format_section_heading(&heading)));
    out.push_str(&format_endpoint("Alpha", &status.alpha));
    out.push_str(&format_endpoint("Beta", &status.beta));
    out.push_str(&format!("  Status: {}\n", status.state));
    out.push_str(&format!("  Cycles: {}\n", status.cycles_completed));
    if let Some(last_cycle) = status.last_cycle {
        out.push_str(&format!("  Last cycle: {}\n", last_cycle.to_rfc3339()));
    }
    if let Some(ref error) = status.last_error {
        out.push_str(&format!("  Last error: {}\n", error.red()));
    }

    if !status.conflicts.is_empty() {
        out.push_str(&format!("\n{}\n\n", format_section_heading("Conflicts")));
        out.push_str(&format!("{}\n", format_conflicts_table(&status.conflicts)));
    }
    out
}

/// Conflicts as a table with one row per conflicting path
pub fn format_conflicts_table(conflicts: &[Conflict]) -> Table {
    let mut table = Table::new();
    table.load_preset(UTF8_BORDERS_ONLY);
    table.set_header(vec!["Path", "Alpha", "Beta"]);
    for conflict in conflicts {
        let at = if conflict.path.is_empty() {
            "<root>".to_string()
        } else {
            conflict.path.clone()
        };
        table.add_row(vec![
            at,
            Conflict::summarize(&conflict.alpha_changes),
            Conflict::summarize(&conflict.beta_changes),
        ]);
    }
    table
}
