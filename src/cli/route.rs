//! CLI route: dispatches parsed commands to the engine.

use crate::cli::bench::{format_bench_text, run_bench};
use crate::cli::parse::Commands;
use crate::config::TwinsyncConfig;
use crate::endpoint::{Endpoint, LocalEndpoint};
use crate::error::CliError;
use crate::session::status::{format_conflicts_table, format_session_status_text, SessionStatus};
use crate::session::{session_id, CycleReport, Session, Supervisor};
use crate::store::{SledStateStore, StateStore};
use crate::tree::walker::normalize_root;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

/// Everything a command needs to run
pub struct RunContext {
    config: TwinsyncConfig,
}

impl RunContext {
    pub fn new(config: TwinsyncConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &TwinsyncConfig {
        &self.config
    }

    fn open_store(&self) -> Result<Arc<SledStateStore>, CliError> {
        Ok(Arc::new(SledStateStore::new(&self.config.storage.state_dir)?))
    }

    /// Execute a command, returning the text to print
    pub async fn execute(&self, command: &Commands) -> Result<String, CliError> {
        match command {
            Commands::Sync {
                alpha,
                beta,
                once,
                ignores,
                format,
            } => {
                validate_format(format)?;
                self.sync(alpha, beta, *once, ignores, format == "json").await
            }
            Commands::Sessions => {
                let store = self.open_store()?;
                let sessions = store.sessions()?;
                if sessions.is_empty() {
                    return Ok("No sessions.".to_string());
                }
                Ok(sessions.join("\n"))
            }
            Commands::Forget { session } => {
                let store = self.open_store()?;
                store.remove(session)?;
                Ok(format!("Forgot session {}", session))
            }
            Commands::Config => toml::to_string_pretty(&self.config)
                .map_err(|e| CliError::Invalid(format!("failed to render configuration: {}", e))),
            Commands::Bench {
                path,
                ignores,
                format,
            } => {
                validate_format(format)?;
                let mut settings = self.config.sync.clone();
                settings.ignores.extend(ignores.iter().cloned());
                let path = path.clone();
                let report = tokio::task::spawn_blocking(move || run_bench(&path, &settings))
                    .await
                    .map_err(|e| CliError::Invalid(e.to_string()))??;
                if format == "json" {
                    serde_json::to_string_pretty(&report).map_err(|e| CliError::Invalid(e.to_string()))
                } else {
                    Ok(format_bench_text(&report))
                }
            }
        }
    }

    fn build_session(&self, alpha: &Path, beta: &Path, ignores: &[String]) -> Result<Session, CliError> {
        let mut settings = self.config.sync.clone();
        settings.ignores.extend(ignores.iter().cloned());
        settings.validate()?;

        let alpha_root = normalize_root(alpha);
        let beta_root = normalize_root(beta);
        if alpha_root == beta_root {
            return Err(CliError::Invalid(
                "alpha and beta must be different locations".to_string(),
            ));
        }

        let hasher = settings.hash_algorithm.hasher();
        let options = settings.scan_options()?;
        let alpha: Arc<dyn Endpoint> = Arc::new(LocalEndpoint::new(&alpha_root, Arc::clone(&hasher), options.clone()));
        let beta: Arc<dyn Endpoint> = Arc::new(LocalEndpoint::new(&beta_root, Arc::clone(&hasher), options));
        let id = session_id(&alpha.describe(), &beta.describe());
        let store: Arc<dyn StateStore> = self.open_store()?;
        Ok(Session::new(id, alpha, beta, hasher, store))
    }

    async fn sync(
        &self,
        alpha: &Path,
        beta: &Path,
        once: bool,
        ignores: &[String],
        json: bool,
    ) -> Result<String, CliError> {
        let mut session = self.build_session(alpha, beta, ignores)?;

        if once {
            let report = session.run_cycle().await?;
            return if json {
                serde_json::to_string_pretty(&report).map_err(|e| CliError::Invalid(e.to_string()))
            } else {
                Ok(format_cycle_report(&report))
            };
        }

        let mut supervisor = Supervisor::new();
        let id = supervisor.start(session, self.config.sync.poll_interval(), false)?;
        let mut updates = supervisor.subscribe(&id)?;
        info!(session = %id, "Synchronizing until interrupted");

        let mut last_printed: Option<SessionStatus> = None;
        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let status = updates.borrow_and_update().clone();
                    if should_print(last_printed.as_ref(), &status) {
                        println!("{}", render_status(&status, json)?);
                        last_printed = Some(status);
                    }
                }
            }
        }

        let status = supervisor.terminate(&id).await?;
        render_status(&status, json)
    }
}

fn validate_format(format: &str) -> Result<(), CliError> {
    if format != "text" && format != "json" {
        return Err(CliError::Invalid(format!(
            "Invalid output format: {} (must be 'text' or 'json')",
            format
        )));
    }
    Ok(())
}

/// Print only when a cycle finished or the error/pause state changed
fn should_print(previous: Option<&SessionStatus>, current: &SessionStatus) -> bool {
    match previous {
        None => current.cycles_completed > 0 || current.last_error.is_some(),
        Some(previous) => {
            previous.cycles_completed != current.cycles_completed
                || previous.last_error != current.last_error
                || previous.paused != current.paused
        }
    }
}

fn render_status(status: &SessionStatus, json: bool) -> Result<String, CliError> {
    if json {
        status.to_json().map_err(|e| CliError::Invalid(e.to_string()))
    } else {
        Ok(format_session_status_text(status))
    }
}

/// Format a single cycle as human-readable text
pub fn format_cycle_report(report: &CycleReport) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "Alpha: scanned {} files ({} hashed), applied {} operations\n",
        report.alpha_scan.files,
        report.alpha_scan.hashed,
        report.alpha_applied.operations()
    ));
    out.push_str(&format!(
        "Beta: scanned {} files ({} hashed), applied {} operations\n",
        report.beta_scan.files,
        report.beta_scan.hashed,
        report.beta_applied.operations()
    ));
    if report.conflicts.is_empty() {
        out.push_str("No conflicts.\n");
    } else {
        out.push_str(&format!("{} conflicts:\n", report.conflicts.len()));
        out.push_str(&format!("{}\n", format_conflicts_table(&report.conflicts)));
    }
    out
}
