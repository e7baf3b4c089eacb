//! Session supervisor
//!
//! Runs each session as its own tokio task. Commands reach a runner through an
//! mpsc channel and status flows back through a watch channel; nothing is
//! shared between sessions.

use crate::error::{SessionError, SupervisorError};
use crate::session::status::{CyclePhase, SessionStatus};
use crate::session::{CycleReport, Session};
use crate::types::SessionID;
use chrono::Utc;
use std::collections::BTreeMap;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

const COMMAND_BUFFER: usize = 16;

/// Result delivered to a flush caller
pub type FlushResult = Result<CycleReport, SupervisorError>;

enum Command {
    Flush(oneshot::Sender<FlushResult>),
    Pause,
    Resume,
}

struct SessionHandle {
    commands: mpsc::Sender<Command>,
    status: watch::Receiver<SessionStatus>,
    terminate: watch::Sender<bool>,
    task: JoinHandle<()>,
}

/// Owner of all running sessions
#[derive(Default)]
pub struct Supervisor {
    sessions: BTreeMap<SessionID, SessionHandle>,
}

impl Supervisor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start cycling a session every `poll_interval`
    ///
    /// The first cycle runs immediately unless `paused` is set.
    pub fn start(
        &mut self,
        session: Session,
        poll_interval: Duration,
        paused: bool,
    ) -> Result<SessionID, SupervisorError> {
        let id = session.id().clone();
        if self.sessions.contains_key(&id) {
            return Err(SupervisorError::Duplicate(id));
        }

        let mut initial = SessionStatus::new(id.clone(), session.alpha().describe(), session.beta().describe());
        initial.paused = paused;
        let (status_tx, status_rx) = watch::channel(initial);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (terminate_tx, terminate_rx) = watch::channel(false);

        let runner = Runner {
            session,
            poll_interval,
            paused,
            status: status_tx,
            commands: command_rx,
            terminate: terminate_rx,
        };
        let task = tokio::spawn(runner.run());

        info!(session = %id, "Session started");
        self.sessions.insert(
            id.clone(),
            SessionHandle {
                commands: command_tx,
                status: status_rx,
                terminate: terminate_tx,
                task,
            },
        );
        Ok(id)
    }

    fn handle(&self, id: &str) -> Result<&SessionHandle, SupervisorError> {
        self.sessions
            .get(id)
            .ok_or_else(|| SupervisorError::UnknownSession(id.to_string()))
    }

    async fn send(&self, id: &str, command: Command) -> Result<(), SupervisorError> {
        self.handle(id)?
            .commands
            .send(command)
            .await
            .map_err(|_| SupervisorError::Stopped(id.to_string()))
    }

    /// Run a cycle now and wait for its outcome
    pub async fn flush(&self, id: &str) -> FlushResult {
        let (reply, outcome) = oneshot::channel();
        self.send(id, Command::Flush(reply)).await?;
        outcome
            .await
            .map_err(|_| SupervisorError::Stopped(id.to_string()))?
    }

    pub async fn pause(&self, id: &str) -> Result<(), SupervisorError> {
        self.send(id, Command::Pause).await
    }

    pub async fn resume(&self, id: &str) -> Result<(), SupervisorError> {
        self.send(id, Command::Resume).await
    }

    /// Stop a session, cancelling any cycle in progress
    pub async fn terminate(&mut self, id: &str) -> Result<SessionStatus, SupervisorError> {
        let handle = self
            .sessions
            .remove(id)
            .ok_or_else(|| SupervisorError::UnknownSession(id.to_string()))?;
        let _ = handle.terminate.send(true);
        if let Err(e) = handle.task.await {
            error!(session = %id, error = %e, "Session task failed");
        }
        info!(session = %id, "Session terminated");
        let status = handle.status.borrow().clone();
        Ok(status)
    }

    pub fn status(&self, id: &str) -> Result<SessionStatus, SupervisorError> {
        Ok(self.handle(id)?.status.borrow().clone())
    }

    /// Status receiver for observing a session
    pub fn subscribe(&self, id: &str) -> Result<watch::Receiver<SessionStatus>, SupervisorError> {
        Ok(self.handle(id)?.status.clone())
    }

    /// Status of every session, ordered by identifier
    pub fn list(&self) -> Vec<SessionStatus> {
        self.sessions
            .values()
            .map(|handle| handle.status.borrow().clone())
            .collect()
    }

    /// Terminate every session
    pub async fn shutdown(&mut self) {
        let ids: Vec<SessionID> = self.sessions.keys().cloned().collect();
        for id in ids {
            let _ = self.terminate(&id).await;
        }
    }
}

struct Runner {
    session: Session,
    poll_interval: Duration,
    paused: bool,
    status: watch::Sender<SessionStatus>,
    commands: mpsc::Receiver<Command>,
    terminate: watch::Receiver<bool>,
}

impl Runner {
    async fn run(mut self) {
        let mut cycle_due = !self.paused;
        loop {
            if cycle_due && !self.paused {
                match self.cycle().await {
                    Some(_) => {}
                    None => break,
                }
            }
            cycle_due = false;

            tokio::select! {
                _ = self.terminate.changed() => break,
                command = self.commands.recv() => match command {
                    None => break,
                    Some(Command::Pause) => {
                        self.paused = true;
                        self.status.send_modify(|s| s.paused = true);
                    }
                    Some(Command::Resume) => {
                        self.paused = false;
                        self.status.send_modify(|s| {
                            s.paused = false;
                            if s.state == CyclePhase::Halted {
                                s.state = CyclePhase::Idle;
                            }
                        });
                        cycle_due = true;
                    }
                    Some(Command::Flush(reply)) => {
                        match self.cycle().await {
                            Some(outcome) => {
                                let _ = reply.send(outcome);
                            }
                            None => break,
                        }
                    }
                },
                _ = tokio::time::sleep(self.poll_interval), if !self.paused => {
                    cycle_due = true;
                }
            }
        }
        self.status.send_modify(|s| s.state = CyclePhase::Terminated);
    }

    /// Run one cycle; None when termination was requested mid-cycle
    async fn cycle(&mut self) -> Option<FlushResult> {
        let status = &self.status;
        let observe = |phase: CyclePhase| status.send_modify(|s| s.state = phase);

        let outcome = tokio::select! {
            result = self.session.run_cycle_observed(&observe) => result,
            _ = self.terminate.changed() => return None,
        };

        match outcome {
            Ok(report) => {
                self.status.send_modify(|s| {
                    s.state = CyclePhase::Idle;
                    s.alpha.connected = true;
                    s.beta.connected = true;
                    s.last_error = None;
                    s.conflicts = report.conflicts.clone();
                    s.cycles_completed += 1;
                    s.last_cycle = Some(Utc::now());
                });
                Some(Ok(report))
            }
            Err(e) => {
                let halting = e.is_halting();
                self.record_failure(&e, halting);
                if halting {
                    self.paused = true;
                }
                Some(Err(SupervisorError::Cycle(e.to_string())))
            }
        }
    }

    fn record_failure(&self, e: &SessionError, halting: bool) {
        let session = self.session.id().clone();
        if halting {
            error!(session = %session, error = %e, "Session halted");
        } else {
            warn!(session = %session, error = %e, "Cycle failed, retrying next cycle");
        }
        let disconnected = e.is_disconnect();
        self.status.send_modify(|s| {
            s.last_error = Some(e.to_string());
            s.state = if halting { CyclePhase::Halted } else { CyclePhase::Idle };
            if halting {
                s.paused = true;
            }
            match disconnected {
                Some("alpha") => s.alpha.connected = false,
                Some("beta") => s.beta.connected = false,
                _ => {}
            }
        });
    }
}
