//! Background task that owns the sync engine and reacts to control messages.
//!
//! Handles:
//! - `start`: sync now, then again every interval until paused
//! - `once`: a single cycle; continuous sync, if active, carries on after it
//! - `pause`: cancel the next scheduled cycle
//!
//! Only one cycle is ever in flight. Commands that arrive during a cycle only
//! shape what happens once it settles.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::connectivity::Connectivity;
use super::engine::{CycleReport, SyncEngine};
use super::local::LocalStore;
use super::protocol::{SyncCommand, SyncEvent, SyncTarget};
use super::scheduler::Scheduler;
use crate::config::SyncSettings;
use crate::error::{Error, Result};
use crate::remote::{Connect, RemoteError, RemoteGateway, RemoteResult};

const COMMAND_BUFFER: usize = 32;

/// What the orchestrator is doing, as seen by the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OrchestratorState {
    /// No cycle in flight and none scheduled
    Idle,
    /// A cycle is in flight, or continuous sync is waiting for its next cycle
    Running,
    /// Continuous sync was paused; nothing is scheduled
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Continuous,
    Single,
}

enum Wake {
    Command(Option<SyncCommand>),
    Timer,
}

/// Commands received while a cycle was running, folded in arrival order.
#[derive(Debug)]
struct FollowUp {
    mode: Mode,
    rerun: bool,
    pause: bool,
    closed: bool,
    endpoint: Option<String>,
    watermark: Option<DateTime<Utc>>,
}

impl FollowUp {
    const fn new(mode: Mode) -> Self {
        Self {
            mode,
            rerun: false,
            pause: false,
            closed: false,
            endpoint: None,
            watermark: None,
        }
    }

    fn absorb(&mut self, command: SyncCommand) {
        debug!("Deferring {command:?} until the running cycle settles");
        match command {
            SyncCommand::Start(target) => {
                self.mode = Mode::Continuous;
                self.pause = false;
                self.retarget(target);
            }
            SyncCommand::Once(target) => {
                self.rerun = true;
                self.pause = false;
                self.retarget(target);
            }
            SyncCommand::Pause => {
                self.mode = Mode::Single;
                self.pause = true;
                self.rerun = false;
            }
        }
    }

    fn retarget(&mut self, target: SyncTarget) {
        self.endpoint = Some(target.endpoint);
        if target.last_sync.is_some() {
            self.watermark = target.last_sync;
        }
    }
}

/// Host side of a spawned orchestrator.
pub struct OrchestratorHandle {
    commands: mpsc::Sender<SyncCommand>,
    state: watch::Receiver<OrchestratorState>,
    task: JoinHandle<()>,
}

impl OrchestratorHandle {
    pub async fn send(&self, command: SyncCommand) -> Result<()> {
        self.commands
            .send(command)
            .await
            .map_err(|_| Error::OrchestratorStopped)
    }

    /// Forward a raw JSON control message. Returns `false` if it was not recognized.
    pub async fn send_raw(&self, raw: &str) -> Result<bool> {
        match SyncCommand::parse(raw) {
            Some(command) => self.send(command).await.map(|()| true),
            None => Ok(false),
        }
    }

    pub async fn start(&self, endpoint: &str, last_sync: Option<DateTime<Utc>>) -> Result<()> {
        self.send(SyncCommand::start(endpoint, last_sync)).await
    }

    pub async fn once(&self, endpoint: &str, last_sync: Option<DateTime<Utc>>) -> Result<()> {
        self.send(SyncCommand::once(endpoint, last_sync)).await
    }

    pub async fn pause(&self) -> Result<()> {
        self.send(SyncCommand::Pause).await
    }

    pub fn state(&self) -> OrchestratorState {
        *self.state.borrow()
    }

    /// A receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<OrchestratorState> {
        self.state.clone()
    }

    /// Close the command channel and wait for the running cycle to settle.
    pub async fn shutdown(self) {
        drop(self.commands);
        if let Err(error) = self.task.await {
            warn!("Sync orchestrator task ended abnormally: {error}");
        }
    }
}

/// Spawn an orchestrator task on the current tokio runtime.
///
/// Events are delivered on the returned receiver; dropping it only discards them.
pub fn spawn<S, C, N>(
    store: S,
    connector: C,
    connectivity: N,
    settings: SyncSettings,
) -> (OrchestratorHandle, mpsc::UnboundedReceiver<SyncEvent>)
where
    S: LocalStore + 'static,
    C: Connect,
    N: Connectivity,
{
    let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
    let (event_tx, event_rx) = mpsc::unbounded_channel();
    let (state_tx, state_rx) = watch::channel(OrchestratorState::Idle);

    let orchestrator = Orchestrator {
        engine: SyncEngine::new(store, settings.clamped()),
        connector,
        connectivity,
        commands: command_rx,
        events: event_tx,
        state: state_tx,
        scheduler: Scheduler::new(),
        endpoint: None,
        watermark: None,
        link: None,
    };
    let task = tokio::spawn(orchestrator.run());

    (
        OrchestratorHandle {
            commands: command_tx,
            state: state_rx,
            task,
        },
        event_rx,
    )
}

/// Sync worker owned by a single tokio task.
pub struct Orchestrator<S, C: Connect, N> {
    engine: SyncEngine<S>,
    connector: C,
    connectivity: N,
    commands: mpsc::Receiver<SyncCommand>,
    events: mpsc::UnboundedSender<SyncEvent>,
    state: watch::Sender<OrchestratorState>,
    scheduler: Scheduler,
    endpoint: Option<String>,
    watermark: Option<DateTime<Utc>>,
    link: Option<(String, C::Gateway)>,
}

impl<S, C, N> Orchestrator<S, C, N>
where
    S: LocalStore,
    C: Connect,
    N: Connectivity,
{
    pub async fn run(mut self) {
        info!(
            "Sync orchestrator started (interval {:?})",
            self.engine.settings().interval
        );

        loop {
            let wake = tokio::select! {
                command = self.commands.recv() => Wake::Command(command),
                () = self.scheduler.fired() => Wake::Timer,
            };

            let mut next = match wake {
                Wake::Command(None) => break,
                Wake::Command(Some(command)) => self.handle(command),
                Wake::Timer => Some(Mode::Continuous),
            };

            let mut closed = false;
            while let Some(mode) = next {
                let follow_up = self.cycle(mode).await;
                closed = follow_up.closed;
                next = self.settle(follow_up);
            }
            if closed {
                break;
            }
        }

        self.scheduler.cancel();
        self.set_state(OrchestratorState::Idle);
        info!("Sync orchestrator stopped");
    }

    /// React to a command received between cycles.
    fn handle(&mut self, command: SyncCommand) -> Option<Mode> {
        match command {
            SyncCommand::Start(target) => {
                info!("Continuous sync requested for {}", target.endpoint);
                self.retarget(target.endpoint, target.last_sync);
                self.scheduler.cancel();
                Some(Mode::Continuous)
            }
            SyncCommand::Once(target) => {
                info!("Single sync requested for {}", target.endpoint);
                self.retarget(target.endpoint, target.last_sync);
                // A waiting timer means continuous sync is on; it is rearmed after this cycle.
                if self.scheduler.is_armed() {
                    self.scheduler.cancel();
                    Some(Mode::Continuous)
                } else {
                    Some(Mode::Single)
                }
            }
            SyncCommand::Pause => {
                if self.scheduler.cancel() {
                    info!("Sync paused, next cycle cancelled");
                } else {
                    debug!("Sync paused with no cycle scheduled");
                }
                self.set_state(OrchestratorState::Paused);
                None
            }
        }
    }

    fn retarget(&mut self, endpoint: String, last_sync: Option<DateTime<Utc>>) {
        let endpoint = endpoint.trim().to_string();
        if self.endpoint.as_deref() != Some(endpoint.as_str()) {
            debug!("Sync endpoint set to {endpoint}");
            self.endpoint = Some(endpoint);
        }
        if last_sync.is_some() {
            self.watermark = last_sync;
        }
    }

    /// Run one cycle while folding in commands that arrive meanwhile.
    async fn cycle(&mut self, mode: Mode) -> FollowUp {
        self.set_state(OrchestratorState::Running);
        let mut follow_up = FollowUp::new(mode);

        let report = if !self.connectivity.is_online() {
            info!("Offline, skipping sync cycle");
            CycleReport::offline()
        } else {
            match self.connect() {
                Ok(()) => match &self.link {
                    Some((_, gateway)) => {
                        drive(
                            &self.engine,
                            gateway,
                            self.watermark,
                            &mut self.commands,
                            &mut follow_up,
                        )
                        .await
                    }
                    None => CycleReport::failed("no remote connection"),
                },
                Err(error) => {
                    warn!("Sync cycle skipped: {error}");
                    CycleReport::failed(error.to_string())
                }
            }
        };

        if let Some(last_sync) = report.last_sync {
            self.watermark = Some(last_sync);
            self.emit(SyncEvent::LastSync { last_sync });
        }
        self.emit(SyncEvent::CycleFinished(report));
        follow_up
    }

    /// Apply deferred commands and decide what follows the cycle.
    fn settle(&mut self, follow_up: FollowUp) -> Option<Mode> {
        if let Some(endpoint) = follow_up.endpoint {
            self.retarget(endpoint, follow_up.watermark);
        } else if follow_up.watermark.is_some() {
            self.watermark = follow_up.watermark;
        }

        if follow_up.closed {
            return None;
        }
        if follow_up.rerun {
            return Some(follow_up.mode);
        }
        if follow_up.pause {
            info!("Sync paused");
            self.set_state(OrchestratorState::Paused);
            return None;
        }

        match follow_up.mode {
            Mode::Continuous => {
                let interval = self.engine.settings().interval;
                self.scheduler.arm(interval);
                debug!("Next sync cycle in {interval:?}");
            }
            Mode::Single => self.set_state(OrchestratorState::Idle),
        }
        None
    }

    fn connect(&mut self) -> RemoteResult<()> {
        let Some(endpoint) = self.endpoint.as_deref() else {
            return Err(RemoteError::InvalidEndpoint(
                "no endpoint configured".to_string(),
            ));
        };
        if self
            .link
            .as_ref()
            .is_some_and(|(current, _)| current == endpoint)
        {
            return Ok(());
        }

        self.link = None;
        let gateway = self.connector.connect(endpoint)?;
        debug!("Connected sync gateway to {endpoint}");
        self.link = Some((endpoint.to_string(), gateway));
        Ok(())
    }

    fn emit(&self, event: SyncEvent) {
        if self.events.send(event).is_err() {
            debug!("Sync event dropped, no host is listening");
        }
    }

    fn set_state(&self, state: OrchestratorState) {
        self.state.send_if_modified(|current| {
            if *current == state {
                false
            } else {
                debug!("Sync orchestrator state: {current:?} -> {state:?}");
                *current = state;
                true
            }
        });
    }
}

async fn drive<S, G>(
    engine: &SyncEngine<S>,
    gateway: &G,
    watermark: Option<DateTime<Utc>>,
    commands: &mut mpsc::Receiver<SyncCommand>,
    follow_up: &mut FollowUp,
) -> CycleReport
where
    S: LocalStore,
    G: RemoteGateway,
{
    let cycle = engine.run_cycle(gateway, watermark);
    tokio::pin!(cycle);

    loop {
        tokio::select! {
            report = &mut cycle => return report,
            command = commands.recv(), if !follow_up.closed => match command {
                Some(command) => follow_up.absorb(command),
                None => follow_up.closed = true,
            },
        }
    }
}
