// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Session engine: the single task owning the lease and the queue
//! accounting.
//!
//! Every action funnels through here, whichever channel it arrived on,
//! so lease decisions are strictly ordered and never race. The engine
//! keeps the arm worker fed, republishes worker updates as events and
//! revokes leases that go quiet. Nothing in here takes the process down:
//! a bad payload costs its sender an error event and the loop keeps
//! running.

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::sync::mpsc::UnboundedReceiver;
use tokio::sync::{broadcast, watch};
use tokio::time::{self, Instant};
use tracing::{debug, error, info, warn};

use mecharm_bus::{Bus, BusMessage};
use mecharm_core::motion::Position;
use mecharm_core::pipeline::{MotionCommand, MotionJob, MotionUpdate};
use mecharm_core::session::{ActionId, LeaseError, SessionMachine};
use mecharm_core::{DynResult, ErrorCode};
use mecharm_protocol::{decode_action, encode_event, validate_action, Action, Event, TopicRouter};

use crate::arm_worker::ArmWorker;

/// Configuration for the session engine.
pub struct EngineConfig {
    pub bus: Arc<dyn Bus>,
    pub device_id: String,
    pub default_speed: u8,
    pub inactivity_timeout: Duration,
    pub queue_warn_depth: usize,
}

/// Which channel an action came in on. Error replies go back out on the
/// up channel paired with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Source {
    Device,
    Session,
}

type SessionRx = Option<broadcast::Receiver<BusMessage>>;

/// Run the session engine until shutdown or bus closure.
pub async fn run_engine(
    config: EngineConfig,
    worker: ArmWorker,
    mut updates: UnboundedReceiver<MotionUpdate>,
    mut shutdown_rx: watch::Receiver<bool>,
) -> DynResult<()> {
    let topics = TopicRouter::new(config.device_id.clone());
    let mut device_rx = config.bus.subscribe(&topics.device_down());
    let mut session_rx: SessionRx = None;

    let mut engine = Engine {
        bus: config.bus,
        topics,
        default_speed: config.default_speed,
        inactivity_timeout: config.inactivity_timeout,
        queue_warn_depth: config.queue_warn_depth,
        machine: SessionMachine::new(),
        worker,
        in_flight: 0,
        exiting: None,
        deadline: None,
        last_position: None,
    };

    // The boot status follows the command subscription, so anyone who
    // sees it can publish on the device channel right away.
    engine.publish_device_status();
    info!("session engine ready (device {})", engine.topics.device_id());

    loop {
        tokio::select! {
            changed = shutdown_rx.changed() => {
                if changed.is_err() || *shutdown_rx.borrow() {
                    break;
                }
            }
            msg = device_rx.recv() => match msg {
                Ok(msg) => engine.handle_payload(Source::Device, &msg.payload, &mut session_rx),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("device channel lagged, {} actions lost", n);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            msg = recv_or_pending(&mut session_rx) => match msg {
                Ok(msg) => engine.handle_payload(Source::Session, &msg.payload, &mut session_rx),
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!("session channel lagged, {} actions lost", n);
                }
                Err(broadcast::error::RecvError::Closed) => session_rx = None,
            },
            update = updates.recv() => {
                let Some(update) = update else {
                    error!("arm worker is gone, stopping engine");
                    break;
                };
                engine.handle_update(update, &mut session_rx);
            }
            _ = deadline_sleep(engine.deadline) => {
                engine.handle_deadline(&mut session_rx);
            }
        }
    }

    info!("session engine shutting down");
    Ok(())
}

struct Engine {
    bus: Arc<dyn Bus>,
    topics: TopicRouter,
    default_speed: u8,
    inactivity_timeout: Duration,
    queue_warn_depth: usize,
    machine: SessionMachine,
    worker: ArmWorker,
    /// Jobs handed to the worker with no terminal update yet.
    in_flight: usize,
    /// Exit code of an accepted exit_session, held until the queue
    /// drains.
    exiting: Option<i32>,
    /// When the idle session gets revoked. Armed only while a lease is
    /// active with nothing in flight.
    deadline: Option<Instant>,
    last_position: Option<Position>,
}

impl Engine {
    fn handle_payload(&mut self, source: Source, payload: &[u8], session_rx: &mut SessionRx) {
        let action = match decode_action(payload) {
            Ok(action) => action,
            Err(e) => {
                warn!("rejecting undecodable action: {}", e);
                self.reply(
                    source,
                    &Event::BadAction {
                        action_id: None,
                        reason: e.to_string(),
                    },
                );
                return;
            }
        };
        if let Err(e) = validate_action(&action) {
            warn!("rejecting {} {}: {}", action.name(), action.id(), e);
            self.reply(
                source,
                &Event::BadAction {
                    action_id: Some(action.id()),
                    reason: e.to_string(),
                },
            );
            return;
        }

        debug!("handling {} {}", action.name(), action.id());
        match action {
            Action::BeginSession { id, requested_by } => {
                self.handle_begin(source, id, &requested_by, session_rx);
            }
            Action::ExitSession {
                id,
                session_id,
                exit_code,
            } => {
                self.handle_exit(source, id, session_id, exit_code, session_rx);
            }
            Action::Move {
                id,
                session_id,
                target,
                speed,
            } => {
                self.handle_move(
                    source,
                    id,
                    session_id,
                    MotionCommand::Target(target),
                    speed.unwrap_or(self.default_speed),
                );
            }
            Action::MoveJoint {
                id,
                session_id,
                joint_index,
                angle,
                speed,
            } => {
                self.handle_move(
                    source,
                    id,
                    session_id,
                    MotionCommand::Joint { joint_index, angle },
                    speed,
                );
            }
        }
    }

    fn handle_begin(
        &mut self,
        source: Source,
        id: ActionId,
        requested_by: &str,
        session_rx: &mut SessionRx,
    ) {
        // A draining lease still counts as busy: the machine stays
        // active until the final motion settles.
        match self.machine.begin(self.topics.device_id(), requested_by) {
            Ok(session) => {
                info!(
                    "session {} created for {}",
                    session.session_id, session.remote_client_id
                );
                // Subscribe before announcing, so nothing the controller
                // sends on its session channel can slip past.
                *session_rx =
                    Some(self.bus.subscribe(&self.topics.session_down(session.session_id)));
                self.publish_device(&Event::SessionCreated {
                    action_id: id,
                    session: session.clone(),
                });
                self.publish_session(session.session_id, &Event::SessionReady { session });
                self.publish_device_status();
                self.arm_deadline();
            }
            Err(e) => {
                debug!("begin_session {} refused: {}", id, e);
                self.reply(source, &lease_error_event(e, id));
            }
        }
    }

    fn handle_exit(
        &mut self,
        source: Source,
        id: ActionId,
        session_id: u64,
        exit_code: i32,
        session_rx: &mut SessionRx,
    ) {
        if self.exiting.is_some() {
            // Teardown already underway; the lease takes nothing further.
            self.reply(source, &Event::NoCurrentSession { action_id: id });
            return;
        }
        match self.machine.admit(session_id) {
            Ok(session) => {
                info!(
                    "session {} exit requested by {} (code {}, {} in flight)",
                    session_id, session.remote_client_id, exit_code, self.in_flight
                );
                self.exiting = Some(exit_code);
                self.deadline = None;
                if self.in_flight == 0 {
                    self.destroy_session(exit_code, session_rx);
                }
            }
            Err(e) => self.reply(source, &lease_error_event(e, id)),
        }
    }

    fn handle_move(
        &mut self,
        source: Source,
        id: ActionId,
        session_id: u64,
        command: MotionCommand,
        speed: u8,
    ) {
        let admitted = if self.exiting.is_some() {
            Err(LeaseError::NoCurrentSession)
        } else {
            self.machine.admit(session_id).cloned()
        };
        let session = match admitted {
            Ok(session) => session,
            Err(e) => {
                debug!("{} refused: {}", id, e);
                self.reply(source, &lease_error_event(e, id));
                return;
            }
        };

        // The idle clock stops while work is in flight; it restarts when
        // the queue drains.
        self.deadline = None;
        self.in_flight += 1;
        if self.in_flight > self.queue_warn_depth {
            warn!("move queue {} deep behind action {}", self.in_flight, id);
        }
        debug!("queued action {} for session {}", id, session_id);

        let job = MotionJob {
            action_id: id,
            session: session.clone(),
            command,
            speed,
        };
        if !self.worker.submit(job) {
            self.in_flight -= 1;
            error!("arm worker is gone, failing action {}", id);
            self.reply(
                source,
                &Event::MoveError {
                    action_id: id,
                    session,
                    reason: "arm worker unavailable".to_string(),
                },
            );
        }
    }

    fn handle_update(&mut self, update: MotionUpdate, session_rx: &mut SessionRx) {
        let terminal = update.is_terminal();
        match update {
            MotionUpdate::Progress {
                action_id,
                session,
                progress_seq,
                current_position,
                target_position,
            } => {
                self.last_position = Some(current_position);
                self.publish_session(
                    session.session_id,
                    &Event::MoveProgress {
                        action_id,
                        session,
                        progress_seq,
                        current_position,
                        target_position,
                    },
                );
            }
            MotionUpdate::Complete {
                action_id,
                session,
                final_position,
            } => {
                debug!("action {} complete", action_id);
                self.last_position = Some(final_position);
                self.publish_session(
                    session.session_id,
                    &Event::MoveComplete {
                        action_id,
                        session,
                        final_position,
                    },
                );
            }
            MotionUpdate::Failed {
                action_id,
                session,
                reason,
            } => {
                warn!("action {} failed: {}", action_id, reason);
                self.publish_session(
                    session.session_id,
                    &Event::MoveError {
                        action_id,
                        session,
                        reason,
                    },
                );
            }
        }

        if terminal {
            self.in_flight = self.in_flight.saturating_sub(1);
            if self.in_flight == 0 {
                self.settle_queue(session_rx);
            }
        }
    }

    /// The queue just drained: finish a pending exit, or tell the
    /// controller the arm is ready for more and start the idle clock.
    fn settle_queue(&mut self, session_rx: &mut SessionRx) {
        if let Some(exit_code) = self.exiting {
            self.destroy_session(exit_code, session_rx);
            return;
        }
        if let Some(session) = self.machine.current().cloned() {
            self.publish_session(session.session_id, &Event::SessionReady { session });
            self.arm_deadline();
        }
    }

    /// Revoke an idle session. Fires only while a lease is active with
    /// nothing in flight; anything else means the deadline went stale.
    fn handle_deadline(&mut self, session_rx: &mut SessionRx) {
        self.deadline = None;
        if self.exiting.is_some() || self.in_flight > 0 {
            return;
        }
        let Some(session) = self.machine.current().cloned() else {
            return;
        };
        warn!(
            "session {} timed out after {:?} idle",
            session.session_id, self.inactivity_timeout
        );
        self.publish_session(
            session.session_id,
            &Event::SessionTimeout {
                session,
                idle_ms: self.inactivity_timeout.as_millis() as u64,
            },
        );
        self.destroy_session(i32::from(ErrorCode::SessionTimeout.code()), session_rx);
    }

    fn destroy_session(&mut self, exit_code: i32, session_rx: &mut SessionRx) {
        let Some(session) = self.machine.expire() else {
            return;
        };
        info!(
            "session {} destroyed (exit code {})",
            session.session_id, exit_code
        );
        let session_id = session.session_id;
        self.publish_session(session_id, &Event::SessionDestroyed { session, exit_code });
        *session_rx = None;
        self.exiting = None;
        self.deadline = None;
        self.publish_device_status();
    }

    fn arm_deadline(&mut self) {
        self.deadline = Some(Instant::now() + self.inactivity_timeout);
    }

    /// Error replies go out on the up channel paired with where the
    /// action came in, so a controller that never joined a session still
    /// hears its rejection.
    fn reply(&self, source: Source, event: &Event) {
        match source {
            Source::Device => self.publish_device(event),
            Source::Session => match self.machine.current() {
                Some(session) => self.publish_session(session.session_id, event),
                None => self.publish_device(event),
            },
        }
    }

    fn publish_device_status(&self) {
        let (idle, controller) = match self.machine.current() {
            Some(session) => (false, Some(session.remote_client_id.clone())),
            None => (true, None),
        };
        self.publish_device(&Event::DeviceStatus {
            idle,
            controller,
            position: self.last_position,
        });
    }

    fn publish_device(&self, event: &Event) {
        self.publish(&self.topics.device_up(), event);
    }

    fn publish_session(&self, session_id: u64, event: &Event) {
        self.publish(&self.topics.session_up(session_id), event);
    }

    fn publish(&self, topic: &str, event: &Event) {
        let payload = match encode_event(event) {
            Ok(payload) => payload,
            Err(e) => {
                error!("failed to encode {} event: {}", event.name(), e);
                return;
            }
        };
        if let Err(e) = self.bus.publish(topic, Bytes::from(payload)) {
            error!("failed to publish {} to {}: {}", event.name(), topic, e);
        }
    }
}

fn lease_error_event(error: LeaseError, action_id: ActionId) -> Event {
    match error {
        LeaseError::Busy { holder } => Event::SessionBusy { action_id, holder },
        LeaseError::NoCurrentSession => Event::NoCurrentSession { action_id },
    }
}

async fn recv_or_pending(
    rx: &mut SessionRx,
) -> Result<BusMessage, broadcast::error::RecvError> {
    match rx {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn deadline_sleep(deadline: Option<Instant>) {
    match deadline {
        Some(at) => time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
