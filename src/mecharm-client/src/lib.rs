// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Controller-side library for driving a remote arm over the bus.
//!
//! A [`Controller`] requests the device lease; on success it hands out a
//! [`Session`] that publishes motion actions on the session down-channel
//! and resolves each one against the correlated terminal event. Replies
//! are matched by action id, so unrelated broadcast traffic on the same
//! topics is ignored.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use thiserror::Error;
use tokio::sync::broadcast;
use tokio::time;
use tracing::{debug, warn};
use uuid::Uuid;

use mecharm_bus::{Bus, BusError, BusMessage};
use mecharm_core::error::ErrorCode;
use mecharm_core::motion::{MoveTarget, Position};
use mecharm_core::session::{ActionId, ActionIdGen, SessionInfo};
use mecharm_protocol::action::Action;
use mecharm_protocol::event::Event;
use mecharm_protocol::{decode_event, encode_action, DecodeError, TopicRouter};

const REPLY_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("device is busy, session held by {holder}")]
    Busy { holder: String },
    #[error("device rejected the action ({code}): {reason}")]
    Rejected { code: ErrorCode, reason: String },
    #[error("move failed: {reason}")]
    Move { reason: String },
    #[error("no reply from device within {0:?}")]
    Timeout(Duration),
    #[error("session closed by device: {reason}")]
    SessionClosed { reason: String },
    #[error("bus error: {0}")]
    Bus(#[from] BusError),
    #[error("event decode failed: {0}")]
    Decode(#[from] DecodeError),
    #[error("action encode failed: {0}")]
    Encode(#[from] serde_json::Error),
}

pub type ControllerResult<T> = Result<T, ControllerError>;

/// Position snapshot handed to a progress observer, taken from one
/// `move_progress` event.
#[derive(Debug, Clone, PartialEq)]
pub struct MoveObservation {
    pub progress_seq: u32,
    pub current_position: Position,
}

/// One controller identity on the bus. Cheap to construct; holds no
/// lease until [`Controller::begin_session`] succeeds.
pub struct Controller {
    bus: Arc<dyn Bus>,
    topics: TopicRouter,
    client_id: String,
    ids: Arc<ActionIdGen>,
    reply_timeout: Duration,
}

impl Controller {
    /// Controller with a generated `ctl-{uuid}` identity.
    pub fn new(bus: Arc<dyn Bus>, device_id: &str) -> Self {
        Self::with_client_id(bus, device_id, format!("ctl-{}", Uuid::new_v4()))
    }

    /// Controller with a caller-chosen identity.
    pub fn with_client_id(bus: Arc<dyn Bus>, device_id: &str, client_id: String) -> Self {
        Self {
            bus,
            topics: TopicRouter::new(device_id),
            client_id,
            ids: Arc::new(ActionIdGen::new()),
            reply_timeout: REPLY_TIMEOUT,
        }
    }

    /// How long to wait for the device between events before giving up.
    /// The deadline is per silence gap, not per whole motion.
    pub fn with_reply_timeout(mut self, timeout: Duration) -> Self {
        self.reply_timeout = timeout;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    /// Request the device lease. Resolves to a [`Session`] on
    /// `session_created`, or to a typed error on `session_busy` /
    /// `bad_action`.
    pub async fn begin_session(&self) -> ControllerResult<Session> {
        // Subscribe before publishing so the reply cannot slip past us.
        let mut device_up = self.bus.subscribe(&self.topics.device_up());
        let id = self.ids.next();
        let action = Action::BeginSession {
            id,
            requested_by: self.client_id.clone(),
        };
        self.publish(&self.topics.device_down(), &action)?;

        loop {
            match self.next_event(&mut device_up).await? {
                // Action ids are per-controller and every controller
                // counts from 1, so on the shared device channel the id
                // alone cannot tell our lease from a raced competitor's.
                // The issued SessionInfo names its owner; only take a
                // lease issued to us.
                Event::SessionCreated { action_id, session }
                    if action_id == id && session.remote_client_id == self.client_id =>
                {
                    debug!(
                        "session {} created for {}",
                        session.session_id, session.remote_client_id
                    );
                    let up = self.bus.subscribe(&self.topics.session_up(session.session_id));
                    return Ok(Session {
                        bus: Arc::clone(&self.bus),
                        topics: self.topics.clone(),
                        ids: Arc::clone(&self.ids),
                        info: session,
                        up,
                        reply_timeout: self.reply_timeout,
                        closed: None,
                    });
                }
                Event::SessionBusy { action_id, holder } if action_id == id => {
                    return Err(ControllerError::Busy { holder });
                }
                Event::BadAction { action_id, reason } if action_id == Some(id) => {
                    return Err(ControllerError::Rejected {
                        code: ErrorCode::BadAction,
                        reason,
                    });
                }
                // Broadcasts for other controllers, status snapshots.
                other => debug!("ignoring {} while awaiting lease", other.name()),
            }
        }
    }

    fn publish(&self, topic: &str, action: &Action) -> ControllerResult<()> {
        let payload = encode_action(action)?;
        self.bus.publish(topic, Bytes::from(payload))?;
        Ok(())
    }

    async fn next_event(
        &self,
        rx: &mut broadcast::Receiver<BusMessage>,
    ) -> ControllerResult<Event> {
        next_event_on(rx, self.reply_timeout).await
    }
}

/// An owned lease on the device. Dropping the handle abandons the lease
/// to the inactivity timeout; call [`Session::exit`] for a clean close.
pub struct Session {
    bus: Arc<dyn Bus>,
    topics: TopicRouter,
    ids: Arc<ActionIdGen>,
    info: SessionInfo,
    up: broadcast::Receiver<BusMessage>,
    reply_timeout: Duration,
    closed: Option<String>,
}

impl Session {
    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn session_id(&self) -> u64 {
        self.info.session_id
    }

    /// Move to `target`, waiting for the terminal event. `speed` of None
    /// leaves the choice to the server default.
    pub async fn move_to(
        &mut self,
        target: MoveTarget,
        speed: Option<u8>,
    ) -> ControllerResult<Position> {
        self.move_observed(target, speed, |_| {}).await
    }

    /// Like [`Session::move_to`], invoking `observe` on every progress
    /// event of this move.
    pub async fn move_observed(
        &mut self,
        target: MoveTarget,
        speed: Option<u8>,
        observe: impl FnMut(MoveObservation),
    ) -> ControllerResult<Position> {
        let id = self.ids.next();
        let action = Action::Move {
            id,
            session_id: self.info.session_id,
            target,
            speed,
        };
        self.run_motion(id, &action, observe).await
    }

    /// Move a single joint to an absolute angle in degrees.
    pub async fn move_joint(
        &mut self,
        joint_index: u8,
        angle: f64,
        speed: u8,
    ) -> ControllerResult<Position> {
        let id = self.ids.next();
        let action = Action::MoveJoint {
            id,
            session_id: self.info.session_id,
            joint_index,
            angle,
            speed,
        };
        self.run_motion(id, &action, |_| {}).await
    }

    /// Close the session and wait for the device to confirm teardown.
    /// Returns the exit code echoed in `session_destroyed`.
    pub async fn exit(mut self, exit_code: i32) -> ControllerResult<i32> {
        if let Some(reason) = &self.closed {
            return Err(ControllerError::SessionClosed {
                reason: reason.clone(),
            });
        }
        let id = self.ids.next();
        let action = Action::ExitSession {
            id,
            session_id: self.info.session_id,
            exit_code,
        };
        self.publish(&action)?;

        loop {
            match next_event_on(&mut self.up, self.reply_timeout).await? {
                Event::SessionDestroyed { session, exit_code }
                    if session.session_id == self.info.session_id =>
                {
                    return Ok(exit_code);
                }
                Event::NoCurrentSession { action_id } if action_id == id => {
                    return Err(ControllerError::SessionClosed {
                        reason: "session already gone".to_string(),
                    });
                }
                Event::BadAction { action_id, reason } if action_id == Some(id) => {
                    return Err(ControllerError::Rejected {
                        code: ErrorCode::BadAction,
                        reason,
                    });
                }
                other => debug!("ignoring {} while awaiting teardown", other.name()),
            }
        }
    }

    async fn run_motion(
        &mut self,
        id: ActionId,
        action: &Action,
        mut observe: impl FnMut(MoveObservation),
    ) -> ControllerResult<Position> {
        if let Some(reason) = &self.closed {
            return Err(ControllerError::SessionClosed {
                reason: reason.clone(),
            });
        }
        self.publish(action)?;

        loop {
            match next_event_on(&mut self.up, self.reply_timeout).await? {
                Event::MoveProgress {
                    action_id,
                    progress_seq,
                    current_position,
                    ..
                } if action_id == id => {
                    observe(MoveObservation {
                        progress_seq,
                        current_position,
                    });
                }
                Event::MoveComplete {
                    action_id,
                    final_position,
                    ..
                } if action_id == id => {
                    return Ok(final_position);
                }
                Event::MoveError {
                    action_id, reason, ..
                } if action_id == id => {
                    return Err(ControllerError::Move { reason });
                }
                Event::BadAction { action_id, reason } if action_id == Some(id) => {
                    return Err(ControllerError::Rejected {
                        code: ErrorCode::BadAction,
                        reason,
                    });
                }
                Event::NoCurrentSession { action_id } if action_id == id => {
                    return Err(self.mark_closed("session already gone"));
                }
                Event::SessionTimeout { session, idle_ms }
                    if session.session_id == self.info.session_id =>
                {
                    warn!("session {} timed out after {} ms idle", session.session_id, idle_ms);
                    return Err(self.mark_closed("inactivity timeout"));
                }
                Event::SessionDestroyed { session, exit_code }
                    if session.session_id == self.info.session_id =>
                {
                    return Err(self.mark_closed(&format!("destroyed with exit code {exit_code}")));
                }
                other => debug!("ignoring {} while awaiting move result", other.name()),
            }
        }
    }

    fn mark_closed(&mut self, reason: &str) -> ControllerError {
        self.closed = Some(reason.to_string());
        ControllerError::SessionClosed {
            reason: reason.to_string(),
        }
    }

    fn publish(&self, action: &Action) -> ControllerResult<()> {
        let payload = encode_action(action)?;
        self.bus.publish(
            &self.topics.session_down(self.info.session_id),
            Bytes::from(payload),
        )?;
        Ok(())
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("info", &self.info)
            .field("closed", &self.closed)
            .finish_non_exhaustive()
    }
}

async fn next_event_on(
    rx: &mut broadcast::Receiver<BusMessage>,
    timeout: Duration,
) -> ControllerResult<Event> {
    loop {
        let msg = match time::timeout(timeout, rx.recv()).await {
            Ok(Ok(msg)) => msg,
            Ok(Err(broadcast::error::RecvError::Lagged(skipped))) => {
                warn!("controller lagged, {} events dropped", skipped);
                continue;
            }
            Ok(Err(broadcast::error::RecvError::Closed)) => {
                return Err(ControllerError::Bus(BusError::Closed));
            }
            Err(_) => return Err(ControllerError::Timeout(timeout)),
        };
        return Ok(decode_event(&msg.payload)?);
    }
}
