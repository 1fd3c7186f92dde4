// SPDX-FileCopyrightText: 2025 Stanislaw Grams <stanislawgrams@gmail.com>
//
// SPDX-License-Identifier: BSD-2-Clause

//! Dedicated thread owning the arm driver.
//!
//! Driver calls block on the serial line, so the engine never touches one
//! directly. Accepted moves are queued here and executed strictly in
//! arrival order, one at a time; progress flows back on an unbounded
//! channel the engine folds into its event loop.

use std::sync::mpsc;
use std::thread;
use std::time::Duration;

use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};
use tracing::{debug, info};

use mecharm_core::arm::ArmDriver;
use mecharm_core::motion::{MoveTarget, Position};
use mecharm_core::pipeline::{MotionCommand, MotionJob, MotionUpdate};
use mecharm_core::DynResult;

/// Handle to the worker thread. Dropping it closes the job queue; the
/// thread finishes what it already accepted and exits.
pub struct ArmWorker {
    jobs: mpsc::Sender<MotionJob>,
    handle: thread::JoinHandle<()>,
}

impl ArmWorker {
    /// Spawn the worker thread. The driver moves in; every blocking call
    /// to it happens on that thread and never on the runtime.
    pub fn spawn(
        driver: Box<dyn ArmDriver>,
        poll_interval: Duration,
    ) -> (Self, UnboundedReceiver<MotionUpdate>) {
        let (job_tx, job_rx) = mpsc::channel();
        let (update_tx, update_rx) = unbounded_channel();
        let handle = thread::spawn(move || {
            run_worker(driver, job_rx, update_tx, poll_interval);
        });
        (
            Self {
                jobs: job_tx,
                handle,
            },
            update_rx,
        )
    }

    /// Queue a motion job behind any already running. Returns false when
    /// the worker thread is gone.
    pub fn submit(&self, job: MotionJob) -> bool {
        self.jobs.send(job).is_ok()
    }

    /// Close the job queue and wait for the thread to drain it.
    pub fn join(self) {
        let Self { jobs, handle } = self;
        drop(jobs);
        let _ = handle.join();
    }
}

fn run_worker(
    mut driver: Box<dyn ArmDriver>,
    jobs: mpsc::Receiver<MotionJob>,
    updates: UnboundedSender<MotionUpdate>,
    poll_interval: Duration,
) {
    let info = driver.info();
    info!(
        "arm worker ready ({} {}, {} joints)",
        info.manufacturer, info.model, info.capabilities.joints
    );

    while let Ok(job) = jobs.recv() {
        let action_id = job.action_id;
        debug!("executing action {}", action_id);
        let update = match execute_motion(driver.as_mut(), &job, &updates, poll_interval) {
            Ok(final_position) => MotionUpdate::Complete {
                action_id,
                session: job.session,
                final_position,
            },
            Err(e) => MotionUpdate::Failed {
                action_id,
                session: job.session,
                reason: e.to_string(),
            },
        };
        if updates.send(update).is_err() {
            break;
        }
    }
    debug!("arm worker exiting (job channel closed)");
}

/// Run one job to its end: start the motion, then poll until the arm
/// settles, emitting a progress update per poll that still moves.
fn execute_motion(
    driver: &mut dyn ArmDriver,
    job: &MotionJob,
    updates: &UnboundedSender<MotionUpdate>,
    poll_interval: Duration,
) -> DynResult<Position> {
    let target = resolve_command(driver, &job.command)?;
    driver.begin_motion(&target, job.speed)?;

    let mut progress_seq = 0u32;
    while driver.is_moving()? {
        let current_position = driver.current_position()?;
        let _ = updates.send(MotionUpdate::Progress {
            action_id: job.action_id,
            session: job.session.clone(),
            progress_seq,
            current_position,
            target_position: target,
        });
        progress_seq += 1;
        thread::sleep(poll_interval);
    }

    driver.current_position()
}

/// Turn a queued command into a full-arm target. A single-joint move
/// reads the live posture and patches one joint, so it resolves here
/// against whatever the arm settled at, not at accept time.
fn resolve_command(driver: &mut dyn ArmDriver, command: &MotionCommand) -> DynResult<MoveTarget> {
    match command {
        MotionCommand::Target(target) => Ok(*target),
        MotionCommand::Joint { joint_index, angle } => {
            let mut degrees = driver.current_position()?.joints;
            let slot = degrees
                .get_mut(usize::from(*joint_index).wrapping_sub(1))
                .ok_or_else(|| format!("joint index {} out of range", joint_index))?;
            *slot = *angle;
            Ok(MoveTarget::Angles { degrees })
        }
    }
}
