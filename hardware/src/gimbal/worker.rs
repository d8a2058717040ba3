//! Background actuation thread for physical-gimbal mode
//!
//! Every gimbal round trip can block for the full ack timeout, so the video loop
//! never talks to the gimbal directly. It submits relative [`AngleOffset`]s to a
//! [`GimbalWorker`], which owns the driver on its own thread.
//!
//! The mailbox holds a single offset: submitting while the worker is busy replaces
//! the unread offset with the newer one. The worker combines each offset with its
//! last known attitude, commands the result with retry, and then trusts the
//! acknowledged attitude, or the clamped command itself when every attempt timed
//! out.

use std::sync::{Arc, Mutex};
use std::thread::{self, JoinHandle};

use crossbeam_channel::{bounded, Receiver, Sender};
use tracing::{debug, info, warn};

use super::angle::{AngleOffset, Attitude};
use super::device::GimbalInterface;

/// Handle to the gimbal actuation thread.
///
/// Dropping the handle closes the mailbox and joins the thread.
pub struct GimbalWorker {
    mailbox: Option<Sender<AngleOffset>>,
    stale: Receiver<AngleOffset>,
    attitude: Arc<Mutex<Option<Attitude>>>,
    handle: Option<JoinHandle<()>>,
}

impl GimbalWorker {
    /// Start the worker thread; `attempts` is the per-command retry budget.
    pub fn spawn<G>(gimbal: G, attempts: usize) -> Self
    where
        G: GimbalInterface + Send + 'static,
    {
        let (tx, rx) = bounded(1);
        let attitude = Arc::new(Mutex::new(None));
        let shared = attitude.clone();
        let worker_rx = rx.clone();

        let handle = thread::Builder::new()
            .name("gimbal-worker".to_string())
            .spawn(move || run(gimbal, worker_rx, shared, attempts))
            .ok();
        if handle.is_none() {
            warn!("Failed to spawn gimbal worker thread; gimbal commands disabled");
        }

        Self {
            mailbox: Some(tx),
            stale: rx,
            attitude,
            handle,
        }
    }

    /// Queue a correction, replacing any correction not yet picked up.
    ///
    /// Never blocks.
    pub fn submit(&self, offset: AngleOffset) {
        let Some(tx) = &self.mailbox else {
            return;
        };
        if self.stale.try_recv().is_ok() {
            debug!("Replacing unread gimbal offset");
        }
        if tx.try_send(offset).is_err() {
            debug!("Gimbal mailbox busy, offset dropped");
        }
    }

    /// Last attitude the worker knows of (acknowledged or open-loop estimate).
    pub fn latest_attitude(&self) -> Option<Attitude> {
        *self.attitude.lock().unwrap()
    }
}

impl Drop for GimbalWorker {
    fn drop(&mut self) {
        self.mailbox.take();
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                warn!("Gimbal worker thread panicked");
            }
        }
    }
}

fn run<G: GimbalInterface>(
    mut gimbal: G,
    mailbox: Receiver<AngleOffset>,
    shared: Arc<Mutex<Option<Attitude>>>,
    attempts: usize,
) {
    let mut estimate = match gimbal.read_attitude() {
        Ok(Some(att)) => {
            info!(
                "Gimbal attitude: yaw={:+.1} pitch={:+.1} roll={:+.1}",
                att.yaw_deg, att.pitch_deg, att.roll_deg
            );
            att
        }
        Ok(None) => {
            warn!("Gimbal did not report attitude, assuming centered");
            Attitude::default()
        }
        Err(e) => {
            warn!("Gimbal attitude read failed ({e}), assuming centered");
            Attitude::default()
        }
    };
    *shared.lock().unwrap() = Some(estimate);

    for offset in mailbox.iter() {
        let command = estimate.offset_by(offset);
        match gimbal.command_angles(command, attempts) {
            Ok(report) => {
                estimate = report
                    .confirmed
                    .unwrap_or_else(|| Attitude::open_loop(report.sent, estimate.roll_deg));
            }
            Err(e) => warn!("Gimbal command failed: {e}"),
        }
        *shared.lock().unwrap() = Some(estimate);
    }

    debug!("Gimbal worker mailbox closed");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gimbal::angle::AngleCommand;
    use crate::gimbal::device::SetAnglesReport;
    use crate::gimbal::GimbalResult;
    use approx::assert_relative_eq;
    use std::time::{Duration, Instant};

    /// Platform double recording every command it receives.
    struct MockGimbal {
        initial: Option<Attitude>,
        ack: bool,
        commands: Arc<Mutex<Vec<AngleCommand>>>,
    }

    impl GimbalInterface for MockGimbal {
        fn read_attitude(&mut self) -> GimbalResult<Option<Attitude>> {
            Ok(self.initial)
        }

        fn command_angles(
            &mut self,
            command: AngleCommand,
            _attempts: usize,
        ) -> GimbalResult<SetAnglesReport> {
            self.commands.lock().unwrap().push(command);
            let confirmed = self
                .ack
                .then(|| Attitude::new(command.yaw_deg(), command.pitch_deg(), 1.0));
            Ok(SetAnglesReport {
                sent: command,
                confirmed,
            })
        }
    }

    fn wait_for<F: Fn() -> bool>(cond: F) {
        let start = Instant::now();
        while !cond() && start.elapsed() < Duration::from_secs(2) {
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_offsets_accumulate_on_acked_attitude() {
        let commands = Arc::new(Mutex::new(Vec::new()));
        let worker = GimbalWorker::spawn(
            MockGimbal {
                initial: Some(Attitude::new(10.0, 0.0, 0.0)),
                ack: true,
                commands: commands.clone(),
            },
            3,
        );

        worker.submit(AngleOffset::new(5.0, 2.0));
        wait_for(|| commands.lock().unwrap().len() == 1);
        worker.submit(AngleOffset::new(5.0, 2.0));
        wait_for(|| commands.lock().unwrap().len() == 2);
        drop(worker);

        let sent = commands.lock().unwrap();
        assert_relative_eq!(sent[0].yaw_deg(), 15.0);
        assert_relative_eq!(sent[0].pitch_deg(), 2.0);
        assert_relative_eq!(sent[1].yaw_deg(), 20.0);
        assert_relative_eq!(sent[1].pitch_deg(), 4.0);
    }

    #[test]
    fn test_open_loop_estimate_when_unacked() {
        let commands = Arc::new(Mutex::new(Vec::new()));
        let worker = GimbalWorker::spawn(
            MockGimbal {
                initial: None,
                ack: false,
                commands: commands.clone(),
            },
            3,
        );

        worker.submit(AngleOffset::new(200.0, 0.0));
        wait_for(|| commands.lock().unwrap().len() == 1);
        wait_for(|| {
            worker
                .latest_attitude()
                .map(|a| a.yaw_deg == 135.0)
                .unwrap_or(false)
        });

        let att = worker.latest_attitude().unwrap();
        assert_eq!(att.yaw_deg, 135.0);
        assert_eq!(att.pitch_deg, 0.0);
    }
}
