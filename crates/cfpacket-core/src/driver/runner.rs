//! Driver task
//!
//! Moves a [`CrystalfontzDriver`] onto a single tokio task that runs the
//! update cycle, the request watchdog and caller requests one at a time.
//! Callers talk to it through a [`DriverHandle`].

use std::time::Duration;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use super::{CrystalfontzDriver, DriverStatus};
use crate::protocol::{Packet, ProtocolError, BIN_WATCH_INTERVAL_MS};

type Job = Box<dyn FnOnce(&mut CrystalfontzDriver) + Send>;

/// Depth of the request channel
const REQUEST_CHANNEL_SIZE: usize = 32;

/// Handle to a running driver task
#[derive(Clone)]
pub struct DriverHandle {
    jobs: mpsc::Sender<Job>,
    cancel: CancellationToken,
}

impl DriverHandle {
    /// Run `f` against the driver on its task and return the result
    pub async fn call<F, R>(&self, f: F) -> Result<R, ProtocolError>
    where
        F: FnOnce(&mut CrystalfontzDriver) -> R + Send + 'static,
        R: Send + 'static,
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let job: Job = Box::new(move |driver| {
            let _ = reply_tx.send(f(driver));
        });
        self.jobs
            .send(job)
            .await
            .map_err(|_| ProtocolError::DriverStopped)?;
        reply_rx.await.map_err(|_| ProtocolError::DriverStopped)
    }

    /// Ping the display and wait for the echo
    pub async fn ping(&self, message: Vec<u8>) -> Result<Packet, ProtocolError> {
        let (tx, rx) = oneshot::channel();
        self.call(move |driver| {
            driver.ping(
                &message,
                Some(Box::new(move |result: Result<Packet, ProtocolError>| {
                    let _ = tx.send(result);
                })),
            )
        })
        .await??;
        rx.await.map_err(|_| ProtocolError::DriverStopped)?
    }

    /// Query the version and wait for the reply
    pub async fn get_version(&self) -> Result<Packet, ProtocolError> {
        let (tx, rx) = oneshot::channel();
        self.call(move |driver| {
            driver.get_version(Some(Box::new(move |result: Result<Packet, ProtocolError>| {
                let _ = tx.send(result);
            })))
        })
        .await??;
        rx.await.map_err(|_| ProtocolError::DriverStopped)?
    }

    /// Status snapshot
    pub async fn status(&self) -> Result<DriverStatus, ProtocolError> {
        self.call(|driver| driver.status()).await
    }

    /// Ask the task to take the display down and exit
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }

    /// Whether the task has exited
    pub fn is_closed(&self) -> bool {
        self.jobs.is_closed()
    }
}

/// Start the driver task.
///
/// The driver should already be connected and set up. The task exits when
/// cancelled, when every handle is dropped, or when the link fails; the
/// display is taken down on the way out.
pub fn spawn(driver: CrystalfontzDriver) -> (DriverHandle, JoinHandle<Result<(), ProtocolError>>) {
    let (jobs, rx) = mpsc::channel(REQUEST_CHANNEL_SIZE);
    let cancel = CancellationToken::new();
    let task = tokio::spawn(run(driver, rx, cancel.clone()));
    (DriverHandle { jobs, cancel }, task)
}

async fn run(
    mut driver: CrystalfontzDriver,
    mut jobs: mpsc::Receiver<Job>,
    cancel: CancellationToken,
) -> Result<(), ProtocolError> {
    let mut update = interval(Duration::from_millis(driver.transfer_rate_ms()));
    update.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut watch = interval(Duration::from_millis(BIN_WATCH_INTERVAL_MS));
    watch.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let result = loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => {
                debug!("driver task cancelled");
                break Ok(());
            }

            job = jobs.recv() => match job {
                Some(job) => job(&mut driver),
                None => {
                    debug!("all driver handles dropped");
                    break Ok(());
                }
            },

            _ = update.tick() => {
                if let Err(e) = driver.update() {
                    break Err(e);
                }
            }

            _ = watch.tick() => {
                if let Err(e) = driver.bin_watch() {
                    break Err(e);
                }
            }
        }
    };

    driver.take_down();
    result
}
