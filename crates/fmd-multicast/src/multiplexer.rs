//! Fan-out writes and readiness polling over a set of endpoints.

use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use futures::future::join_all;
use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, trace, warn};

use crate::endpoint::Endpoint;
use crate::error::{EndpointErrors, EndpointFailure, MulticastError};

/// How long a poll task waits for readiness before checking in again.
pub const POLL_INTERVAL: Duration = Duration::from_secs(1);

const EVENT_CHANNEL_CAPACITY: usize = 64;

/// Readiness notification for one endpoint.
///
/// Carries no payload: the consumer calls
/// [`Endpoint::try_recv_from`] itself and ignores `WouldBlock`.
#[derive(Debug)]
pub struct ReadEvent {
    pub endpoint: Arc<dyn Endpoint>,
    /// `Ok(())` when the endpoint became readable, the error that ended its
    /// poll task otherwise.
    pub result: io::Result<()>,
}

impl ReadEvent {
    pub fn is_readable(&self) -> bool {
        self.result.is_ok()
    }
}

struct PollTask {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

/// Owns a set of endpoints and treats them as one logical connection.
///
/// Writes go to every endpoint. Reads are driven by one poll task per
/// endpoint feeding a shared event channel once [`start`](Self::start) is
/// called.
pub struct Multiplexer {
    endpoints: Vec<Arc<dyn Endpoint>>,
    /// Poll tasks by endpoint index. Empty while stopped.
    tasks: Mutex<HashMap<usize, PollTask>>,
    events_tx: Mutex<Option<mpsc::Sender<ReadEvent>>>,
    events_rx: tokio::sync::Mutex<mpsc::Receiver<ReadEvent>>,
    closed: AtomicBool,
}

impl Multiplexer {
    /// Create a multiplexer over already opened endpoints. Polling is not
    /// started.
    pub fn new(endpoints: Vec<Arc<dyn Endpoint>>) -> Self {
        let (events_tx, events_rx) = mpsc::channel(EVENT_CHANNEL_CAPACITY);

        Self {
            endpoints,
            tasks: Mutex::new(HashMap::new()),
            events_tx: Mutex::new(Some(events_tx)),
            events_rx: tokio::sync::Mutex::new(events_rx),
            closed: AtomicBool::new(false),
        }
    }

    /// The owned endpoints, in dial order.
    pub fn endpoints(&self) -> &[Arc<dyn Endpoint>] {
        &self.endpoints
    }

    /// Spawn a poll task for every endpoint that has none running.
    ///
    /// Endpoints whose task ended after reporting an error are polled again.
    /// Does nothing while every task is running or once closed. Must be called
    /// from within a tokio runtime.
    pub fn start(&self) {
        let Some(events) = self.events_tx.lock().clone() else {
            debug!("Not starting a closed multiplexer");
            return;
        };

        let mut tasks = self.tasks.lock();
        tasks.retain(|_, task| !task.handle.is_finished());

        let mut spawned = 0;
        for (index, endpoint) in self.endpoints.iter().enumerate() {
            if tasks.contains_key(&index) {
                continue;
            }

            let cancel = CancellationToken::new();
            let handle = tokio::spawn(poll_endpoint(
                endpoint.clone(),
                events.clone(),
                cancel.clone(),
            ));
            tasks.insert(index, PollTask { cancel, handle });
            spawned += 1;
        }

        if spawned > 0 {
            info!("Polling {} endpoint(s)", spawned);
        }
    }

    /// Cancel every poll task. Returns without waiting for them to exit.
    pub fn stop(&self) {
        let tasks = std::mem::take(&mut *self.tasks.lock());
        if tasks.is_empty() {
            return;
        }

        for task in tasks.values() {
            task.cancel.cancel();
        }
        debug!("Stopped polling {} endpoint(s)", tasks.len());
    }

    /// Whether any poll task is still running.
    pub fn is_started(&self) -> bool {
        self.tasks
            .lock()
            .values()
            .any(|task| !task.handle.is_finished())
    }

    /// Wait for the next readiness event.
    ///
    /// Returns `None` once the multiplexer is closed and every poll task has
    /// exited.
    pub async fn read(&self) -> Option<ReadEvent> {
        self.events_rx.lock().await.recv().await
    }

    /// Send `buf` to every endpoint concurrently.
    ///
    /// Partial sends are retried until the whole buffer is out or the
    /// endpoint fails. Every endpoint is attempted regardless of the others.
    /// Returns the smallest byte count written to any endpoint; on failure
    /// that count is carried by the returned [`EndpointErrors`].
    pub async fn write(&self, buf: &[u8]) -> Result<usize, MulticastError> {
        let results = join_all(
            self.endpoints
                .iter()
                .map(|endpoint| send_all(endpoint.as_ref(), buf)),
        )
        .await;

        let mut written = if self.endpoints.is_empty() { 0 } else { usize::MAX };
        let mut failures = Vec::new();

        for (endpoint, (n, result)) in self.endpoints.iter().zip(results) {
            written = written.min(n);
            if let Err(error) = result {
                warn!(
                    remote = %endpoint.remote_addr(),
                    "Write failed after {} of {} bytes: {}",
                    n,
                    buf.len(),
                    error
                );
                failures.push(EndpointFailure {
                    local_addr: endpoint.local_addr().ok(),
                    remote_addr: endpoint.remote_addr(),
                    error,
                });
            }
        }

        if failures.is_empty() {
            trace!("Wrote {} bytes to {} endpoint(s)", written, self.endpoints.len());
            Ok(written)
        } else {
            Err(EndpointErrors { failures, written }.into())
        }
    }

    /// Stop polling and close every endpoint.
    ///
    /// All endpoints are closed even if some fail. Calling `close` again is a
    /// no-op.
    pub fn close(&self) -> Result<(), MulticastError> {
        if self.closed.swap(true, Ordering::SeqCst) {
            return Ok(());
        }

        self.stop();
        self.events_tx.lock().take();

        let failures: Vec<EndpointFailure> = self
            .endpoints
            .iter()
            .filter_map(|endpoint| {
                let local_addr = endpoint.local_addr().ok();
                endpoint.close().err().map(|error| EndpointFailure {
                    local_addr,
                    remote_addr: endpoint.remote_addr(),
                    error,
                })
            })
            .collect();

        info!("Closed {} endpoint(s)", self.endpoints.len());

        if failures.is_empty() {
            Ok(())
        } else {
            Err(EndpointErrors {
                failures,
                written: 0,
            }
            .into())
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Drop for Multiplexer {
    fn drop(&mut self) {
        self.stop();
    }
}

async fn send_all(endpoint: &dyn Endpoint, buf: &[u8]) -> (usize, io::Result<()>) {
    let mut written = 0;

    while written < buf.len() {
        match endpoint.send(&buf[written..]).await {
            Ok(0) => {
                let error = io::Error::new(io::ErrorKind::WriteZero, "endpoint accepted no bytes");
                return (written, Err(error));
            }
            Ok(n) => written += n,
            Err(e) => return (written, Err(e)),
        }
    }

    (written, Ok(()))
}

async fn poll_endpoint(
    endpoint: Arc<dyn Endpoint>,
    events: mpsc::Sender<ReadEvent>,
    cancel: CancellationToken,
) {
    let remote = endpoint.remote_addr();
    trace!(%remote, "Poll task started");

    loop {
        let ready = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            ready = time::timeout(POLL_INTERVAL, endpoint.readable()) => ready,
        };

        let result = match ready {
            Ok(Ok(())) => match endpoint.take_error() {
                Ok(None) => Ok(()),
                Ok(Some(e)) | Err(e) => Err(e),
            },
            Ok(Err(e)) => Err(e),
            // Nothing arrived within the poll interval.
            Err(_) => continue,
        };

        let failed = result.is_err();
        if let Err(e) = &result {
            debug!(%remote, "Poll failed: {}", e);
        }

        let event = ReadEvent {
            endpoint: endpoint.clone(),
            result,
        };
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            sent = events.send(event) => {
                if sent.is_err() {
                    break;
                }
            }
        }

        if failed {
            break;
        }
    }

    trace!(%remote, "Poll task exited");
}
