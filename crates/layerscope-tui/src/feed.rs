//! Pull-based handoff between the generation driver and the renderer.
//!
//! The driver blocks inside the backend, so it lives on its own thread. The
//! renderer asks for one snapshot at a time; the producer computes exactly
//! one step per request and never runs ahead.

use std::sync::Arc;
use std::thread;

use layerscope_core::CoreError;
use layerscope_core::MeasurementSnapshot;
use tokio::sync::mpsc;
use tokio::sync::oneshot;
use tracing::debug;

use crate::error::DashboardError;
use crate::error::Result;

type Step = Option<std::result::Result<Arc<MeasurementSnapshot>, CoreError>>;

pub struct SnapshotFeed {
    requests: mpsc::Sender<oneshot::Sender<Step>>,
    finished: bool,
}

impl SnapshotFeed {
    /// Move `steps` onto a producer thread. Dropping the feed stops the
    /// producer once its current step returns.
    pub fn spawn<I>(steps: I) -> Result<Self>
    where
        I: Iterator<Item = std::result::Result<MeasurementSnapshot, CoreError>> + Send + 'static,
    {
        let (requests, mut request_rx) = mpsc::channel::<oneshot::Sender<Step>>(1);
        thread::Builder::new()
            .name("layerscope-driver".to_string())
            .spawn(move || {
                let mut steps = steps.fuse();
                while let Some(reply) = request_rx.blocking_recv() {
                    let step: Step = steps.next().map(|result| result.map(Arc::new));
                    let last = !matches!(step, Some(Ok(_)));
                    if reply.send(step).is_err() {
                        debug!("snapshot request abandoned before the step finished");
                    }
                    if last {
                        break;
                    }
                }
                debug!("snapshot producer exiting");
            })?;
        Ok(Self {
            requests,
            finished: false,
        })
    }

    /// The next snapshot, `Ok(None)` once the run is over, or the error that
    /// ended it. After the end or an error every call returns `Ok(None)`.
    pub async fn next_snapshot(&mut self) -> Result<Option<Arc<MeasurementSnapshot>>> {
        if self.finished {
            return Ok(None);
        }
        let (reply, reply_rx) = oneshot::channel();
        if self.requests.send(reply).await.is_err() {
            self.finished = true;
            return Err(DashboardError::ProducerGone);
        }
        let step = match reply_rx.await {
            Ok(step) => step,
            Err(_) => {
                self.finished = true;
                return Err(DashboardError::ProducerGone);
            }
        };
        match step {
            Some(Ok(snapshot)) => Ok(Some(snapshot)),
            Some(Err(err)) => {
                self.finished = true;
                Err(err.into())
            }
            None => {
                self.finished = true;
                Ok(None)
            }
        }
    }
}
