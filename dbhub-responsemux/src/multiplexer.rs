//! The response multiplexer (§4.5): a process-wide `job_id -> channel` map
//! guarded by a read-write mutex, giving callers a synchronous-call shape
//! over the underlying durable queue. Grounded in the teacher's
//! `reqpool::Pool`/`reqactor::Queue` combination — a lock-guarded map
//! drained by one background task.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use dbhub_types::{JobId, ResponseDetails};
use tokio::sync::{oneshot, RwLock};

use crate::error::{MuxError, MuxResult};

/// §5 "Shared-resource policy": the only process-wide mutable structure on
/// the hot path. Writers (`add_receiver`/`remove_receiver`) take the write
/// lock; the checker loop takes the read lock to look up a receiver.
#[derive(Clone)]
pub struct ResponseMultiplexer {
    receivers: Arc<RwLock<HashMap<JobId, oneshot::Sender<ResponseDetails>>>>,
}

impl ResponseMultiplexer {
    pub fn new() -> Self {
        Self {
            receivers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// `AddReceiver` (§4.5): registered before the submit call returns
    /// control to the caller's wait.
    pub async fn add_receiver(&self, job_id: JobId) -> oneshot::Receiver<ResponseDetails> {
        let (tx, rx) = oneshot::channel();
        self.receivers.write().await.insert(job_id, tx);
        rx
    }

    /// `RemoveReceiver` (§4.5): called after the payload is received, or on
    /// caller-side timeout so the checker loop does not leak an entry (§9
    /// "Timeout/cancellation").
    pub async fn remove_receiver(&self, job_id: JobId) {
        self.receivers.write().await.remove(&job_id);
    }

    /// Delivers `details` to the receiver registered for `job_id`, if any.
    /// A missing receiver (caller timed out, or this process restarted) is
    /// a silent no-op (§5), not an error — the caller is responsible for
    /// having already marked the row processed.
    pub(crate) async fn deliver(&self, job_id: JobId, details: ResponseDetails) {
        let mut receivers = self.receivers.write().await;
        if let Some(sender) = receivers.remove(&job_id) {
            let _ = sender.send(details);
        }
    }

    /// `WaitForResponse[T]` (§4.5): blocks the caller on the channel
    /// registered for `job_id`, with a caller-supplied `deadline` (§9:
    /// "Implementations SHOULD wrap the channel receive with a
    /// caller-supplied deadline" — this crate never guesses one). On
    /// timeout the receiver entry is removed before returning.
    pub async fn wait_for_response(
        &self,
        job_id: JobId,
        rx: oneshot::Receiver<ResponseDetails>,
        deadline: Duration,
    ) -> MuxResult<ResponseDetails> {
        match tokio::time::timeout(deadline, rx).await {
            Ok(Ok(details)) => Ok(details),
            Ok(Err(_)) => {
                self.remove_receiver(job_id).await;
                Err(MuxError::ChannelClosed(job_id))
            }
            Err(_) => {
                self.remove_receiver(job_id).await;
                Err(MuxError::Timeout(job_id))
            }
        }
    }
}

impl Default for ResponseMultiplexer {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dbhub_types::job::ResponsePayload;

    #[tokio::test]
    async fn reverse_order_delivery_routes_to_correct_receiver() {
        let mux = ResponseMultiplexer::new();
        let rx1 = mux.add_receiver(1).await;
        let rx2 = mux.add_receiver(2).await;

        mux.deliver(2, ResponseDetails::ok(ResponsePayload::Size { size: 2 })).await;
        mux.deliver(1, ResponseDetails::ok(ResponsePayload::Size { size: 1 })).await;

        let got1 = mux.wait_for_response(1, rx1, Duration::from_secs(1)).await.unwrap();
        let got2 = mux.wait_for_response(2, rx2, Duration::from_secs(1)).await.unwrap();

        match got1.payload {
            ResponsePayload::Size { size } => assert_eq!(size, 1),
            _ => panic!("wrong payload"),
        }
        match got2.payload {
            ResponsePayload::Size { size } => assert_eq!(size, 2),
            _ => panic!("wrong payload"),
        }
    }

    #[tokio::test]
    async fn missing_receiver_delivery_is_a_silent_no_op() {
        let mux = ResponseMultiplexer::new();
        mux.deliver(99, ResponseDetails::ok(ResponsePayload::Empty {})).await;
    }

    #[tokio::test]
    async fn wait_times_out_and_removes_the_receiver() {
        let mux = ResponseMultiplexer::new();
        let rx = mux.add_receiver(1).await;
        let result = mux.wait_for_response(1, rx, Duration::from_millis(10)).await;
        assert!(matches!(result, Err(MuxError::Timeout(1))));
        assert!(mux.receivers.read().await.get(&1).is_none());
    }
}
