//! Per-network dispatch queues.
//!
//! Each network gets one FIFO queue and at most one worker task,
//! started lazily on first enqueue. A single worker per network keeps
//! exactly one transfer submission in flight at a time, which avoids
//! sequence/nonce races in the chain client. Workers for different
//! networks run independently.

use async_trait::async_trait;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Where asynchronous worker replies go. The chat-platform glue
/// provides the implementation.
pub trait ReplySink: Send + Sync {
    fn post(&self, text: String);
}

/// A request that passed admission and cap checks, waiting for its
/// network's worker. Consumed exactly once; lost on process crash
/// (the faucet is best-effort, not a ledger of record).
#[derive(Clone)]
pub struct QueuedRequest {
    pub network_id: String,
    pub requester: String,
    pub address: String,
    /// Display denomination.
    pub denom: String,
    /// On-chain denomination the transfer is submitted in.
    pub original_denom: String,
    pub amount: u128,
    pub fee: u64,
    /// Privileged requester: rate-limit gate was skipped, so there is
    /// no admission entry to roll back.
    pub bypass: bool,
    pub sink: Arc<dyn ReplySink>,
}

impl fmt::Debug for QueuedRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueuedRequest")
            .field("network_id", &self.network_id)
            .field("requester", &self.requester)
            .field("address", &self.address)
            .field("amount", &self.amount)
            .field("denom", &self.denom)
            .field("bypass", &self.bypass)
            .finish()
    }
}

/// Processes one dequeued request. Implementations must not let a
/// single item's failure escape; the worker loop relies on that to
/// keep serving subsequent items.
#[async_trait]
pub trait RequestProcessor: Send + Sync + 'static {
    async fn process(&self, request: QueuedRequest);
}

struct WorkerHandle {
    tx: mpsc::UnboundedSender<QueuedRequest>,
    task: JoinHandle<()>,
}

/// One unbounded FIFO queue per network with an idempotently started
/// worker task.
#[derive(Default)]
pub struct DispatchQueue {
    workers: Mutex<HashMap<String, WorkerHandle>>,
}

impl DispatchQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Enqueue a request for its network's worker, starting the
    /// worker first if none is live. Never blocks.
    pub fn enqueue(&self, request: QueuedRequest, processor: Arc<dyn RequestProcessor>) {
        let network_id = request.network_id.clone();
        let mut workers = self.workers.lock().expect("dispatch queue lock poisoned");

        let needs_start = match workers.get(&network_id) {
            Some(handle) => handle.task.is_finished(),
            None => true,
        };
        if needs_start {
            workers.insert(
                network_id.clone(),
                spawn_worker(&network_id, processor.clone()),
            );
        }

        let handle = workers.get(&network_id).expect("worker just ensured");
        if let Err(unsent) = handle.tx.send(request) {
            // The worker exited between the liveness check and the
            // send; restart it and hand the request over.
            debug!(network = %network_id, "dispatch worker channel closed, restarting");
            let fresh = spawn_worker(&network_id, processor);
            let _ = fresh.tx.send(unsent.0);
            workers.insert(network_id, fresh);
        }
    }

    /// Whether a live worker exists for `network_id`.
    pub fn worker_alive(&self, network_id: &str) -> bool {
        self.workers
            .lock()
            .expect("dispatch queue lock poisoned")
            .get(network_id)
            .map(|handle| !handle.task.is_finished())
            .unwrap_or(false)
    }
}

fn spawn_worker(network_id: &str, processor: Arc<dyn RequestProcessor>) -> WorkerHandle {
    let (tx, mut rx) = mpsc::unbounded_channel::<QueuedRequest>();
    let network = network_id.to_string();

    let task = tokio::spawn(async move {
        info!(network = %network, "dispatch worker started");
        while let Some(request) = rx.recv().await {
            debug!(?request, "dispatching queued request");
            processor.process(request).await;
        }
        info!(network = %network, "dispatch worker stopped");
    });

    WorkerHandle { tx, task }
}
