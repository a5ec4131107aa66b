//! Cooperative tick loops: one task per live node, cancellation through a
//! shared watch channel.
//!
//! Every loop ticks immediately, then sleeps its node's `tick_interval`.
//! Cancellation is observed at the sleep boundary: a tick in progress
//! completes, the sleep is aborted, and the task exits without a final
//! partial tick.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::engine;
use crate::error::EngineError;
use crate::node::NodeId;
use crate::registry::Registry;

/// Owns the shutdown channel and the join handles of every node task.
pub struct Scheduler {
    shutdown_tx: watch::Sender<bool>,
    tasks: std::sync::Mutex<Vec<JoinHandle<()>>>,
    leaked: AtomicUsize,
}

impl Default for Scheduler {
    fn default() -> Self {
        Self::new()
    }
}

impl Scheduler {
    /// A scheduler with no tasks and the shutdown flag clear.
    pub fn new() -> Self {
        let (shutdown_tx, _) = watch::channel(false);
        Self {
            shutdown_tx,
            tasks: std::sync::Mutex::new(Vec::new()),
            leaked: AtomicUsize::new(0),
        }
    }

    /// Whether cancellation has not been requested yet.
    pub fn is_running(&self) -> bool {
        !*self.shutdown_tx.borrow()
    }

    /// Tasks that failed to exit within the cancellation grace period.
    pub fn leaked_count(&self) -> usize {
        self.leaked.load(Ordering::SeqCst)
    }

    /// Spawn the tick loop for a node. No-op after cancellation.
    pub fn spawn(&self, registry: Arc<Registry>, id: NodeId, tick_interval: f64) {
        if !self.is_running() {
            tracing::warn!(node = id, "scheduler cancelled, not spawning tick loop");
            return;
        }
        let shutdown_rx = self.shutdown_tx.subscribe();
        let handle = tokio::spawn(run_node(registry, id, tick_interval, shutdown_rx));
        match self.tasks.lock() {
            Ok(mut tasks) => tasks.push(handle),
            Err(poisoned) => poisoned.into_inner().push(handle),
        }
    }

    /// Request cancellation and await every task, bounded overall by
    /// `grace`. Tasks still running at the deadline are recorded as leaked
    /// and left to die with the runtime. Returns the leak count.
    pub async fn cancel_all(&self, grace: Duration) -> usize {
        let _ = self.shutdown_tx.send(true);

        let handles: Vec<JoinHandle<()>> = match self.tasks.lock() {
            Ok(mut tasks) => std::mem::take(&mut *tasks),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        let deadline = Instant::now() + grace;
        let mut leaked = 0usize;
        for handle in handles {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if tokio::time::timeout(remaining, handle).await.is_err() {
                leaked += 1;
            }
        }
        if leaked > 0 {
            self.leaked.fetch_add(leaked, Ordering::SeqCst);
            tracing::warn!(leaked, "tick loops missed the cancellation deadline");
        }
        leaked
    }
}

/// The per-node loop: tick immediately, sleep, repeat. A tick fault is
/// logged and the loop continues; only cancellation exits.
async fn run_node(
    registry: Arc<Registry>,
    id: NodeId,
    tick_interval: f64,
    mut shutdown: watch::Receiver<bool>,
) {
    let dt = if tick_interval.is_finite() && tick_interval > 0.0 {
        tick_interval
    } else {
        1.0
    };
    let interval = Duration::from_secs_f64(dt);

    loop {
        if *shutdown.borrow() {
            break;
        }

        {
            let mut core = registry.core.write().await;
            if let Err(source) = engine::tick_node(&mut core, id, dt) {
                let fault = EngineError::TickFault {
                    id,
                    source: Box::new(source),
                };
                tracing::warn!(node = id, error = %fault, "tick fault, continuing");
            }
        }

        if sleep_or_shutdown(interval, &mut shutdown).await.is_err() {
            // SchedulerShutdown: absorbed, exit without a partial tick.
            break;
        }
    }
    tracing::debug!(node = id, "tick loop exited");
}

async fn sleep_or_shutdown(
    interval: Duration,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<(), EngineError> {
    tokio::select! {
        () = tokio::time::sleep(interval) => Ok(()),
        _ = shutdown.changed() => Err(EngineError::SchedulerShutdown),
    }
}
