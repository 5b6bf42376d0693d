use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::events::{parse_update, InboundUpdate};
use crate::service::BotService;
use crate::transport::{TransportError, UpdateSource};

const WORKER_QUEUE_DEPTH: usize = 32;
const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_secs(300);

#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("update polling failed {attempts} times in a row; last error: {last_error}")]
    RetriesExhausted { attempts: u32, last_error: TransportError },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReconnectPolicy {
    pub max_retries: u32,
    pub base_delay_ms: u64,
    pub max_delay_ms: u64,
}

impl Default for ReconnectPolicy {
    fn default() -> Self {
        Self { max_retries: 5, base_delay_ms: 250, max_delay_ms: 5_000 }
    }
}

impl ReconnectPolicy {
    fn backoff(&self, attempt: u32) -> Duration {
        let exponent = attempt.min(16);
        let multiplier = 1_u64 << exponent;
        let delay_ms = self.base_delay_ms.saturating_mul(multiplier).min(self.max_delay_ms);
        Duration::from_millis(delay_ms)
    }
}

struct ChatWorker {
    sender: mpsc::Sender<InboundUpdate>,
    handle: JoinHandle<()>,
}

/// Long-poll loop. Updates for one chat run strictly in arrival order on that
/// chat's worker; different chats proceed independently.
pub struct PollingRunner {
    source: Arc<dyn UpdateSource>,
    service: Arc<BotService>,
    reconnect_policy: ReconnectPolicy,
    idle_timeout: Duration,
}

impl PollingRunner {
    pub fn new(
        source: Arc<dyn UpdateSource>,
        service: Arc<BotService>,
        reconnect_policy: ReconnectPolicy,
    ) -> Self {
        Self { source, service, reconnect_policy, idle_timeout: DEFAULT_IDLE_TIMEOUT }
    }

    /// How long a chat worker waits for its next update before exiting.
    pub fn with_idle_timeout(mut self, idle_timeout: Duration) -> Self {
        self.idle_timeout = idle_timeout;
        self
    }

    /// Polls until the source closes. Returns an error once polling has failed
    /// `max_retries + 1` times in a row. In-flight chat work is finished either way.
    pub async fn start(&self) -> Result<(), RunnerError> {
        self.run_until(std::future::pending()).await
    }

    /// Same as [`PollingRunner::start`], but also stops polling once `shutdown`
    /// resolves. An abandoned long poll is re-delivered by the next process.
    pub async fn run_until<F>(&self, shutdown: F) -> Result<(), RunnerError>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut workers: HashMap<i64, ChatWorker> = HashMap::new();
        let mut offset: Option<i64> = None;
        let mut failures: u32 = 0;

        info!(event_name = "ingress.telegram.polling_started", "telegram polling started");

        let outcome = loop {
            let polled = tokio::select! {
                _ = &mut shutdown => {
                    info!(
                        event_name = "ingress.telegram.polling_stopped",
                        reason = "shutdown",
                        "telegram polling stopped"
                    );
                    break Ok(());
                }
                polled = self.source.next_batch(offset) => polled,
            };

            match polled {
                Ok(Some(batch)) => {
                    failures = 0;
                    workers.retain(|_, worker| !worker.handle.is_finished());
                    for update in batch {
                        let next = i64::from(update.id.0) + 1;
                        offset = Some(offset.map_or(next, |offset| offset.max(next)));
                        match parse_update(update) {
                            Some(inbound) => self.dispatch(&mut workers, inbound),
                            None => debug!(?offset, "skipping unsupported update"),
                        }
                    }
                }
                Ok(None) => {
                    info!(
                        event_name = "ingress.telegram.polling_stopped",
                        reason = "source_closed",
                        "telegram polling stopped"
                    );
                    break Ok(());
                }
                Err(error) => {
                    warn!(
                        event_name = "ingress.telegram.poll_failed",
                        attempt = failures,
                        max_retries = self.reconnect_policy.max_retries,
                        error = %error,
                        "telegram polling failed"
                    );
                    if failures >= self.reconnect_policy.max_retries {
                        break Err(RunnerError::RetriesExhausted {
                            attempts: failures + 1,
                            last_error: error,
                        });
                    }

                    let delay = self.reconnect_policy.backoff(failures);
                    failures += 1;
                    if !delay.is_zero() {
                        tokio::select! {
                            _ = &mut shutdown => break Ok(()),
                            _ = tokio::time::sleep(delay) => {}
                        }
                    }
                }
            }
        };

        drain_workers(workers).await;
        outcome
    }

    /// Never waits on a chat's queue, so one stalled chat cannot hold up
    /// polling for the others. Updates beyond a full queue are dropped.
    fn dispatch(&self, workers: &mut HashMap<i64, ChatWorker>, update: InboundUpdate) {
        let chat_id = update.chat_id;
        let (update, previous) = match workers.remove(&chat_id) {
            Some(worker) => match worker.sender.try_send(update) {
                Ok(()) => {
                    workers.insert(chat_id, worker);
                    return;
                }
                Err(TrySendError::Full(update)) => {
                    warn!(
                        event_name = "ingress.telegram.update_shed",
                        session_id = chat_id,
                        update_id = update.update_id,
                        queue_depth = WORKER_QUEUE_DEPTH,
                        "chat worker is backlogged, dropping update"
                    );
                    workers.insert(chat_id, worker);
                    return;
                }
                Err(TrySendError::Closed(update)) => (update, Some(worker.handle)),
            },
            None => (update, None),
        };

        let (sender, receiver) = mpsc::channel(WORKER_QUEUE_DEPTH);
        // A fresh channel always has room for the first update.
        if sender.try_send(update).is_err() {
            warn!(session_id = chat_id, "could not queue update for a new chat worker");
            return;
        }
        let handle = tokio::spawn(run_chat_worker(
            chat_id,
            receiver,
            self.service.clone(),
            self.idle_timeout,
            previous,
        ));
        workers.insert(chat_id, ChatWorker { sender, handle });
    }
}

async fn run_chat_worker(
    chat_id: i64,
    mut receiver: mpsc::Receiver<InboundUpdate>,
    service: Arc<BotService>,
    idle_timeout: Duration,
    previous: Option<JoinHandle<()>>,
) {
    // The worker this one replaces may still be finishing queued updates.
    if let Some(previous) = previous {
        if let Err(error) = previous.await {
            warn!(session_id = chat_id, error = %error, "previous chat worker ended abnormally");
        }
    }
    debug!(session_id = chat_id, "chat worker started");

    loop {
        match tokio::time::timeout(idle_timeout, receiver.recv()).await {
            Ok(Some(update)) => service.handle(update).await,
            Ok(None) => break,
            Err(_) => {
                receiver.close();
                while let Some(update) = receiver.recv().await {
                    service.handle(update).await;
                }
                break;
            }
        }
    }

    debug!(session_id = chat_id, "chat worker stopped");
}

async fn drain_workers(workers: HashMap<i64, ChatWorker>) {
    let handles: Vec<(i64, JoinHandle<()>)> = workers
        .into_iter()
        .map(|(chat_id, worker)| {
            drop(worker.sender);
            (chat_id, worker.handle)
        })
        .collect();

    for (chat_id, handle) in handles {
        if let Err(error) = handle.await {
            warn!(session_id = chat_id, error = %error, "chat worker ended abnormally");
        }
    }
}
