//! Inference Gateway
//!
//! Every prompt completion in a session goes through one gateway, which owns
//! the only handle to the LLM engine. Requests are queued on an unbounded
//! channel and serviced strictly in submission order by a single worker
//! task, so the engine never sees two calls at once.
//!
//! Failures never surface as errors. An engine error, an elapsed
//! generation timeout, or a closed gateway all deliver an empty string,
//! which callers treat as "no response".

use std::future::Future;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::llm::{GenerationRequest, LLMEngine};

/// Completion callback, run on the worker task
pub type CompletionCallback = Box<dyn FnOnce(String) + Send + 'static>;

enum Reply {
    Channel(oneshot::Sender<String>),
    Callback(CompletionCallback),
}

struct Job {
    id: u64,
    request: GenerationRequest,
    reply: Reply,
}

impl Job {
    fn deliver(self, text: String) {
        match self.reply {
            Reply::Channel(tx) => {
                // Receiver may have been dropped by a cancelled caller
                let _ = tx.send(text);
            }
            Reply::Callback(callback) => {
                if catch_unwind(AssertUnwindSafe(|| callback(text))).is_err() {
                    tracing::error!("Completion callback for request {} panicked", self.id);
                }
            }
        }
    }
}

/// Future resolving to the completion text of one submitted request.
///
/// Resolves to an empty string when generation failed or the gateway was
/// shut down before the request was serviced.
pub struct PendingCompletion {
    rx: oneshot::Receiver<String>,
}

impl Future for PendingCompletion {
    type Output = String;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<String> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|result| result.unwrap_or_default())
    }
}

/// Single-consumer FIFO front end to the LLM engine
pub struct InferenceGateway {
    tx: mpsc::UnboundedSender<Job>,
    next_id: AtomicU64,
    pending: Arc<AtomicUsize>,
    shutdown: CancellationToken,
    worker: Mutex<Option<JoinHandle<()>>>,
    engine_name: String,
}

impl InferenceGateway {
    /// Start a gateway with no generation timeout
    pub fn start(engine: Arc<dyn LLMEngine>) -> Self {
        Self::start_with_timeout(engine, None)
    }

    /// Start a gateway, spawning its worker on the current runtime.
    ///
    /// `timeout` bounds each individual engine call; `None` waits forever.
    pub fn start_with_timeout(engine: Arc<dyn LLMEngine>, timeout: Option<Duration>) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let pending = Arc::new(AtomicUsize::new(0));
        let shutdown = CancellationToken::new();
        let engine_name = engine.name().to_string();

        let worker = tokio::spawn(run_worker(
            engine,
            rx,
            Arc::clone(&pending),
            shutdown.clone(),
            timeout,
        ));

        tracing::info!(
            "Inference gateway started (engine={}, timeout={:?})",
            engine_name,
            timeout
        );

        Self {
            tx,
            next_id: AtomicU64::new(1),
            pending,
            shutdown,
            worker: Mutex::new(Some(worker)),
            engine_name,
        }
    }

    /// Queue a request and return a future for its completion.
    ///
    /// Never blocks. The request is serviced after everything submitted
    /// before it.
    pub fn submit(&self, request: GenerationRequest) -> PendingCompletion {
        let (reply_tx, rx) = oneshot::channel();
        self.enqueue(request, Reply::Channel(reply_tx));
        PendingCompletion { rx }
    }

    /// Queue a request whose completion is handed to `callback`.
    ///
    /// The callback runs exactly once on the worker task. A panicking
    /// callback is logged and does not stop the worker.
    pub fn submit_with<F>(&self, request: GenerationRequest, callback: F)
    where
        F: FnOnce(String) + Send + 'static,
    {
        self.enqueue(request, Reply::Callback(Box::new(callback)));
    }

    /// Submit and wait for the completion
    pub async fn generate(&self, request: GenerationRequest) -> String {
        self.submit(request).await
    }

    /// Number of submitted requests whose completion has not been delivered
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::SeqCst)
    }

    pub fn engine_name(&self) -> &str {
        &self.engine_name
    }

    pub fn is_closed(&self) -> bool {
        self.shutdown.is_cancelled()
    }

    /// Close the queue and wait for the worker to exit.
    ///
    /// Requests still queued, and any submitted afterwards, resolve to an
    /// empty string.
    pub async fn shutdown(&self) {
        self.shutdown.cancel();
        let handle = self.worker.lock().await.take();
        if let Some(handle) = handle {
            if let Err(e) = handle.await {
                tracing::error!("Inference gateway worker ended abnormally: {}", e);
            }
            tracing::info!("Inference gateway stopped");
        }
    }

    fn enqueue(&self, request: GenerationRequest, reply: Reply) {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let job = Job { id, request, reply };

        if self.shutdown.is_cancelled() {
            tracing::debug!("Gateway closed, request {} resolved empty", id);
            job.deliver(String::new());
            return;
        }

        self.pending.fetch_add(1, Ordering::SeqCst);
        if let Err(mpsc::error::SendError(job)) = self.tx.send(job) {
            self.pending.fetch_sub(1, Ordering::SeqCst);
            tracing::debug!("Gateway closed, request {} resolved empty", job.id);
            job.deliver(String::new());
        }
    }
}

async fn run_worker(
    engine: Arc<dyn LLMEngine>,
    mut rx: mpsc::UnboundedReceiver<Job>,
    pending: Arc<AtomicUsize>,
    shutdown: CancellationToken,
    timeout: Option<Duration>,
) {
    loop {
        let job = tokio::select! {
            biased;
            _ = shutdown.cancelled() => break,
            job = rx.recv() => match job {
                Some(job) => job,
                None => break,
            },
        };

        tracing::debug!(
            "Gateway servicing request {} ({} chars)",
            job.id,
            job.request.prompt.len()
        );

        let text = tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                tracing::debug!("Request {} abandoned at shutdown", job.id);
                String::new()
            }
            text = run_one(engine.as_ref(), &job.request, timeout) => text,
        };

        pending.fetch_sub(1, Ordering::SeqCst);
        job.deliver(text);
    }

    rx.close();
    while let Ok(job) = rx.try_recv() {
        pending.fetch_sub(1, Ordering::SeqCst);
        job.deliver(String::new());
    }
}

async fn run_one(
    engine: &dyn LLMEngine,
    request: &GenerationRequest,
    timeout: Option<Duration>,
) -> String {
    let start = std::time::Instant::now();

    let result = match timeout {
        Some(limit) => match tokio::time::timeout(limit, engine.generate(request)).await {
            Ok(result) => result,
            Err(_) => {
                tracing::warn!("Generation timed out after {:?}", limit);
                return String::new();
            }
        },
        None => engine.generate(request).await,
    };

    match result {
        Ok(text) => {
            tracing::debug!(
                "Generation finished in {:.2}s ({} chars)",
                start.elapsed().as_secs_f64(),
                text.len()
            );
            text
        }
        Err(e) => {
            tracing::warn!("Generation failed on {}: {}", engine.name(), e);
            String::new()
        }
    }
}
