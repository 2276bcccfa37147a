//! # Pipeline orchestrator
//!
//! Binds the adapter registry, per-provider queues, response cache, and
//! cost tracker together per request.
//!
//! Non-streaming: resolve → cache lookup → queue admission → adapter call →
//! cost record → cache store. Streaming: resolve → adapter stream, chunks
//! renormalized under one completion id; the cache and queue are bypassed
//! (a stream cannot be memoized, and its duration is unbounded so it would
//! pin an admission slot).
//!
//! Client disconnects propagate through a `CancellationToken`: the queue
//! executor aborts the in-flight HTTP call, and cache/cost effects for the
//! incomplete response are skipped.

use std::collections::HashMap;
use std::pin::Pin;
use std::sync::Arc;

use futures::{Stream, StreamExt};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use manifold_core::{ids, ChatRequest, ChatResponse, FinishReason, GatewayError, StreamChunk};
use manifold_llm::registry::AdapterRegistry;

use crate::cache::{fingerprint, ResponseCache};
use crate::cost::CostTracker;
use crate::limits;
use crate::queue::{Job, ProviderQueue, QueueStats};

/// Boxed stream of canonical chunks produced by the gateway.
pub type GatewayStream = Pin<Box<dyn Stream<Item = Result<StreamChunk, GatewayError>> + Send>>;

/// The per-request orchestrator. One instance per process.
pub struct Gateway {
    registry: Arc<AdapterRegistry>,
    queues: HashMap<String, Arc<ProviderQueue>>,
    cache: Arc<ResponseCache>,
    costs: Arc<CostTracker>,
}

impl Gateway {
    /// Wire a gateway over a frozen registry. One queue is created per
    /// registered provider, using the preset limits.
    pub fn new(
        registry: Arc<AdapterRegistry>,
        cache: Arc<ResponseCache>,
        costs: Arc<CostTracker>,
    ) -> Self {
        let queues = registry
            .provider_ids()
            .into_iter()
            .map(|id| {
                let queue = ProviderQueue::new(id.clone(), limits::preset(&id));
                (id, queue)
            })
            .collect();
        Self { registry, queues, cache, costs }
    }

    /// The adapter registry.
    pub fn registry(&self) -> &Arc<AdapterRegistry> {
        &self.registry
    }

    /// The response cache.
    pub fn cache(&self) -> &Arc<ResponseCache> {
        &self.cache
    }

    /// The cost tracker.
    pub fn costs(&self) -> &Arc<CostTracker> {
        &self.costs
    }

    /// Per-provider queue counters.
    pub fn queue_stats(&self) -> HashMap<String, QueueStats> {
        self.queues.iter().map(|(id, q)| (id.clone(), q.stats())).collect()
    }

    /// Execute a non-streaming chat completion.
    pub async fn chat_completion(
        &self,
        request: &ChatRequest,
        priority: i32,
        cancel: CancellationToken,
    ) -> Result<ChatResponse, GatewayError> {
        let Some((adapter, target)) = self.registry.resolve_adapter(&request.model) else {
            return Err(GatewayError::invalid_request(format!(
                "no provider available for model '{}'",
                request.model
            )));
        };

        let key = fingerprint(request, &target.model);
        if let Some(hit) = self.cache.get(&key) {
            debug!(provider = %target.provider, model = %target.model, "cache hit");
            let _ = self.costs.track(&hit, &target.provider);
            return Ok(hit);
        }

        let queue = self
            .queues
            .get(&target.provider)
            .cloned()
            .ok_or_else(|| GatewayError::internal("no queue for resolved provider"))?;

        // Forward the resolved model so adapters never see a router prefix.
        let mut job_request = request.clone();
        job_request.model = target.model.clone();
        let job: Job = Box::pin(async move {
            adapter.chat(&job_request).await.map_err(GatewayError::from)
        });

        let response = queue.enqueue(job, priority, cancel).await?;

        let _ = self.costs.track(&response, &target.provider);
        self.cache.set(&key, response.clone(), None);
        Ok(response)
    }

    /// Execute a streaming chat completion.
    ///
    /// The returned stream opens with a `delta.role = assistant` chunk,
    /// carries each non-empty content delta, and closes with a terminal
    /// chunk. On a mid-stream adapter error, the error is yielded and the
    /// stream ends; on cancellation, no further chunks are emitted.
    pub async fn stream_chat_completion(
        &self,
        request: &ChatRequest,
        cancel: CancellationToken,
    ) -> Result<GatewayStream, GatewayError> {
        let Some((adapter, target)) = self.registry.resolve_adapter(&request.model) else {
            return Err(GatewayError::invalid_request(format!(
                "no provider available for model '{}'",
                request.model
            )));
        };

        let mut routed = request.clone();
        routed.model = target.model.clone();
        let inner = adapter.chat_stream(&routed).await.map_err(GatewayError::from)?;

        let id = ids::completion_id();
        let created = ids::unix_now();
        let model = target.model.clone();

        let stream = async_stream::stream! {
            yield Ok(StreamChunk::role_preamble(&id, created, &model));

            let mut inner = std::pin::pin!(inner);
            let mut reason = FinishReason::Stop;
            loop {
                tokio::select! {
                    item = inner.next() => match item {
                        Some(Ok(chunk)) => {
                            if let Some(r) =
                                chunk.choices.first().and_then(|c| c.finish_reason)
                            {
                                reason = r;
                            }
                            if let Some(text) = chunk.content_delta() {
                                if !text.is_empty() {
                                    yield Ok(StreamChunk::content(&id, created, &model, text));
                                }
                            }
                        }
                        Some(Err(e)) => {
                            yield Err(GatewayError::from(e));
                            return;
                        }
                        None => break,
                    },
                    () = cancel.cancelled() => {
                        debug!("stream cancelled by client");
                        return;
                    }
                }
            }

            yield Ok(StreamChunk::terminal(&id, created, &model, reason));
        };

        Ok(Box::pin(stream))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
