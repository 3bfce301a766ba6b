//! Conversation cycle tracking: one scratch context per conversation, from inbound message
//! (awaiting reply) until the reply is logged.
//!
//! A cycle that never sees a reply stays pending until the next inbound message for the same
//! conversation replaces it, or until it is the oldest cycle when the tracker is full. Nothing
//! is written for it either way.

use crate::config::DEFAULT_MAX_PENDING_CYCLES;
use crate::context::EventContext;
use crate::events::ConversationKey;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::RwLock;

struct Pending {
    /// Start order; lower began earlier.
    seq: u64,
    ctx: Arc<EventContext>,
}

/// Pending cycles keyed by conversation, at most `limit` at a time.
pub struct CycleTracker {
    inner: Arc<RwLock<HashMap<ConversationKey, Pending>>>,
    limit: usize,
    next_seq: AtomicU64,
}

impl Default for CycleTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl CycleTracker {
    pub fn new() -> Self {
        Self::with_limit(DEFAULT_MAX_PENDING_CYCLES)
    }

    /// Tracker holding at most `limit` pending cycles (minimum 1).
    pub fn with_limit(limit: usize) -> Self {
        Self {
            inner: Arc::new(RwLock::new(HashMap::new())),
            limit: limit.max(1),
            next_seq: AtomicU64::new(0),
        }
    }

    /// Start a cycle for the conversation with a fresh context. When the tracker is full, the
    /// oldest pending cycle of another conversation is dropped.
    pub async fn begin(&self, key: ConversationKey) -> Arc<EventContext> {
        let ctx = Arc::new(EventContext::in_memory());
        let mut g = self.inner.write().await;
        if !g.contains_key(&key) && g.len() >= self.limit {
            let oldest = g
                .iter()
                .min_by_key(|(_, p)| p.seq)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                g.remove(&oldest);
                log::debug!(
                    "cycle {}: dropped without reply, {} cycles pending",
                    oldest,
                    self.limit
                );
            }
        }
        let pending = Pending {
            seq: self.next_seq.fetch_add(1, Ordering::Relaxed),
            ctx: ctx.clone(),
        };
        if g.insert(key.clone(), pending).is_some() {
            log::debug!("cycle {}: previous cycle abandoned without reply", key);
        }
        ctx
    }

    /// End the conversation's cycle. When none is pending, returns an empty context so the
    /// reply is still logged with fallback correlation.
    pub async fn finish(&self, key: &ConversationKey) -> Arc<EventContext> {
        match self.inner.write().await.remove(key) {
            Some(Pending { ctx, .. }) => {
                ctx.reset_signals();
                ctx
            }
            None => {
                log::debug!("cycle {}: reply without a tracked inbound message", key);
                Arc::new(EventContext::in_memory())
            }
        }
    }

    /// Number of cycles awaiting a reply.
    pub async fn pending(&self) -> usize {
        self.inner.read().await.len()
    }
}
