//! Image Loads
//!
//! Sessions never fetch anything themselves. They queue load requests; the
//! host performs them (browser image cache, HTTP client, test script) and
//! reports back with `Optimizer::complete_load`.

use std::collections::BTreeMap;

use lqip_dom::NodeId;

use crate::{SessionId, TimerId};

/// Load request handle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadId(u64);

/// What the image is being loaded into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadTarget {
    /// Detached, off-DOM probe image used to warm the cache
    Probe,
    /// An element in the document (the staging clone)
    Element(NodeId),
}

/// A load the host must perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub id: LoadId,
    pub url: String,
    pub target: LoadTarget,
}

/// Result reported by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    Loaded,
    Failed(String),
}

/// Bookkeeping for an unanswered request
#[derive(Debug, Clone)]
pub struct PendingLoad {
    pub owner: SessionId,
    pub url: String,
    pub timeout: Option<TimerId>,
}

/// Outstanding loads and the outbox the host drains
#[derive(Debug, Default)]
pub struct LoadQueue {
    next_id: u64,
    pending: BTreeMap<LoadId, PendingLoad>,
    outbox: Vec<LoadRequest>,
}

impl LoadQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a load on behalf of `owner`
    pub fn request(&mut self, owner: SessionId, url: &str, target: LoadTarget) -> LoadId {
        self.next_id += 1;
        let id = LoadId(self.next_id);
        self.pending.insert(
            id,
            PendingLoad {
                owner,
                url: url.to_string(),
                timeout: None,
            },
        );
        self.outbox.push(LoadRequest {
            id,
            url: url.to_string(),
            target,
        });
        tracing::trace!("Load {:?} queued: {}", id, url);
        id
    }

    /// Remember the timeout timer guarding `id`
    pub fn arm_timeout(&mut self, id: LoadId, timer: TimerId) {
        if let Some(pending) = self.pending.get_mut(&id) {
            pending.timeout = Some(timer);
        }
    }

    /// Requests not yet handed to the host
    pub fn take_requests(&mut self) -> Vec<LoadRequest> {
        std::mem::take(&mut self.outbox)
    }

    /// Settle a request; `None` if it was unknown or already settled
    pub fn complete(&mut self, id: LoadId) -> Option<PendingLoad> {
        self.outbox.retain(|r| r.id != id);
        self.pending.remove(&id)
    }

    pub fn is_pending(&self, id: LoadId) -> bool {
        self.pending.contains_key(&id)
    }

    /// Number of unanswered requests
    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}
