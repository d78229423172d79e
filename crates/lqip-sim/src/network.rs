//! Simulated image network

use lqip_engine::{ImageUrl, LoadId, LoadOutcome, LoadRequest};

use crate::scene::NetworkSpec;

#[derive(Debug)]
struct InFlight {
    due_at: u64,
    id: LoadId,
    outcome: LoadOutcome,
}

/// Answers load requests after a size-dependent latency
#[derive(Debug)]
pub struct FakeNetwork {
    spec: NetworkSpec,
    in_flight: Vec<InFlight>,
    stalled: usize,
}

impl FakeNetwork {
    pub fn new(spec: NetworkSpec) -> Self {
        Self {
            spec,
            in_flight: Vec::new(),
            stalled: 0,
        }
    }

    /// Start serving `requests` at time `now`
    pub fn submit(&mut self, requests: Vec<LoadRequest>, now: u64) {
        for request in requests {
            if self.spec.stall.iter().any(|s| request.url.contains(s.as_str())) {
                tracing::debug!("Network stalls {}", request.url);
                self.stalled += 1;
                continue;
            }
            let outcome = if self.spec.fail.iter().any(|s| request.url.contains(s.as_str())) {
                LoadOutcome::Failed("HTTP 404".into())
            } else {
                LoadOutcome::Loaded
            };
            self.in_flight.push(InFlight {
                due_at: now + self.latency(&request.url),
                id: request.id,
                outcome,
            });
        }
    }

    fn latency(&self, url: &str) -> u64 {
        let width = ImageUrl::parse(url)
            .param("w")
            .and_then(|w| w.parse::<u64>().ok())
            .unwrap_or(0);
        self.spec.latency_ms + width / 100 * self.spec.latency_per_100px_ms
    }

    /// Responses that have arrived by `now`, in arrival order
    pub fn poll(&mut self, now: u64) -> Vec<(LoadId, LoadOutcome)> {
        let mut arrived: Vec<InFlight> = Vec::new();
        let mut index = 0;
        while index < self.in_flight.len() {
            if self.in_flight[index].due_at <= now {
                arrived.push(self.in_flight.remove(index));
            } else {
                index += 1;
            }
        }
        arrived.sort_by_key(|r| (r.due_at, r.id));
        arrived.into_iter().map(|r| (r.id, r.outcome)).collect()
    }

    pub fn is_idle(&self) -> bool {
        self.in_flight.is_empty()
    }

    pub fn stalled(&self) -> usize {
        self.stalled
    }
}
