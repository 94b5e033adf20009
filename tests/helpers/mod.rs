//! Shared fixtures for integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use audience_segments::{FetchError, FetchRequest, SegmentFetcher};
use serde_json::{Value, json};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::Barrier;

pub const API_KEY: &str = "W4WzcEs-ABgXorzY7h1LCQ";

type Responder = dyn Fn(&FetchRequest, usize) -> Result<Vec<String>, FetchError> + Send + Sync;

/// A `SegmentFetcher` that answers from a closure and counts calls.
pub struct ScriptedFetcher {
    calls: AtomicUsize,
    requests: parking_lot::Mutex<Vec<FetchRequest>>,
    barrier: Option<Arc<Barrier>>,
    respond: Box<Responder>,
}

impl ScriptedFetcher {
    /// The closure receives the request and the zero-based call number.
    pub fn new(
        respond: impl Fn(&FetchRequest, usize) -> Result<Vec<String>, FetchError> + Send + Sync + 'static,
    ) -> Self {
        Self {
            calls: AtomicUsize::new(0),
            requests: parking_lot::Mutex::new(Vec::new()),
            barrier: None,
            respond: Box::new(respond),
        }
    }

    /// Always answer with the given segments.
    pub fn returning(segments: &[&str]) -> Self {
        let segments: Vec<String> = segments.iter().map(|s| s.to_string()).collect();
        Self::new(move |_, _| Ok(segments.clone()))
    }

    /// Hold every fetch until `parties` fetches are in flight at once.
    pub fn with_barrier(mut self, parties: usize) -> Self {
        self.barrier = Some(Arc::new(Barrier::new(parties)));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl SegmentFetcher for ScriptedFetcher {
    async fn fetch(&self, request: &FetchRequest) -> Result<Vec<String>, FetchError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests.lock().push(request.clone());
        if let Some(barrier) = &self.barrier {
            barrier.wait().await;
        }
        (self.respond)(request, call)
    }
}

pub fn strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

/// A GraphQL response body with one edge per `(name, is_ready, state)`.
pub fn audiences_response(audiences: &[(&str, bool, &str)]) -> Value {
    let edges: Vec<Value> = audiences
        .iter()
        .map(|(name, is_ready, state)| {
            json!({ "node": { "name": name, "is_ready": is_ready, "state": state } })
        })
        .collect();
    json!({ "data": { "customer": { "audiences": { "edges": edges } } } })
}
