//! In-memory response store.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use axum::{
    body::{Body, Bytes},
    http::{HeaderMap, StatusCode},
    response::Response,
};
use dashmap::DashMap;

/// A fully received response snapshot.
#[derive(Debug, Clone)]
pub struct CachedResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    stored_at: Instant,
    generation: u64,
}

impl CachedResponse {
    pub fn new(status: StatusCode, headers: HeaderMap, body: Bytes) -> Self {
        Self {
            status,
            headers,
            body,
            stored_at: Instant::now(),
            generation: 0,
        }
    }

    fn is_fresh(&self, ttl: Duration) -> bool {
        self.stored_at.elapsed() < ttl
    }

    pub fn into_response(self) -> Response {
        let mut response = Response::new(Body::from(self.body));
        *response.status_mut() = self.status;
        *response.headers_mut() = self.headers;
        response
    }
}

/// Bounded TTL cache keyed by request URI.
///
/// Only the cache writer inserts; request handlers read.
#[derive(Debug, Clone)]
pub struct ResponseCache {
    entries: Arc<DashMap<String, CachedResponse>>,
    order: Arc<Mutex<InsertionOrder>>,
    ttl: Duration,
    max_entries: usize,
}

/// Keys in insertion order, each tagged with the generation it was stored
/// under. A record whose generation no longer matches the map is stale.
#[derive(Debug, Default)]
struct InsertionOrder {
    queue: VecDeque<(String, u64)>,
    next_generation: u64,
}

impl ResponseCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: Arc::new(DashMap::new()),
            order: Arc::new(Mutex::new(InsertionOrder::default())),
            ttl,
            max_entries,
        }
    }

    /// Fresh entry for `key`. Expired entries are dropped on sight.
    pub fn get(&self, key: &str) -> Option<CachedResponse> {
        let entry = self.entries.get(key)?;
        if entry.is_fresh(self.ttl) {
            return Some(entry.value().clone());
        }
        drop(entry);
        self.entries.remove_if(key, |_, cached| !cached.is_fresh(self.ttl));
        None
    }

    pub fn insert(&self, key: String, mut response: CachedResponse) {
        let mut order = self.order.lock().unwrap_or_else(PoisonError::into_inner);

        if !self.entries.contains_key(&key) {
            while self.entries.len() >= self.max_entries && self.evict_oldest(&mut order) {}
        }

        let generation = order.next_generation;
        order.next_generation += 1;
        response.generation = generation;
        order.queue.push_back((key.clone(), generation));
        self.entries.insert(key, response);

        // Overwrites and read-side expiry leave stale records behind.
        if order.queue.len() > self.max_entries.saturating_mul(2) {
            let entries = &self.entries;
            order
                .queue
                .retain(|(k, g)| entries.get(k).is_some_and(|e| e.generation == *g));
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Remove the earliest stored live entry. With a fixed TTL this is also
    /// the first to expire. Returns `false` once nothing is left to evict.
    fn evict_oldest(&self, order: &mut InsertionOrder) -> bool {
        while let Some((key, generation)) = order.queue.pop_front() {
            if self
                .entries
                .remove_if(&key, |_, cached| cached.generation == generation)
                .is_some()
            {
                return true;
            }
        }
        false
    }
}
