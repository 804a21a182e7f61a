//! In-process transport double.
//!
//! This is the reference implementation of `Transport` for tests. It does
//! not evaluate SPARQL: it answers every SELECT with canned bindings (or the
//! first scripted response whose needle occurs in the query text), and can
//! simulate outages, error statuses and slow round-trips.
//!
//! Cloning shares state, so a test can keep a handle after moving a clone
//! into an `Engine`.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;

use super::{update_accepted, Bindings, Transport};
use crate::{Error, Result};

/// A simulated failure mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Failure {
    /// Connection refused / DNS / timeout.
    Unreachable,
    /// The store answered with this HTTP status.
    Status(u16),
    /// The store answered 200 with a body that is not a results document.
    MalformedBody,
}

impl Failure {
    fn to_error(self) -> Error {
        match self {
            Failure::Unreachable => Error::Transport("connection refused (simulated)".into()),
            Failure::Status(code) => Error::Protocol(format!("HTTP {code} (simulated)")),
            Failure::MalformedBody => Error::Protocol("unparsable bindings document (simulated)".into()),
        }
    }
}

#[derive(Debug, Default)]
struct MockState {
    default: Bindings,
    scripted: Vec<(String, Bindings)>,
    outage: Option<Failure>,
    update_status: Option<u16>,
    rejected_updates: Vec<(String, u16)>,
    latency: Option<Duration>,
    queries: Vec<String>,
    updates: Vec<String>,
}

/// Scriptable in-memory store stand-in.
#[derive(Debug, Clone, Default)]
pub struct MockTransport {
    inner: Arc<Mutex<MockState>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every SELECT with `bindings`.
    pub fn with_bindings(self, bindings: Bindings) -> Self {
        self.inner.lock().default = bindings;
        self
    }

    /// Answer SELECTs whose text contains `needle` with `bindings`.
    pub fn respond_when(self, needle: impl Into<String>, bindings: Bindings) -> Self {
        self.inner.lock().scripted.push((needle.into(), bindings));
        self
    }

    /// Delay every round-trip.
    pub fn with_latency(self, latency: Duration) -> Self {
        self.inner.lock().latency = Some(latency);
        self
    }

    /// Status the update endpoint answers with (default 204).
    pub fn with_update_status(self, status: u16) -> Self {
        self.inner.lock().update_status = Some(status);
        self
    }

    /// Updates whose payload contains `needle` are answered with `status`.
    pub fn reject_updates_containing(self, needle: impl Into<String>, status: u16) -> Self {
        self.inner.lock().rejected_updates.push((needle.into(), status));
        self
    }

    /// Start failing every round-trip.
    pub fn fail_with(&self, failure: Failure) {
        self.inner.lock().outage = Some(failure);
    }

    /// End a simulated outage.
    pub fn recover(&self) {
        self.inner.lock().outage = None;
    }

    /// SELECT texts received, in order.
    pub fn queries(&self) -> Vec<String> {
        self.inner.lock().queries.clone()
    }

    /// Update payloads received, in order.
    pub fn updates(&self) -> Vec<String> {
        self.inner.lock().updates.clone()
    }

    /// Total round-trips attempted.
    pub fn call_count(&self) -> usize {
        let state = self.inner.lock();
        state.queries.len() + state.updates.len()
    }

    async fn delay(&self) {
        let latency = self.inner.lock().latency;
        if let Some(d) = latency {
            tokio::time::sleep(d).await;
        }
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn select(&self, query: &str) -> Result<Bindings> {
        self.inner.lock().queries.push(query.to_owned());
        self.delay().await;

        let state = self.inner.lock();
        if let Some(failure) = state.outage {
            return Err(failure.to_error());
        }
        let answer = state
            .scripted
            .iter()
            .find(|(needle, _)| query.contains(needle.as_str()))
            .map(|(_, b)| b)
            .unwrap_or(&state.default);
        Ok(answer.clone())
    }

    async fn update(&self, payload: &str) -> Result<()> {
        self.inner.lock().updates.push(payload.to_owned());
        self.delay().await;

        let state = self.inner.lock();
        if let Some(failure) = state.outage {
            return Err(failure.to_error());
        }
        let status = state
            .rejected_updates
            .iter()
            .find(|(needle, _)| payload.contains(needle.as_str()))
            .map(|(_, status)| *status)
            .or(state.update_status)
            .unwrap_or(204);
        if update_accepted(status) {
            Ok(())
        } else {
            Err(Error::Protocol(format!("update rejected with HTTP {status} (simulated)")))
        }
    }
}
