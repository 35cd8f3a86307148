//! In-memory stand-in for a topic-exchange broker, used by tests.

use std::collections::{BTreeSet, HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use super::topic::topic_matches;
use super::topology::Declare;
use crate::utils::{RelayError, Result};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct Snapshot {
    pub exchanges: BTreeSet<String>,
    pub queues: BTreeSet<String>,
    pub bindings: BTreeSet<(String, String, String)>,
}

#[derive(Debug, Default)]
struct State {
    exchanges: BTreeSet<String>,
    queues: HashMap<String, VecDeque<(String, Vec<u8>)>>,
    bindings: BTreeSet<(String, String, String)>,
    declare_calls: usize,
}

#[derive(Debug, Default)]
pub struct MemoryBroker {
    state: Mutex<State>,
}

impl MemoryBroker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn snapshot(&self) -> Snapshot {
        let state = self.state.lock().unwrap();
        Snapshot {
            exchanges: state.exchanges.clone(),
            queues: state.queues.keys().cloned().collect(),
            bindings: state.bindings.clone(),
        }
    }

    pub fn declare_calls(&self) -> usize {
        self.state.lock().unwrap().declare_calls
    }

    /// Routes `body` to every queue bound to `exchange` with a matching key.
    pub fn publish(&self, exchange: &str, routing_key: &str, body: &[u8]) -> Result<usize> {
        let mut state = self.state.lock().unwrap();
        if !state.exchanges.contains(exchange) {
            return Err(RelayError::Topology(format!("no exchange '{exchange}'")));
        }
        let targets: Vec<String> = state
            .bindings
            .iter()
            .filter(|(_, ex, pattern)| ex == exchange && topic_matches(pattern, routing_key))
            .map(|(queue, _, _)| queue.clone())
            .collect();
        for queue in &targets {
            if let Some(q) = state.queues.get_mut(queue) {
                q.push_back((routing_key.to_string(), body.to_vec()));
            }
        }
        Ok(targets.len())
    }

    /// Pops the oldest message on `queue` as `(routing_key, body)`.
    pub fn next_delivery(&self, queue: &str) -> Option<(String, Vec<u8>)> {
        self.state
            .lock()
            .unwrap()
            .queues
            .get_mut(queue)
            .and_then(|q| q.pop_front())
    }
}

#[async_trait]
impl Declare for MemoryBroker {
    async fn declare_exchange(&self, exchange: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.declare_calls += 1;
        state.exchanges.insert(exchange.to_string());
        Ok(())
    }

    async fn declare_queue(&self, queue: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.declare_calls += 1;
        state.queues.entry(queue.to_string()).or_default();
        Ok(())
    }

    async fn bind_queue(&self, queue: &str, exchange: &str, binding_key: &str) -> Result<()> {
        let mut state = self.state.lock().unwrap();
        state.declare_calls += 1;
        if !state.exchanges.contains(exchange) || !state.queues.contains_key(queue) {
            return Err(RelayError::Topology(format!(
                "cannot bind '{queue}' to '{exchange}'"
            )));
        }
        state.bindings.insert((
            queue.to_string(),
            exchange.to_string(),
            binding_key.to_string(),
        ));
        Ok(())
    }
}
