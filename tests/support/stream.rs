//! Scripted source transports for driving the feed layer without I/O.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use edgewire::error::Result;
use edgewire::feed::{SourceTransport, TransportFactory};

/// Shared script driving every transport a factory produces.
///
/// Connect results and messages are consumed front-to-back across
/// reconnections; an exhausted message queue leaves the transport
/// silently connected, polling for later-pushed entries.
#[derive(Default)]
pub struct Script {
    connect_results: Mutex<VecDeque<Result<()>>>,
    messages: Mutex<VecDeque<Option<Result<String>>>>,
    connect_count: AtomicU32,
    sent: Mutex<Vec<String>>,
}

impl Script {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push_connect(&self, result: Result<()>) {
        self.connect_results.lock().unwrap().push_back(result);
    }

    pub fn push_message(&self, message: Option<Result<String>>) {
        self.messages.lock().unwrap().push_back(message);
    }

    pub fn push_json(&self, json: &str) {
        self.push_message(Some(Ok(json.to_string())));
    }

    pub fn connects(&self) -> u32 {
        self.connect_count.load(Ordering::SeqCst)
    }

    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }
}

struct ScriptedTransport {
    script: Arc<Script>,
}

#[async_trait]
impl SourceTransport for ScriptedTransport {
    async fn connect(&mut self) -> Result<()> {
        self.script.connect_count.fetch_add(1, Ordering::SeqCst);
        self.script
            .connect_results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or(Ok(()))
    }

    async fn send(&mut self, text: String) -> Result<()> {
        self.script.sent.lock().unwrap().push(text);
        Ok(())
    }

    async fn next_message(&mut self) -> Option<Result<String>> {
        loop {
            let next = self.script.messages.lock().unwrap().pop_front();
            match next {
                Some(message) => return message,
                None => tokio::time::sleep(Duration::from_millis(2)).await,
            }
        }
    }

    async fn close(&mut self) {}
}

/// Factory producing transports that share one script.
pub fn scripted_factory(script: Arc<Script>) -> TransportFactory {
    Box::new(move || {
        Box::new(ScriptedTransport {
            script: script.clone(),
        })
    })
}
