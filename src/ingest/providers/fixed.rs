// src/ingest/providers/fixed.rs
//! In-process fetcher with a scripted outcome. Used by tests and local demos.
//!
//! Clones share state, so a test can hand one clone to the gateway and keep
//! another to flip the outcome or read the call counter.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::ingest::types::{RawItem, SourceFetcher};

#[derive(Clone)]
enum Script {
    Items(Vec<RawItem>),
    Fail(FetchError),
    Panic,
}

#[derive(Clone)]
pub struct FixedFetcher {
    script: Arc<Mutex<Script>>,
    delay: Duration,
    calls: Arc<AtomicUsize>,
}

impl FixedFetcher {
    fn with_script(script: Script) -> Self {
        Self {
            script: Arc::new(Mutex::new(script)),
            delay: Duration::ZERO,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn ok(items: Vec<RawItem>) -> Self {
        Self::with_script(Script::Items(items))
    }

    pub fn failing(err: FetchError) -> Self {
        Self::with_script(Script::Fail(err))
    }

    pub fn panicking() -> Self {
        Self::with_script(Script::Panic)
    }

    /// Sleep this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn set_items(&self, items: Vec<RawItem>) {
        *self.script.lock().expect("fixed fetcher mutex poisoned") = Script::Items(items);
    }

    pub fn set_failure(&self, err: FetchError) {
        *self.script.lock().expect("fixed fetcher mutex poisoned") = Script::Fail(err);
    }

    /// Number of `fetch_latest` invocations so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SourceFetcher for FixedFetcher {
    async fn fetch_latest(&self) -> Result<Vec<RawItem>, FetchError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let script = self
            .script
            .lock()
            .expect("fixed fetcher mutex poisoned")
            .clone();
        match script {
            Script::Items(items) => Ok(items),
            Script::Fail(e) => Err(e),
            Script::Panic => panic!("fixed fetcher scripted to panic"),
        }
    }

    fn name(&self) -> &str {
        "fixed"
    }
}
