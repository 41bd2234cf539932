//! The four long-lived crawl stages: IP scanner, URL-frontier resolver,
//! page crawler, plus the shared stop-flag type they all honor.

pub mod ip_scanner;
pub mod page_crawler;
pub mod url_resolver;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Process-wide cooperative cancellation signal, checked at every task
/// boundary within a stage.
#[derive(Clone, Default)]
pub struct StopFlag(Arc<AtomicBool>);

impl StopFlag {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}
