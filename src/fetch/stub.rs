//! In-memory page source for run-loop tests

use super::{FetchError, PageSource};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

pub enum Page {
    Html(&'static str),
    Challenge,
    Down,
}

/// Serves canned pages by exact URL and records every request and session refresh.
/// Unknown URLs answer 503.
pub struct StubSource {
    pages: HashMap<String, Page>,
    requested: Mutex<Vec<String>>,
    refreshes: AtomicUsize,
}

impl StubSource {
    pub fn new(pages: Vec<(&str, Page)>) -> Self {
        Self {
            pages: pages.into_iter().map(|(u, p)| (u.to_string(), p)).collect(),
            requested: Mutex::new(Vec::new()),
            refreshes: AtomicUsize::new(0),
        }
    }

    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().unwrap().clone()
    }

    pub fn refreshes(&self) -> usize {
        self.refreshes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PageSource for StubSource {
    async fn fetch_page(&self, url: &str) -> Result<String, FetchError> {
        self.requested.lock().unwrap().push(url.to_string());
        match self.pages.get(url) {
            Some(Page::Html(html)) => Ok(html.to_string()),
            Some(Page::Challenge) => Err(FetchError::Challenge { url: url.to_string() }),
            Some(Page::Down) | None => Err(FetchError::Status {
                status: 503,
                url: url.to_string(),
            }),
        }
    }

    async fn refresh(&self) {
        self.refreshes.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "stub"
    }
}
