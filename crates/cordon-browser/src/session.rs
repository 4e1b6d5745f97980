//! Session coordinator over the driver seam.
//!
//! Lifecycle: Uninitialized → Ready (lazy, on first operation) → Closed.
//! The console ring is bounded and resets on navigation. Inbound URLs that
//! match the remote-workspace host pattern are rewritten to localhost
//! before the driver sees them.

use regex::Regex;
use std::collections::VecDeque;
use std::sync::OnceLock;
use std::time::Duration;
use thiserror::Error;

use crate::driver::{
    BrowserDriver, ConsoleEntry, ContentFormat, DriverError, ScreenshotTarget, WaitState,
};

/// Console ring capacity.
pub const MAX_CONSOLE_ENTRIES: usize = 1000;

#[derive(Debug, Error)]
pub enum BrowserError {
    #[error("browser session is closed")]
    Closed,

    #[error(transparent)]
    Driver(#[from] DriverError),
}

impl BrowserError {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Closed => "BrowserClosed",
            Self::Driver(_) => "BrowserDriver",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Ready,
    Closed,
}

impl SessionState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Ready => "ready",
            Self::Closed => "closed",
        }
    }
}

type DriverFactory = Box<dyn Fn() -> Box<dyn BrowserDriver> + Send + Sync>;

/// Rewrite a remote-workspace URL (codespace host) to the local port it
/// forwards, e.g. `https://name-3000.app.github.dev/x` → `http://localhost:3000/x`.
pub fn normalize_url(url: &str) -> String {
    static HOST_PATTERN: OnceLock<Regex> = OnceLock::new();
    let re = HOST_PATTERN.get_or_init(|| {
        Regex::new(r"^https://[\w-]+-(\d+)\.app\.github\.dev(/.*)?$")
            .expect("host pattern must compile")
    });
    if let Some(caps) = re.captures(url) {
        let port = caps.get(1).map(|m| m.as_str()).unwrap_or("80");
        let path = caps.get(2).map(|m| m.as_str()).unwrap_or("");
        return format!("http://localhost:{}{}", port, path);
    }
    url.to_string()
}

/// One browser context and one page, reused across requests.
pub struct BrowserSession {
    state: SessionState,
    driver: Option<Box<dyn BrowserDriver>>,
    factory: DriverFactory,
    console: VecDeque<ConsoleEntry>,
}

impl BrowserSession {
    pub fn new(factory: impl Fn() -> Box<dyn BrowserDriver> + Send + Sync + 'static) -> Self {
        Self {
            state: SessionState::Uninitialized,
            driver: None,
            factory: Box::new(factory),
            console: VecDeque::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    /// Lazy init: any operation on an uninitialized session brings it up.
    fn driver(&mut self) -> Result<&mut Box<dyn BrowserDriver>, BrowserError> {
        if self.state == SessionState::Closed {
            return Err(BrowserError::Closed);
        }
        if self.driver.is_none() {
            tracing::info!("🌐 browser session initialized");
            self.driver = Some((self.factory)());
            self.state = SessionState::Ready;
        }
        Ok(self.driver.as_mut().expect("driver just initialized"))
    }

    /// Pull driver events into the bounded ring.
    fn absorb_events(&mut self) {
        let events = match self.driver.as_mut() {
            Some(d) => d.drain_events(),
            None => return,
        };
        for entry in events {
            self.console.push_back(entry);
            while self.console.len() > MAX_CONSOLE_ENTRIES {
                self.console.pop_front();
            }
        }
    }

    /// Navigate. Clears the console ring first; returns the normalized URL
    /// actually driven.
    pub async fn navigate(&mut self, url: &str) -> Result<String, BrowserError> {
        let target = normalize_url(url);
        self.console.clear();
        self.driver()?.navigate(&target).await?;
        self.absorb_events();
        Ok(target)
    }

    pub async fn screenshot(&mut self, target: &ScreenshotTarget) -> Result<Vec<u8>, BrowserError> {
        let bytes = self.driver()?.screenshot(target).await?;
        self.absorb_events();
        Ok(bytes)
    }

    pub async fn evaluate(&mut self, expression: &str) -> Result<serde_json::Value, BrowserError> {
        let value = self.driver()?.evaluate(expression).await?;
        self.absorb_events();
        Ok(value)
    }

    pub async fn click(&mut self, selector: &str) -> Result<(), BrowserError> {
        self.driver()?.click(selector).await?;
        self.absorb_events();
        Ok(())
    }

    pub async fn type_text(&mut self, selector: &str, text: &str) -> Result<(), BrowserError> {
        self.driver()?.type_text(selector, text).await?;
        self.absorb_events();
        Ok(())
    }

    pub async fn wait_for(
        &mut self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> Result<bool, BrowserError> {
        let found = self.driver()?.wait_for(selector, state, timeout).await?;
        self.absorb_events();
        Ok(found)
    }

    pub async fn content(&mut self, format: ContentFormat) -> Result<String, BrowserError> {
        let body = self.driver()?.content(format).await?;
        self.absorb_events();
        Ok(body)
    }

    /// Ring contents, optionally filtered by entry type; `drain` empties the
    /// ring after reading.
    pub fn console_logs(&mut self, filter: Option<&str>, drain: bool) -> Vec<ConsoleEntry> {
        self.absorb_events();
        let logs: Vec<ConsoleEntry> = self
            .console
            .iter()
            .filter(|e| filter.map_or(true, |f| e.kind == f))
            .cloned()
            .collect();
        if drain {
            self.console.clear();
        }
        logs
    }

    pub async fn close(&mut self) -> Result<(), BrowserError> {
        if let Some(mut driver) = self.driver.take() {
            driver.close().await?;
        }
        self.state = SessionState::Closed;
        tracing::info!("🌐 browser session closed");
        Ok(())
    }
}
