//! The driver seam. The concrete headless browser is an external
//! collaborator; cordon only consumes this interface.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DriverError {
    #[error("browser driver error: {0}")]
    Backend(String),
}

/// One console/page event captured by the driver.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleEntry {
    #[serde(rename = "type")]
    pub kind: String,
    pub text: String,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stack: Option<String>,
}

impl ConsoleEntry {
    pub fn new(kind: &str, text: &str) -> Self {
        Self {
            kind: kind.to_string(),
            text: text.to_string(),
            timestamp: Utc::now(),
            location: None,
            stack: None,
        }
    }
}

#[derive(Debug, Clone)]
pub enum ScreenshotTarget {
    FullPage,
    Viewport,
    Selector(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitState {
    Visible,
    Attached,
    Hidden,
    Detached,
}

impl std::str::FromStr for WaitState {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "visible" => Ok(Self::Visible),
            "attached" => Ok(Self::Attached),
            "hidden" => Ok(Self::Hidden),
            "detached" => Ok(Self::Detached),
            other => Err(format!("unknown wait state: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentFormat {
    Html,
    Text,
}

/// Headless-browser primitives the session coordinator drives.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    async fn navigate(&mut self, url: &str) -> Result<(), DriverError>;
    async fn evaluate(&mut self, expression: &str) -> Result<serde_json::Value, DriverError>;
    async fn screenshot(&mut self, target: &ScreenshotTarget) -> Result<Vec<u8>, DriverError>;
    async fn click(&mut self, selector: &str) -> Result<(), DriverError>;
    async fn type_text(&mut self, selector: &str, text: &str) -> Result<(), DriverError>;
    async fn wait_for(
        &mut self,
        selector: &str,
        state: WaitState,
        timeout: Duration,
    ) -> Result<bool, DriverError>;
    async fn content(&mut self, format: ContentFormat) -> Result<String, DriverError>;
    /// Console/page events accumulated since the last drain.
    fn drain_events(&mut self) -> Vec<ConsoleEntry>;
    async fn close(&mut self) -> Result<(), DriverError>;
}

/// Placeholder wired when no real driver is linked in. Session lifecycle
/// and the console ring still behave; page operations report the gap.
pub struct UnconfiguredDriver;

const NO_DRIVER: &str = "no headless browser driver is configured";

#[async_trait]
impl BrowserDriver for UnconfiguredDriver {
    async fn navigate(&mut self, _url: &str) -> Result<(), DriverError> {
        Err(DriverError::Backend(NO_DRIVER.to_string()))
    }

    async fn evaluate(&mut self, _expression: &str) -> Result<serde_json::Value, DriverError> {
        Err(DriverError::Backend(NO_DRIVER.to_string()))
    }

    async fn screenshot(&mut self, _target: &ScreenshotTarget) -> Result<Vec<u8>, DriverError> {
        Err(DriverError::Backend(NO_DRIVER.to_string()))
    }

    async fn click(&mut self, _selector: &str) -> Result<(), DriverError> {
        Err(DriverError::Backend(NO_DRIVER.to_string()))
    }

    async fn type_text(&mut self, _selector: &str, _text: &str) -> Result<(), DriverError> {
        Err(DriverError::Backend(NO_DRIVER.to_string()))
    }

    async fn wait_for(
        &mut self,
        _selector: &str,
        _state: WaitState,
        _timeout: Duration,
    ) -> Result<bool, DriverError> {
        Err(DriverError::Backend(NO_DRIVER.to_string()))
    }

    async fn content(&mut self, _format: ContentFormat) -> Result<String, DriverError> {
        Err(DriverError::Backend(NO_DRIVER.to_string()))
    }

    fn drain_events(&mut self) -> Vec<ConsoleEntry> {
        Vec::new()
    }

    async fn close(&mut self) -> Result<(), DriverError> {
        Ok(())
    }
}
