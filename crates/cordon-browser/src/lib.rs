//! Browser operations: a thin, stateful coordinator over an external
//! headless-browser driver, with a bounded console-log ring.

pub mod driver;
pub mod session;

pub use driver::{
    BrowserDriver, ConsoleEntry, ContentFormat, DriverError, ScreenshotTarget,
    UnconfiguredDriver, WaitState,
};
pub use session::{normalize_url, BrowserError, BrowserSession, SessionState, MAX_CONSOLE_ENTRIES};
