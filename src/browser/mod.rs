//! Headless browser control: discovery/launch, the per-crawl driver, and
//! the injection harness for caller-supplied scripts.

mod driver;
mod harness;
mod launch;

pub use driver::{BrowserDriver, NavigationStatus, PdfMargins, PdfOptions};
pub use harness::{ScriptOutcome, parse_outcome, validate_script, wrap_script};
pub use launch::{download_managed_browser, find_browser_executable, launch_browser};
