//! Trace export functionality
//!
//! Converts loaded profiles to other formats. Currently supports the Chrome
//! Trace Event Format for visualization in Perfetto or chrome://tracing.

pub mod chrome_trace;

pub use chrome_trace::ChromeTraceExporter;
