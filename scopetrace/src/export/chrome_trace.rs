use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::collections::HashMap;
use std::io::Write;

use crate::domain::{BlockType, Timestamp};
use crate::loader::{BlockRecord, LoadedProfile};

/// Process id written into every event; a loaded profile has no live process
const TRACE_PID: u32 = 1;

/// Chrome Trace Event format
/// Spec: https://docs.google.com/document/d/1CvAClvFfyA5R-PhYUmn5OOQtYMH4h6I0nSsKchNAySU/preview
#[derive(Debug, Clone, Serialize, Deserialize)]
struct ChromeTraceEvent {
    /// Event name (block name)
    name: String,
    /// Category for filtering/coloring
    cat: String,
    /// Phase: "X" = complete, "i" = instant, "M" = metadata
    ph: String,
    /// Timestamp in microseconds
    ts: f64,
    /// Duration in microseconds, complete events only
    #[serde(skip_serializing_if = "Option::is_none")]
    dur: Option<f64>,
    /// Process ID
    pid: u32,
    /// Thread ID
    tid: u32,
    /// Instant event scope ("t" = thread)
    #[serde(skip_serializing_if = "Option::is_none")]
    s: Option<String>,
    /// Optional arguments (metadata)
    #[serde(skip_serializing_if = "Option::is_none")]
    args: Option<HashMap<String, JsonValue>>,
}

/// Chrome Trace Format container
#[derive(Debug, Serialize)]
struct ChromeTrace {
    #[serde(rename = "traceEvents")]
    trace_events: Vec<ChromeTraceEvent>,
    #[serde(rename = "displayTimeUnit")]
    display_time_unit: String,
}

/// Chrome trace exporter for timeline visualization
pub struct ChromeTraceExporter {
    /// Collected trace events
    events: Vec<ChromeTraceEvent>,
    /// Threads seen, for thread-name metadata
    threads: Vec<u32>,
    /// Start timestamp for relative timing
    start: Timestamp,
}

impl ChromeTraceExporter {
    /// Empty exporter with timestamps measured from `start`
    #[must_use]
    pub fn new(start: Timestamp) -> Self {
        Self { events: Vec::new(), threads: Vec::new(), start }
    }

    /// Collect every block of a loaded profile
    ///
    /// Timestamps are relative to the earliest block in the profile.
    #[must_use]
    pub fn from_profile(profile: &LoadedProfile) -> Self {
        let start = profile.time_range().map_or(Timestamp(0), |(begin, _)| begin);
        let mut exporter = Self::new(start);
        for block in profile.blocks() {
            exporter.add_block(profile, block);
        }
        exporter
    }

    fn micros_since_start(&self, ts: Timestamp) -> f64 {
        // Sub-microsecond precision is kept as the fractional part
        #[allow(clippy::cast_precision_loss)]
        let ns = ts.since(self.start).0 as f64;
        ns / 1000.0
    }

    /// Add one block from `profile` to the trace
    pub fn add_block(&mut self, profile: &LoadedProfile, block: &BlockRecord) {
        let mut args = HashMap::new();
        args.insert("descriptor_id".to_string(), serde_json::json!(block.descriptor_id.0));
        let mut category = String::from("block");
        if let Some(descriptor) = profile.descriptor(block.descriptor_id) {
            args.insert("file".to_string(), serde_json::json!(profile.descriptor_file(descriptor)));
            args.insert("line".to_string(), serde_json::json!(descriptor.line));
            args.insert("color".to_string(), serde_json::json!(format!("#{:08X}", descriptor.color)));
            if descriptor.category_id != 0 {
                category = format!("category_{}", descriptor.category_id);
            }
        }

        let ts = self.micros_since_start(block.begin);
        let (ph, dur, scope) = match block.block_type {
            BlockType::Block => ("X", Some(self.micros_since_start(block.end) - ts), None),
            BlockType::Event => ("i", None, Some("t".to_string())),
        };

        self.events.push(ChromeTraceEvent {
            name: profile.block_name(block).to_string(),
            cat: category,
            ph: ph.to_string(),
            ts,
            dur,
            pid: TRACE_PID,
            tid: block.thread_id.0,
            s: scope,
            args: Some(args),
        });
        if !self.threads.contains(&block.thread_id.0) {
            self.threads.push(block.thread_id.0);
        }
    }

    /// Export the trace to any writer (file, stdout, buffer, etc.)
    ///
    /// # Example
    /// ```
    /// use scopetrace::export::ChromeTraceExporter;
    /// use scopetrace::domain::Timestamp;
    ///
    /// # fn example() -> anyhow::Result<()> {
    /// let exporter = ChromeTraceExporter::new(Timestamp(0));
    ///
    /// // Write to buffer for testing, or a BufWriter<File>, or stdout
    /// let mut buffer = Vec::new();
    /// exporter.export(&mut buffer)?;
    /// # Ok(())
    /// # }
    /// ```
    ///
    /// # Errors
    /// Returns an error if serialization or the write fails
    pub fn export<W: Write>(&self, writer: W) -> Result<()> {
        let mut all_events = self.events.clone();

        // Generate thread name metadata events
        for &tid in &self.threads {
            let mut args = HashMap::new();
            args.insert("name".to_string(), serde_json::json!(format!("Thread {tid}")));

            all_events.push(ChromeTraceEvent {
                name: "thread_name".to_string(),
                cat: String::new(),
                ph: "M".to_string(),
                ts: 0.0,
                dur: None,
                pid: TRACE_PID,
                tid,
                s: None,
                args: Some(args),
            });
        }

        let trace = ChromeTrace { trace_events: all_events, display_time_unit: "ms".to_string() };

        serde_json::to_writer_pretty(writer, &trace).context("Failed to write trace JSON")?;

        Ok(())
    }

    /// Get the number of events collected
    #[must_use]
    pub fn event_count(&self) -> usize {
        self.events.len()
    }
}
