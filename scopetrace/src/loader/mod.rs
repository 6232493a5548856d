//! # Background Profile Loading
//!
//! A [`ProfileLoader`] reads one profile stream on a dedicated worker thread
//! while the caller polls [`ProfileLoader::progress`] and
//! [`ProfileLoader::done`] without blocking.
//!
//! ```text
//! caller                         worker
//! load_file(path) ──spawn──────▶ open, decode records ──▶ progress/total atomics
//!   poll progress()/done()          │ interrupt flag checked per record
//!   interrupt() ─────────────────▶  │
//!   get() ◀──────bounded(1)──────── result, then done = true
//! ```
//!
//! Exactly one load runs at a time per loader; a second `load_*` while the
//! first is still `Loading` is rejected with [`LoadError::Busy`].
//!
//! ## Modules
//!
//! - `arena`: contiguous byte arenas and offset views
//! - `profile`: loaded records and the [`LoadedProfile`] result
//! - `decode`: stream decoding with progress and cancellation
//! - `status`: atomics shared with observers

pub mod arena;
mod decode;
pub mod profile;
mod status;

pub use arena::{ArenaSlice, SerializedData};
pub use profile::{BlockRecord, DescriptorRecord, LoadedProfile};
pub use status::LoadState;

use std::fs::File;
use std::io::{BufReader, Read};
use std::panic::{self, AssertUnwindSafe};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread::JoinHandle;

use crossbeam_channel::{bounded, Receiver};
use log::{debug, info, warn};

use crate::domain::LoadError;
use status::LoadStatus;

type LoadResult = Result<LoadedProfile, LoadError>;

/// Decode a complete stream on the calling thread
///
/// # Errors
/// The first integrity or I/O failure in the stream
pub fn load_from_reader<R: Read>(reader: R) -> Result<LoadedProfile, LoadError> {
    decode::decode_stream(reader, &LoadStatus::new())
}

/// Background loader for profile streams
///
/// Reusable: after [`get`](Self::get) collects a result the loader is `Idle`
/// and accepts a new load.
pub struct ProfileLoader {
    status: Arc<LoadStatus>,
    worker: Option<JoinHandle<()>>,
    result: Option<Receiver<LoadResult>>,
    source: Option<PathBuf>,
}

impl Default for ProfileLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ProfileLoader {
    #[must_use]
    pub fn new() -> Self {
        Self { status: Arc::new(LoadStatus::new()), worker: None, result: None, source: None }
    }

    /// Start loading the file at `path`
    ///
    /// The file is opened on the worker; an open failure surfaces from
    /// [`get`](Self::get) as [`LoadError::Open`].
    ///
    /// # Errors
    /// `Busy` if a load is in flight, `Io` if the worker cannot be spawned
    pub fn load_file(&mut self, path: impl Into<PathBuf>) -> Result<(), LoadError> {
        let path = path.into();
        let worker_path = path.clone();
        self.start(Some(path), None, move |status| {
            let file = File::open(&worker_path).map_err(|source| LoadError::Open {
                path: worker_path.display().to_string(),
                source,
            })?;
            if let Ok(meta) = file.metadata() {
                status.set_total(meta.len());
            }
            let mut profile = decode::decode_stream(BufReader::new(file), status)?;
            profile.source = Some(worker_path);
            Ok(profile)
        })
    }

    /// Start loading from an arbitrary byte source
    ///
    /// `total` is the expected stream length if known; it only drives
    /// progress reporting.
    ///
    /// # Errors
    /// `Busy` if a load is in flight, `Io` if the worker cannot be spawned
    pub fn load_reader<R>(&mut self, reader: R, total: Option<u64>) -> Result<(), LoadError>
    where
        R: Read + Send + 'static,
    {
        self.start(None, total, move |status| decode::decode_stream(reader, status))
    }

    fn start<F>(&mut self, source: Option<PathBuf>, total: Option<u64>, job: F) -> Result<(), LoadError>
    where
        F: FnOnce(&LoadStatus) -> LoadResult + Send + 'static,
    {
        if self.status.state() == LoadState::Loading {
            return Err(LoadError::Busy);
        }
        // An uncollected previous result is dropped here
        if let Some(previous) = self.worker.take() {
            let _ = previous.join();
        }

        self.status.begin(total);
        let status = Arc::clone(&self.status);
        let (tx, rx) = bounded(1);

        let spawned = std::thread::Builder::new().name("scopetrace-loader".to_string()).spawn(
            move || {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(&status)))
                    .unwrap_or(Err(LoadError::WorkerPanicked));
                let outcome = match outcome {
                    Ok(_) if status.is_interrupted() => Err(LoadError::Cancelled),
                    other => other,
                };
                let state = match &outcome {
                    Ok(_) => LoadState::Done,
                    Err(LoadError::Cancelled) => LoadState::Cancelled,
                    Err(_) => LoadState::Failed,
                };
                let _ = tx.send(outcome);
                status.finish(state);
            },
        );

        match spawned {
            Ok(handle) => {
                debug!("started profile load{}", source_suffix(source.as_deref()));
                self.worker = Some(handle);
                self.result = Some(rx);
                self.source = source;
                Ok(())
            }
            Err(e) => {
                self.status.reset();
                Err(LoadError::Io(e))
            }
        }
    }

    /// True once the worker has finished, successfully or not
    #[must_use]
    pub fn done(&self) -> bool {
        self.status.is_done()
    }

    #[must_use]
    pub fn state(&self) -> LoadState {
        self.status.state()
    }

    /// Bytes processed so far
    #[must_use]
    pub fn progress(&self) -> u64 {
        self.status.progress()
    }

    /// Expected stream length, `None` while unknown
    #[must_use]
    pub fn total(&self) -> Option<u64> {
        self.status.total()
    }

    /// Progress as a percentage of a known total
    #[must_use]
    pub fn percent(&self) -> Option<u8> {
        let total = self.total()?;
        let pct = (u128::from(self.progress()) * 100 / u128::from(total)).min(100);
        u8::try_from(pct).ok()
    }

    /// Path of the current or last file load
    #[must_use]
    pub fn source(&self) -> Option<&Path> {
        self.source.as_deref()
    }

    /// Ask the worker to stop at the next record boundary
    pub fn interrupt(&self) {
        if self.status.state() == LoadState::Loading {
            debug!("interrupting profile load");
        }
        self.status.interrupt();
    }

    /// Block until the worker finishes
    pub fn wait(&mut self) {
        if let Some(handle) = self.worker.take() {
            if handle.join().is_err() {
                warn!("profile loader worker panicked outside the decode step");
            }
        }
    }

    /// Collect the result and return the loader to `Idle`
    ///
    /// # Panics
    /// If called before [`done`](Self::done) returns true
    ///
    /// # Errors
    /// `Cancelled` after an interrupt, otherwise the load failure
    pub fn get(&mut self) -> Result<LoadedProfile, LoadError> {
        assert!(self.done(), "ProfileLoader::get called before the load finished");
        self.wait();

        let result = self
            .result
            .take()
            .and_then(|rx| rx.try_recv().ok())
            .unwrap_or(Err(LoadError::WorkerPanicked));
        self.status.reset();

        match &result {
            Ok(profile) => info!(
                "loaded profile{}: {} descriptors, {} blocks, {} threads",
                source_suffix(self.source.as_deref()),
                profile.descriptors().len(),
                profile.blocks().len(),
                profile.trees().len()
            ),
            Err(LoadError::Cancelled) => debug!("profile load cancelled"),
            Err(e) => warn!("profile load failed: {e}"),
        }
        result
    }
}

impl Drop for ProfileLoader {
    fn drop(&mut self) {
        self.status.interrupt();
        self.wait();
    }
}

fn source_suffix(source: Option<&Path>) -> String {
    source.map(|p| format!(" {}", p.display())).unwrap_or_default()
}
