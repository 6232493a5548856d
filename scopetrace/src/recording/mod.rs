//! Recording engine
//!
//! - `block`: in-flight `Block` with its finish-once invariant
//! - `clock`: monotonic timestamps and cached thread ids
//! - `config`: `RecorderConfig` and its environment overrides
//! - `recorder`: the concurrent `Recorder` and RAII `BlockGuard`
//! - `macros`: `scope_block!` / `scope_event!` for the global recorder

pub mod block;
pub mod clock;
pub mod config;
mod macros;
pub mod recorder;

pub use block::Block;
pub use config::RecorderConfig;
pub use recorder::{BlockGuard, Recorder, RecorderStats};
