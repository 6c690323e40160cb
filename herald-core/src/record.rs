//! Types and traits for recording values produced while running agents.
//!
//! Rollout loops report per-episode values such as the return or the version
//! of the parameters in use. Those values are packed in a [`Record`] and handed
//! to a [`Recorder`], which decides what to do with them.
//!
//! ```rust
//! use herald_core::record::{Record, RecordValue};
//!
//! let mut record = Record::empty();
//! record.insert("episode_return", RecordValue::Scalar(-3.5));
//! record.insert("param_message", RecordValue::String("opt_steps=100".to_string()));
//! assert_eq!(record.get_scalar("episode_return").unwrap(), -3.5);
//! ```
mod base;
mod buffered_recorder;
mod null_recorder;
mod recorder;

pub use base::{Record, RecordValue};
pub use buffered_recorder::BufferedRecorder;
pub use null_recorder::NullRecorder;
pub use recorder::Recorder;
