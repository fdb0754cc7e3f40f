//! # dw
//!
//! Lazy line pipelines with Unix-like stages.
//!
//! A [`Pipeline`] wraps a lazy sequence of items. Stages are chained with
//! [`Pipeline::bind`] or the `|` operator and the result is drained by a
//! [`Sink`]. Each stage is either a source, which reads its own inputs and
//! replaces whatever came before it, or a transform, which consumes its
//! upstream lazily.
//!
//! Inputs are opened one at a time and each is closed as soon as it is
//! exhausted, or when the pipeline is dropped early (see [`AutoClose`]).
//!
//! ## Example
//!
//! ```no_run
//! use dw::{Pipeline, bytes, text, head, uniq};
//!
//! let written = (Pipeline::source(bytes::cat(["a.txt", "b.txt"])?)?
//!     | text::decode(text::TextErrors::Replace)
//!     | uniq()
//!     | head(10)
//!     | text::encode())
//!     .run(bytes::to_stdout())?;
//! eprintln!("{written} lines");
//! # Ok::<(), dw::PipelineError>(())
//! ```

pub mod auto_close;
pub mod bytes;
pub mod error;
pub mod input;
pub mod logging;
pub mod output;
pub mod pipeline;
pub mod sink;
pub mod stage;
pub mod text;
pub mod transform;

pub use auto_close::{AutoClose, Closeable, close_with};
pub use error::{PipelineError, Result};
pub use input::{InputSource, validate_inputs};
pub use output::OutputTarget;
pub use pipeline::{Lazy, Pipeline};
pub use stage::{Sink, Stage, StageKind, ToList, to_list};
pub use transform::{filter, head, inspect, map, reversed, sorted, tail, uniq, uniq_all};
