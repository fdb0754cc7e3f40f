//! # cw
//!
//! Typed CSV conversion and pivoting on top of [`dw`] inputs and outputs.
//!
//! Field types come from a metadata file (see [`metadata`]); cells of typed
//! fields are read into [`Value`]s and written back in their declared
//! format. [`pivot`] groups rows by key fields and evaluates a small
//! [`formula`] language once per group.
//!
//! ## Example
//!
//! ```no_run
//! use cw::{PivotOptions, pivot};
//! use dw::{InputSource, OutputTarget};
//!
//! let opts = PivotOptions {
//!     key_fields: vec!["region".to_string()],
//!     formulas: vec!["total=sum(_qty)".to_string(), "n=len(rows)".to_string()],
//!     ..PivotOptions::default()
//! };
//! let groups = pivot(&InputSource::from("sales.csv"), &OutputTarget::Stdout, &opts)?;
//! eprintln!("{groups} groups");
//! # Ok::<(), cw::CwError>(())
//! ```

pub mod convert;
pub mod dialect;
pub mod error;
pub mod formula;
pub mod metadata;
pub mod pivot;
pub mod reader;
pub mod value;
pub mod writer;

pub use convert::{to_csv, to_typed_csv};
pub use dialect::{Dialect, Quoting};
pub use error::{CwError, Result};
pub use metadata::{FieldType, FieldTypes, Metadata};
pub use pivot::{PivotOptions, pivot};
pub use reader::{Row, TypedReader};
pub use value::Value;
pub use writer::TypedWriter;
