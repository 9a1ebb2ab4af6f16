//! # csvsync I/O - Object Storage Sources and SQL Sinks
//!
//! Concrete extraction and loading stages for csvsync pipelines.
//!
//! ### Extraction
//! - **[`SourceCatalog`]**: lists every object under a prefix
//! - **[`RecordReader`]**: decodes CSV objects and concatenates them with
//!   column-union semantics
//! - **[`CsvObjectSource`]**: both of the above behind the [`Source`] trait
//!
//! ### Loading
//! - **[`SqlTableSink`]**: replaces a MySQL or SQLite table's contents
//!
//! ## Example Usage
//!
//! ```no_run
//! use csvsync_core::{DatasetSpec, DatasetType, StorageSpec, LocalStorageSpec};
//! use csvsync_io::{build_object_store, CsvObjectSource, FileSelector};
//!
//! # fn example() -> csvsync_core::Result<()> {
//! let storage = StorageSpec::Local(LocalStorageSpec {
//!     root: "/data/landing".into(),
//!     prefix: "psychobunny/".into(),
//! });
//! let store = build_object_store(&storage)?;
//! let selector = FileSelector::for_dataset(&DatasetSpec::new(DatasetType::Customers))?;
//! let source = CsvObjectSource::new(store, storage.prefix(), selector);
//! # Ok(())
//! # }
//! ```
//!
//! [`Source`]: csvsync_core::Source

/// Object storage listing
pub mod catalog;

/// SQL table replace-load sink
pub mod sink_sql;

/// CSV object source
pub mod source_csv;

/// Object store construction from the pipeline spec
pub mod store;

pub use catalog::SourceCatalog;
pub use sink_sql::{Backend, SqlTableSink};
pub use source_csv::{CsvObjectSource, FileSelector, RecordReader, SourceObject};
pub use store::build_object_store;
