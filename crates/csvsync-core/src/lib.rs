//! # csvsync Core
//!
//! Foundational types and abstractions shared by every csvsync crate: the
//! tagged cell [`Value`], the row-oriented [`Dataset`], the compile-time
//! canonical schemas per [`DatasetType`], the error type, and the three
//! operator traits a pipeline is assembled from.
//!
//! ## Key Components
//!
//! - **Data model**: [`Value`] and [`Dataset`] with column-union concatenation
//! - **Canonical schemas**: fixed `(name, kind)` column lists per dataset type
//! - **Operator traits**: [`Source`], [`Transform`] and [`Sink`]
//! - **Configuration**: YAML-based [`PipelineSpec`]
//! - **Runner**: [`Pipeline`] sequencing extract, transform and load
//!
//! ## Example Usage
//!
//! ```rust
//! use csvsync_core::{Dataset, DatasetType, Value};
//!
//! let mut dataset = Dataset::new(vec!["first_name".into()]);
//! dataset.push_row(vec![Value::text("Ada")]);
//!
//! let dataset_type: DatasetType = "customers".parse().unwrap();
//! assert_eq!(dataset_type.column_names()[0], "first_name");
//! assert_eq!(dataset.num_rows(), 1);
//! ```

use async_trait::async_trait;

pub mod pipeline;
pub mod schema;
pub mod spec;
pub mod value;

pub use pipeline::{Pipeline, RunSummary};
pub use schema::{ColumnDef, ColumnKind, DatasetType, CREATED_AT, UPDATED_AT};
pub use spec::{
    validate_identifier, DatabaseSpec, DatasetSpec, LocalStorageSpec, PipelineSpec, ReplaceMode,
    S3StorageSpec, StorageSpec,
};
pub use value::{Dataset, Value, TIMESTAMP_FORMAT};

/// Boxed error used to carry causes from the storage, CSV and SQL layers
/// without making this crate depend on them.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Result alias used across the csvsync crates
pub type Result<T, E = PipelineError> = std::result::Result<T, E>;

/// Errors raised by a csvsync run
///
/// Every variant is fatal for the dataset-type run that raised it. Per-row
/// coercion problems never surface here; they become [`Value::Null`].
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Nothing listed under the prefix, or nothing matched the dataset type.
    ///
    /// Raised before the destination table is touched.
    #[error("no source objects found under prefix '{prefix}'")]
    EmptySource { prefix: String },

    /// A dataset type outside `customers`, `transactions`, `de_dates`
    #[error("unsupported dataset type: {0}")]
    UnsupportedType(String),

    /// The source columns share no name with the canonical schema
    #[error("no matching columns found for dataset type {dataset_type}")]
    NoMatchingColumns { dataset_type: DatasetType },

    /// Truncate, insert, commit or connect failed for the destination table
    #[error("failed to load data into table {table}: {source}")]
    Load {
        table: String,
        #[source]
        source: BoxError,
    },

    /// Listing or fetching from object storage failed
    #[error("object storage request failed: {0}")]
    Storage(#[source] BoxError),

    /// An object's bytes are not valid UTF-8
    #[error("object {key} is not valid UTF-8")]
    Decode {
        key: String,
        #[source]
        source: std::string::FromUtf8Error,
    },

    /// An object could not be parsed as CSV
    #[error("failed to parse CSV object {key}: {source}")]
    Csv {
        key: String,
        #[source]
        source: BoxError,
    },

    /// A database or table name that is not a plain SQL identifier
    #[error("invalid SQL identifier: '{0}'")]
    InvalidIdentifier(String),

    /// Invalid pipeline configuration
    #[error("invalid pipeline configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Base trait for all pipeline operators
pub trait Operator: Send + Sync {
    /// Returns the name of this operator, used in logs
    fn name(&self) -> &str;
}

/// Trait for data source operators
///
/// A source produces the complete, concatenated dataset of one run.
#[async_trait]
pub trait Source: Operator {
    /// Extract every matching source record into one dataset
    ///
    /// # Errors
    /// [`PipelineError::EmptySource`] when nothing is there to read, or a
    /// storage/decoding error.
    async fn extract(&self) -> Result<Dataset>;
}

/// Trait for data transformation operators
///
/// Transforms are pure: given the same dataset they produce the same output.
/// Anything time dependent, such as audit timestamps, is fixed when the
/// transform is constructed.
pub trait Transform: Operator {
    fn apply(&self, input: Dataset) -> Result<Dataset>;
}

/// Trait for data sink operators
#[async_trait]
pub trait Sink: Operator {
    /// Write the dataset to the destination, returning the number of rows written
    async fn load(&self, dataset: &Dataset) -> Result<u64>;
}
