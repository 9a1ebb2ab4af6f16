//! # csvsync Transforms
//!
//! Maps extracted datasets onto their canonical schema and, for the
//! anonymized pipeline variant, hashes the sensitive columns afterwards.
//!
//! ```rust
//! use csvsync_core::{Dataset, DatasetType, Transform, Value};
//! use csvsync_tx::{capture_run_timestamp, CanonicalTransform};
//!
//! let mut source = Dataset::new(vec!["first_name".into(), "province".into()]);
//! source.push_row(vec![Value::text("Ada"), Value::text("ON")]);
//!
//! let transform = CanonicalTransform::new(DatasetType::Customers, capture_run_timestamp())
//!     .anonymized();
//! let out = transform.apply(source).unwrap();
//!
//! assert_eq!(out.value(0, "state"), Some(&Value::text("ON")));
//! assert_ne!(out.value(0, "first_name"), Some(&Value::text("Ada")));
//! ```

use chrono::{Local, NaiveDateTime, SubsecRound};
use csvsync_core::{Dataset, DatasetType, Operator, Result, Transform};
use tracing::info;

pub mod anonymize;
pub mod mapper;

pub use anonymize::{hash_value, sensitive_columns, FieldAnonymizer};

/// Wall-clock time for the audit columns, captured once per run
pub fn capture_run_timestamp() -> NaiveDateTime {
    Local::now().naive_local().trunc_subsecs(0)
}

/// Schema mapping, optionally followed by field anonymization
pub struct CanonicalTransform {
    id: String,
    dataset_type: DatasetType,
    run_at: NaiveDateTime,
    anonymizer: Option<FieldAnonymizer>,
}

impl CanonicalTransform {
    pub fn new(dataset_type: DatasetType, run_at: NaiveDateTime) -> Self {
        Self {
            id: format!("canonical-{dataset_type}"),
            dataset_type,
            run_at,
            anonymizer: None,
        }
    }

    /// Hash the dataset type's sensitive columns after mapping
    pub fn anonymized(self) -> Self {
        let anonymizer = FieldAnonymizer::for_dataset_type(self.dataset_type);
        self.with_anonymizer(anonymizer)
    }

    pub fn with_anonymizer(mut self, anonymizer: FieldAnonymizer) -> Self {
        self.anonymizer = Some(anonymizer);
        self
    }

    pub fn run_at(&self) -> NaiveDateTime {
        self.run_at
    }
}

impl Operator for CanonicalTransform {
    fn name(&self) -> &str {
        &self.id
    }
}

impl Transform for CanonicalTransform {
    fn apply(&self, input: Dataset) -> Result<Dataset> {
        let mapped = mapper::transform(input, self.dataset_type, self.run_at)?;
        info!(
            "Mapped {} rows onto the {} schema",
            mapped.num_rows(),
            self.dataset_type
        );
        Ok(match &self.anonymizer {
            Some(anonymizer) => anonymizer.apply(mapped),
            None => mapped,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use csvsync_core::{PipelineError, Value};

    fn customers() -> Dataset {
        let mut ds = Dataset::new(vec![
            "first_name".into(),
            "email".into(),
            "province".into(),
            "zip".into(),
        ]);
        ds.push_row(vec![
            Value::text("Ada"),
            Value::text("ada@example.com"),
            Value::text("ON"),
            Value::text("K1A"),
        ]);
        ds
    }

    #[test]
    fn plain_transform_keeps_values() {
        let t = CanonicalTransform::new(DatasetType::Customers, capture_run_timestamp());
        let out = t.apply(customers()).unwrap();
        assert_eq!(out.value(0, "first_name"), Some(&Value::text("Ada")));
    }

    #[test]
    fn anonymized_transform_hashes_after_mapping() {
        let t = CanonicalTransform::new(DatasetType::Customers, capture_run_timestamp()).anonymized();
        let out = t.apply(customers()).unwrap();

        assert_eq!(out.value(0, "first_name"), Some(&hash_value(&Value::text("Ada"))));
        assert_eq!(
            out.value(0, "email"),
            Some(&hash_value(&Value::text("ada@example.com")))
        );
        // coalesced columns are never hashed
        assert_eq!(out.value(0, "state"), Some(&Value::text("ON")));
        assert_eq!(out.value(0, "postal"), Some(&Value::text("K1A")));
        // absent columns stay null rather than hashing to a digest
        assert_eq!(out.value(0, "phone1"), Some(&Value::Null));
    }

    #[test]
    fn anonymized_fiscal_calendar_is_untouched() {
        let mut ds = Dataset::new(vec!["weekday_name".into()]);
        ds.push_row(vec![Value::text("Monday")]);

        let t = CanonicalTransform::new(DatasetType::DeDates, capture_run_timestamp()).anonymized();
        let out = t.apply(ds).unwrap();
        assert_eq!(out.value(0, "weekday_name"), Some(&Value::text("Monday")));
    }

    #[test]
    fn mapping_errors_propagate() {
        let mut ds = Dataset::new(vec!["unrelated".into()]);
        ds.push_row(vec![Value::text("x")]);

        let t = CanonicalTransform::new(DatasetType::Transactions, capture_run_timestamp());
        assert!(matches!(
            t.apply(ds),
            Err(PipelineError::NoMatchingColumns { .. })
        ));
    }

    #[test]
    fn run_timestamp_has_whole_seconds() {
        use chrono::Timelike;
        assert_eq!(capture_run_timestamp().nanosecond(), 0);
    }
}
