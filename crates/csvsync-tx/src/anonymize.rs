//! One-way hashing of sensitive canonical columns

use csvsync_core::{Dataset, DatasetType, Value};
use sha2::{Digest, Sha256};
use tracing::debug;

const CUSTOMER_COLUMNS: &[&str] = &[
    "first_name",
    "last_name",
    "company_name",
    "email",
    "web",
    "phone1",
    "phone2",
    "address",
];

const TRANSACTION_COLUMNS: &[&str] = &[
    "customername",
    "phone",
    "addressline1",
    "addressline2",
    "contactlastname",
    "contactfirstname",
];

/// Columns hashed for a dataset type. The fiscal calendar carries no
/// personal data and is never hashed.
pub fn sensitive_columns(dataset_type: DatasetType) -> &'static [&'static str] {
    match dataset_type {
        DatasetType::Customers => CUSTOMER_COLUMNS,
        DatasetType::Transactions => TRANSACTION_COLUMNS,
        DatasetType::DeDates => &[],
    }
}

/// SHA-256 of the value's display form as 64 lowercase hex characters.
/// Null stays null.
pub fn hash_value(value: &Value) -> Value {
    if value.is_null() {
        return Value::Null;
    }
    let digest = Sha256::digest(value.to_string().as_bytes());
    Value::Text(hex::encode(digest))
}

/// Hashes a fixed set of columns in every row
#[derive(Debug, Clone)]
pub struct FieldAnonymizer {
    columns: Vec<String>,
}

impl FieldAnonymizer {
    pub fn new<I, S>(columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }

    pub fn for_dataset_type(dataset_type: DatasetType) -> Self {
        Self::new(sensitive_columns(dataset_type).iter().copied())
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Hash the configured cells of one row in place
    ///
    /// `header` names the cells of `row`. Configured columns missing from the
    /// header are skipped.
    pub fn hash_row(&self, header: &[String], row: &mut [Value]) {
        for (name, value) in header.iter().zip(row.iter_mut()) {
            if self.columns.contains(name) {
                *value = hash_value(value);
            }
        }
    }

    pub fn apply(&self, mut dataset: Dataset) -> Dataset {
        if self.columns.is_empty() {
            return dataset;
        }
        let header = dataset.columns().to_vec();
        for row in dataset.rows_mut() {
            self.hash_row(&header, row);
        }
        debug!("Hashed {} columns over {} rows", self.columns.len(), dataset.num_rows());
        dataset
    }
}
