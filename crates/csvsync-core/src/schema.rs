//! Canonical destination schemas per dataset type
//!
//! Each dataset type owns a fixed, ordered list of `(name, kind)` columns.
//! The lists are compile-time constants; the audit columns close every list.

use crate::PipelineError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Name of the audit column holding the run timestamp at creation
pub const CREATED_AT: &str = "created_at";

/// Name of the audit column holding the run timestamp at update
pub const UPDATED_AT: &str = "updated_at";

/// How a canonical column's source text is coerced
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    /// Kept verbatim
    Text,
    /// Parsed as `i64` when possible, otherwise kept as text
    Integer,
    /// Parsed as `f64` when possible, otherwise kept as text
    Decimal,
    /// Parsed as a date/time; unparseable values become null
    Timestamp,
}

/// One canonical column
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ColumnDef {
    pub name: &'static str,
    pub kind: ColumnKind,
}

const fn text(name: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        kind: ColumnKind::Text,
    }
}

const fn integer(name: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        kind: ColumnKind::Integer,
    }
}

const fn decimal(name: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        kind: ColumnKind::Decimal,
    }
}

const fn timestamp(name: &'static str) -> ColumnDef {
    ColumnDef {
        name,
        kind: ColumnKind::Timestamp,
    }
}

const CUSTOMERS: &[ColumnDef] = &[
    text("first_name"),
    text("last_name"),
    text("company_name"),
    text("address"),
    text("city"),
    text("county"),
    text("state"),
    text("postal"),
    text("phone1"),
    text("phone2"),
    text("email"),
    text("web"),
    timestamp(CREATED_AT),
    timestamp(UPDATED_AT),
];

const TRANSACTIONS: &[ColumnDef] = &[
    integer("ordernumber"),
    integer("quantityordered"),
    integer("orderlinenumber"),
    decimal("total_amount"),
    timestamp("orderdate"),
    integer("qtr_id"),
    integer("month_id"),
    integer("year_id"),
    text("productcode"),
    text("customername"),
    text("phone"),
    text("addressline1"),
    text("addressline2"),
    text("city"),
    text("state"),
    text("postalcode"),
    text("country"),
    text("territory"),
    text("contactlastname"),
    text("contactfirstname"),
    text("dealsize"),
    timestamp(CREATED_AT),
    timestamp(UPDATED_AT),
];

// Calendar dates stay text here: the fiscal calendar is loaded as delivered.
const DE_DATES: &[ColumnDef] = &[
    text("calendar_date"),
    integer("weekday_number"),
    text("weekday_name"),
    integer("fiscal_week_of_month"),
    integer("fiscal_week_of_year"),
    integer("fiscal_month_number"),
    text("fiscal_month_name"),
    text("fiscal_first_day_of_week"),
    text("fiscal_last_day_of_week"),
    text("fiscal_first_day_of_month"),
    text("fiscal_last_day_of_month"),
    integer("fiscal_day_of_month"),
    integer("fiscal_quarter"),
    integer("fiscal_year"),
    text("fiscal_year_week"),
    text("fiscal_year_month"),
    text("fiscal_year_quarter"),
    integer("calendar_week_of_month"),
    integer("calendar_week_of_year"),
    text("calendar_first_day_of_month"),
    text("calendar_last_day_of_month"),
    text("calendar_first_day_of_year"),
    text("calendar_last_day_of_year"),
    text("weekend"),
    timestamp(CREATED_AT),
    timestamp(UPDATED_AT),
];

/// The closed set of dataset types a pipeline can run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum DatasetType {
    Customers,
    Transactions,
    /// Fiscal calendar
    DeDates,
}

impl DatasetType {
    pub const ALL: [DatasetType; 3] = [
        DatasetType::Customers,
        DatasetType::Transactions,
        DatasetType::DeDates,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetType::Customers => "customers",
            DatasetType::Transactions => "transactions",
            DatasetType::DeDates => "de_dates",
        }
    }

    /// Full canonical column list, audit columns included
    pub fn canonical_schema(&self) -> &'static [ColumnDef] {
        match self {
            DatasetType::Customers => CUSTOMERS,
            DatasetType::Transactions => TRANSACTIONS,
            DatasetType::DeDates => DE_DATES,
        }
    }

    pub fn column_names(&self) -> Vec<&'static str> {
        self.canonical_schema().iter().map(|c| c.name).collect()
    }

    /// Whether source column names are lowercased before matching
    pub fn normalizes_case(&self) -> bool {
        !matches!(self, DatasetType::Customers)
    }

    /// Default glob applied to object file names when no pattern is configured
    pub fn default_file_pattern(&self) -> String {
        format!("{}*.csv", self.as_str())
    }
}

impl fmt::Display for DatasetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DatasetType {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        DatasetType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| PipelineError::UnsupportedType(s.to_string()))
    }
}

impl TryFrom<String> for DatasetType {
    type Error = PipelineError;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<DatasetType> for String {
    fn from(t: DatasetType) -> Self {
        t.as_str().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_types() {
        for t in DatasetType::ALL {
            assert_eq!(t.as_str().parse::<DatasetType>().unwrap(), t);
        }
    }

    #[test]
    fn rejects_unknown_type() {
        let err = "widgets".parse::<DatasetType>().unwrap_err();
        assert!(matches!(err, PipelineError::UnsupportedType(ref t) if t == "widgets"));
    }

    #[test]
    fn schemas_end_with_audit_columns() {
        for t in DatasetType::ALL {
            let names = t.column_names();
            assert_eq!(&names[names.len() - 2..], &[CREATED_AT, UPDATED_AT]);
        }
    }

    #[test]
    fn schema_sizes() {
        assert_eq!(DatasetType::Customers.canonical_schema().len(), 14);
        assert_eq!(DatasetType::Transactions.canonical_schema().len(), 23);
        assert_eq!(DatasetType::DeDates.canonical_schema().len(), 26);
    }

    #[test]
    fn column_names_are_unique() {
        for t in DatasetType::ALL {
            let mut names = t.column_names();
            names.sort_unstable();
            names.dedup();
            assert_eq!(names.len(), t.canonical_schema().len());
        }
    }
}
