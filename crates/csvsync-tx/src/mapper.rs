//! Mapping of arbitrary source columns onto a canonical schema

use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime};
use csvsync_core::{
    ColumnDef, ColumnKind, Dataset, DatasetType, PipelineError, Result, Value, CREATED_AT,
    UPDATED_AT,
};
use tracing::debug;

/// Canonical customer columns resolved from several source columns,
/// first non-null value wins, left to right.
const CUSTOMER_COALESCE: &[(&str, &[&str])] = &[
    ("state", &["state", "province"]),
    ("postal", &["postal", "zip", "post"]),
];

const DATETIME_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y/%m/%d %H:%M:%S",
];

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%m/%d/%Y", "%Y/%m/%d", "%Y%m%d"];

/// Map `dataset` onto the canonical schema of `dataset_type`
///
/// The output has exactly the canonical columns, in canonical order. Columns
/// absent from the source are null, both audit columns carry `run_at`.
///
/// # Errors
/// [`PipelineError::NoMatchingColumns`] for transactions and fiscal calendar
/// sources whose columns share no (case-insensitive) name with the schema.
pub fn transform(
    mut dataset: Dataset,
    dataset_type: DatasetType,
    run_at: NaiveDateTime,
) -> Result<Dataset> {
    if dataset_type.normalizes_case() {
        dataset.rename_columns(|c| c.to_lowercase());
    }

    let schema = dataset_type.canonical_schema();
    let sources: Vec<Vec<usize>> = schema
        .iter()
        .map(|def| {
            candidates(dataset_type, def)
                .iter()
                .flat_map(|name| positions(&dataset, name))
                .collect()
        })
        .collect();

    let matched = sources.iter().filter(|s| !s.is_empty()).count();
    if matched == 0 && dataset_type.normalizes_case() {
        return Err(PipelineError::NoMatchingColumns { dataset_type });
    }
    debug!(
        "{}: {} of {} canonical columns found in source",
        dataset_type,
        matched,
        schema.len() - 2
    );

    let mut out = Dataset::new(schema.iter().map(|c| c.name.to_string()).collect());
    for row in dataset.rows() {
        let mapped = schema
            .iter()
            .zip(&sources)
            .map(|(def, indices)| match def.name {
                CREATED_AT | UPDATED_AT => Value::Timestamp(run_at),
                _ => coerce(coalesce(row, indices), def.kind),
            })
            .collect();
        out.push_row(mapped);
    }
    Ok(out)
}

/// Source column names feeding one canonical column, in priority order
fn candidates(dataset_type: DatasetType, def: &'static ColumnDef) -> &'static [&'static str] {
    if def.name == CREATED_AT || def.name == UPDATED_AT {
        return &[];
    }
    if dataset_type == DatasetType::Customers {
        if let Some((_, synonyms)) = CUSTOMER_COALESCE.iter().find(|(c, _)| *c == def.name) {
            return *synonyms;
        }
    }
    std::slice::from_ref(&def.name)
}

/// Every column named `name`, in order
///
/// Unioned files whose headers differ only in case leave several columns
/// with the same name once lowercased.
fn positions<'a>(dataset: &'a Dataset, name: &'a str) -> impl Iterator<Item = usize> + 'a {
    dataset
        .columns()
        .iter()
        .enumerate()
        .filter(move |(_, c)| c.as_str() == name)
        .map(|(i, _)| i)
}

fn coalesce(row: &[Value], indices: &[usize]) -> Value {
    indices
        .iter()
        .map(|&i| &row[i])
        .find(|v| !v.is_null())
        .cloned()
        .unwrap_or(Value::Null)
}

/// Coerce a source value to a column kind
///
/// Numbers that do not parse are kept as text. Timestamps that do not parse
/// become null, as does a NaN decimal.
pub fn coerce(value: Value, kind: ColumnKind) -> Value {
    match (kind, value) {
        (_, Value::Null) => Value::Null,
        (_, Value::Decimal(d)) if d.is_nan() => Value::Null,
        (ColumnKind::Integer, Value::Text(s)) => s
            .trim()
            .parse::<i64>()
            .map(Value::Integer)
            .unwrap_or_else(|_| Value::Text(s)),
        (ColumnKind::Decimal, Value::Text(s)) => match s.trim().parse::<f64>() {
            Ok(d) if d.is_finite() => Value::Decimal(d),
            _ => Value::Text(s),
        },
        (ColumnKind::Timestamp, Value::Text(s)) => {
            parse_timestamp(&s).map_or(Value::Null, Value::Timestamp)
        }
        (_, value) => value,
    }
}

/// Parse the date/time layouts seen in source extracts
pub fn parse_timestamp(raw: &str) -> Option<NaiveDateTime> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_local());
    }
    DATETIME_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|f| NaiveDate::parse_from_str(raw, f).ok())
                .map(|d| d.and_time(NaiveTime::MIN))
        })
}
