use crate::catalog::SourceCatalog;
use arrow_array::{Array, StringArray};
use arrow_csv::reader::{Format, ReaderBuilder};
use arrow_schema::{ArrowError, DataType, Field, Schema};
use async_trait::async_trait;
use csvsync_core::{
    Dataset, DatasetSpec, DatasetType, Operator, PipelineError, Result, Source, Value,
};
use glob::{MatchOptions, Pattern};
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use regex::Regex;
use std::io::Cursor;
use std::sync::Arc;
use tracing::{info, warn};

const BATCH_ROWS: usize = 8192;

/// Cell contents read as null, in addition to the empty cell
const NULL_MARKERS: &str = r"^(?:|#N/A|#N/A N/A|#NA|-1\.#IND|-1\.#QNAN|-NaN|-nan|1\.#IND|1\.#QNAN|<NA>|N/A|NA|NULL|NaN|None|n/a|nan|null)$";

/// A storage object selected for one dataset type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceObject {
    pub key: String,
    pub file_name: String,
    pub extension: Option<String>,
    pub dataset_type: DatasetType,
}

impl SourceObject {
    fn new(key: &str, dataset_type: DatasetType) -> Self {
        let file_name = key.rsplit('/').next().unwrap_or(key).to_string();
        let extension = file_name
            .rsplit_once('.')
            .map(|(_, ext)| format!(".{ext}"));
        Self {
            key: key.to_string(),
            file_name,
            extension,
            dataset_type,
        }
    }
}

/// Decides which object keys belong to a dataset type
///
/// The glob is matched against the trailing path segments of each key, so
/// `customers*.csv` matches on the file name and `customers/*.csv` matches
/// files inside a `customers` directory. `*` never crosses a `/`, and the
/// `.csv` extension is always required.
#[derive(Debug, Clone)]
pub struct FileSelector {
    dataset_type: DatasetType,
    pattern: Pattern,
}

impl FileSelector {
    pub fn new(dataset_type: DatasetType, pattern: &str) -> Result<Self> {
        let pattern = Pattern::new(pattern)
            .map_err(|e| PipelineError::Config(format!("file pattern '{pattern}': {e}")))?;
        Ok(Self {
            dataset_type,
            pattern,
        })
    }

    pub fn for_dataset(spec: &DatasetSpec) -> Result<Self> {
        Self::new(spec.dataset_type, &spec.pattern())
    }

    pub fn dataset_type(&self) -> DatasetType {
        self.dataset_type
    }

    pub fn select(&self, keys: &[String]) -> Vec<SourceObject> {
        keys.iter()
            .map(|key| SourceObject::new(key, self.dataset_type))
            .filter(|obj| {
                obj.extension.as_deref() == Some(".csv") && self.matches_key(&obj.key)
            })
            .collect()
    }

    fn matches_key(&self, key: &str) -> bool {
        let options = MatchOptions {
            require_literal_separator: true,
            ..MatchOptions::new()
        };
        std::iter::once(key)
            .chain(key.match_indices('/').map(|(i, _)| &key[i + 1..]))
            .any(|tail| self.pattern.matches_with(tail, options))
    }
}

/// Reads CSV objects into datasets
pub struct RecordReader {
    store: Arc<dyn ObjectStore>,
    null_markers: Regex,
}

impl RecordReader {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            store,
            null_markers: Regex::new(NULL_MARKERS).expect("null marker regex"),
        }
    }

    /// Read the objects of `keys` that the selector accepts into one dataset
    pub async fn read_dataset(&self, keys: &[String], selector: &FileSelector) -> Result<Dataset> {
        self.read_objects(&selector.select(keys)).await
    }

    /// Concatenate the given objects in order, with column-union semantics
    pub async fn read_objects(&self, objects: &[SourceObject]) -> Result<Dataset> {
        let mut dataset = Dataset::default();
        for object in objects {
            let part = self.read_object(&object.key).await?;
            if part.num_columns() == 0 {
                warn!("Skipping {}: no header row", object.key);
                continue;
            }
            info!("Read {} rows from {}", part.num_rows(), object.key);
            dataset.append(part);
        }
        Ok(dataset)
    }

    pub async fn read_object(&self, key: &str) -> Result<Dataset> {
        let bytes = self
            .store
            .get(&ObjectPath::from(key))
            .await
            .map_err(|e| PipelineError::Storage(Box::new(e)))?
            .bytes()
            .await
            .map_err(|e| PipelineError::Storage(Box::new(e)))?;

        let text = String::from_utf8(bytes.to_vec()).map_err(|source| PipelineError::Decode {
            key: key.to_string(),
            source,
        })?;
        self.parse(key, &text)
    }

    /// Parse comma-delimited text with a header row
    ///
    /// Every cell is read as text; empty cells and null markers become null
    /// and short rows are padded with nulls.
    pub fn parse(&self, key: &str, text: &str) -> Result<Dataset> {
        let csv_err = |e: ArrowError| PipelineError::Csv {
            key: key.to_string(),
            source: Box::new(e),
        };

        let text = text.strip_prefix('\u{feff}').unwrap_or(text);
        if text.trim().is_empty() {
            return Ok(Dataset::default());
        }

        // Header only; the inferred types are discarded.
        let (header, _) = Format::default()
            .with_header(true)
            .infer_schema(Cursor::new(text.as_bytes()), Some(0))
            .map_err(csv_err)?;
        let columns: Vec<String> = header.fields().iter().map(|f| f.name().clone()).collect();
        let schema = Arc::new(Schema::new(
            columns
                .iter()
                .map(|c| Field::new(c, DataType::Utf8, true))
                .collect::<Vec<_>>(),
        ));

        let reader = ReaderBuilder::new(schema)
            .with_header(true)
            .with_batch_size(BATCH_ROWS)
            .with_truncated_rows(true)
            .with_null_regex(self.null_markers.clone())
            .build(Cursor::new(text.as_bytes()))
            .map_err(csv_err)?;

        let mut dataset = Dataset::new(columns);
        for batch in reader {
            let batch = batch.map_err(csv_err)?;
            let arrays = batch
                .columns()
                .iter()
                .map(|c| {
                    c.as_any().downcast_ref::<StringArray>().ok_or_else(|| {
                        csv_err(ArrowError::CastError("expected a string column".into()))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            for row in 0..batch.num_rows() {
                dataset.push_row(
                    arrays
                        .iter()
                        .map(|a| {
                            if a.is_null(row) {
                                Value::Null
                            } else {
                                Value::text(a.value(row))
                            }
                        })
                        .collect(),
                );
            }
        }
        Ok(dataset)
    }
}

/// Extraction stage: list under a prefix, select one dataset type's files,
/// read and concatenate them
pub struct CsvObjectSource {
    id: String,
    prefix: String,
    catalog: SourceCatalog,
    reader: RecordReader,
    selector: FileSelector,
}

impl CsvObjectSource {
    pub fn new(store: Arc<dyn ObjectStore>, prefix: impl Into<String>, selector: FileSelector) -> Self {
        Self {
            id: format!("csv-{}", selector.dataset_type()),
            prefix: prefix.into(),
            catalog: SourceCatalog::new(store.clone()),
            reader: RecordReader::new(store),
            selector,
        }
    }
}

impl Operator for CsvObjectSource {
    fn name(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl Source for CsvObjectSource {
    async fn extract(&self) -> Result<Dataset> {
        let keys = self.catalog.list_objects(&self.prefix).await?;
        let objects = self.selector.select(&keys);
        if objects.is_empty() {
            warn!(
                "None of the {} objects under '{}' are {} files",
                keys.len(),
                self.prefix,
                self.selector.dataset_type()
            );
            return Err(PipelineError::EmptySource {
                prefix: self.prefix.clone(),
            });
        }
        info!("Reading {} {} files", objects.len(), self.selector.dataset_type());
        self.reader.read_objects(&objects).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use object_store::memory::InMemory;

    fn reader() -> RecordReader {
        RecordReader::new(Arc::new(InMemory::new()))
    }

    fn keys(keys: &[&str]) -> Vec<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn selects_by_file_name_pattern_and_extension() {
        let selector = FileSelector::new(DatasetType::Customers, "customers*.csv").unwrap();
        let selected = selector.select(&keys(&[
            "in/customers_1.csv",
            "in/customers_2.CSV",
            "in/customers.json",
            "in/vip_customers.csv",
            "in/transactions.csv",
        ]));

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].key, "in/customers_1.csv");
        assert_eq!(selected[0].file_name, "customers_1.csv");
        assert_eq!(selected[0].extension.as_deref(), Some(".csv"));
        assert_eq!(selected[0].dataset_type, DatasetType::Customers);
    }

    #[test]
    fn type_name_inside_another_name_does_not_match() {
        let selector = FileSelector::new(DatasetType::DeDates, "dates*.csv").unwrap();
        assert!(selector.select(&keys(&["in/de_dates_2024.csv"])).is_empty());

        let selector =
            FileSelector::for_dataset(&DatasetSpec::new(DatasetType::DeDates)).unwrap();
        assert_eq!(selector.select(&keys(&["in/de_dates_2024.csv"])).len(), 1);
    }

    #[test]
    fn directory_patterns_match_trailing_segments() {
        let selector = FileSelector::new(DatasetType::Customers, "customers/*.csv").unwrap();
        let selected = selector.select(&keys(&[
            "landing/customers/part-1.csv",
            "landing/customers/2024/part-2.csv",
            "landing/customers.csv",
            "landing/vip_customers/part-3.csv",
        ]));

        assert_eq!(selected.len(), 1);
        assert_eq!(selected[0].key, "landing/customers/part-1.csv");
        assert_eq!(selected[0].file_name, "part-1.csv");
    }

    #[test]
    fn file_name_patterns_do_not_cross_directories() {
        let selector = FileSelector::new(DatasetType::Customers, "customers*.csv").unwrap();
        assert!(selector
            .select(&keys(&["landing/customers/part-1.csv"]))
            .is_empty());
    }

    #[test]
    fn invalid_pattern_is_a_config_error() {
        assert!(matches!(
            FileSelector::new(DatasetType::Customers, "[customers"),
            Err(PipelineError::Config(_))
        ));
    }

    #[test]
    fn parses_header_and_rows_as_text() {
        let ds = reader()
            .parse("k", "first_name,postal\nAda,02134\n\"Smith, J\",\n")
            .unwrap();

        assert_eq!(ds.columns(), &["first_name", "postal"]);
        assert_eq!(ds.value(0, "postal"), Some(&Value::text("02134")));
        assert_eq!(ds.value(1, "first_name"), Some(&Value::text("Smith, J")));
        assert_eq!(ds.value(1, "postal"), Some(&Value::Null));
    }

    #[test]
    fn null_markers_become_null() {
        let ds = reader().parse("k", "a,b,c\nNA,NULL,n/a\n").unwrap();
        assert!(ds.rows()[0].iter().all(Value::is_null));
    }

    #[test]
    fn short_rows_are_padded() {
        let ds = reader().parse("k", "a,b,c\n1,2\n").unwrap();
        assert_eq!(ds.rows()[0], vec![Value::text("1"), Value::text("2"), Value::Null]);
    }

    #[test]
    fn byte_order_mark_is_stripped() {
        let ds = reader().parse("k", "\u{feff}email\nx@y.z\n").unwrap();
        assert_eq!(ds.columns(), &["email"]);
    }

    #[test]
    fn empty_object_has_no_columns() {
        let ds = reader().parse("k", "").unwrap();
        assert_eq!(ds.num_columns(), 0);
    }

    #[tokio::test]
    async fn invalid_utf8_is_a_decode_error() {
        let store = Arc::new(InMemory::new());
        store
            .put(&ObjectPath::from("in/customers.csv"), vec![0x61, 0x0a, 0xff, 0xfe].into())
            .await
            .unwrap();

        let err = RecordReader::new(store)
            .read_object("in/customers.csv")
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::Decode { ref key, .. } if key == "in/customers.csv"));
    }

    #[tokio::test]
    async fn listed_objects_without_a_match_are_an_empty_source() {
        let store = Arc::new(InMemory::new());
        store
            .put(&ObjectPath::from("in/transactions.csv"), b"ordernumber\n1\n".to_vec().into())
            .await
            .unwrap();

        let selector = FileSelector::new(DatasetType::Customers, "customers*.csv").unwrap();
        let source = CsvObjectSource::new(store, "in/", selector);
        assert!(matches!(
            source.extract().await,
            Err(PipelineError::EmptySource { .. })
        ));
    }
}
