//! Sequential extract → transform → load runner for one dataset type

use crate::{Result, Sink, Source, Transform};
use std::time::Instant;
use tracing::info;

/// Row counts reported by a finished run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunSummary {
    pub extracted: usize,
    pub transformed: usize,
    pub loaded: u64,
}

/// One dataset-type run
///
/// The stages run strictly one after another. A failing stage aborts the run
/// and its error is returned unchanged; later stages never start.
pub struct Pipeline {
    source: Box<dyn Source>,
    transform: Box<dyn Transform>,
    sink: Box<dyn Sink>,
}

impl Pipeline {
    pub fn new(
        source: Box<dyn Source>,
        transform: Box<dyn Transform>,
        sink: Box<dyn Sink>,
    ) -> Self {
        Self {
            source,
            transform,
            sink,
        }
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let started = Instant::now();

        info!(source = self.source.name(), "Extracting");
        let dataset = self.source.extract().await?;
        let extracted = dataset.num_rows();
        info!("Extracted {} rows across {} columns", extracted, dataset.num_columns());

        info!(transform = self.transform.name(), "Transforming");
        let dataset = self.transform.apply(dataset)?;
        let transformed = dataset.num_rows();

        info!(sink = self.sink.name(), "Loading {} rows", transformed);
        let loaded = self.sink.load(&dataset).await?;

        info!(
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Run finished: {} rows loaded", loaded
        );
        Ok(RunSummary {
            extracted,
            transformed,
            loaded,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Dataset, Operator, PipelineError, Value};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    struct FixedSource(Option<Dataset>);

    impl Operator for FixedSource {
        fn name(&self) -> &str {
            "fixed"
        }
    }

    #[async_trait]
    impl Source for FixedSource {
        async fn extract(&self) -> Result<Dataset> {
            self.0.clone().ok_or_else(|| PipelineError::EmptySource {
                prefix: "in/".into(),
            })
        }
    }

    struct Upper;

    impl Operator for Upper {
        fn name(&self) -> &str {
            "upper"
        }
    }

    impl Transform for Upper {
        fn apply(&self, input: Dataset) -> Result<Dataset> {
            let mut out = Dataset::new(input.columns().to_vec());
            for row in input.into_rows() {
                out.push_row(
                    row.into_iter()
                        .map(|v| match v {
                            Value::Text(s) => Value::Text(s.to_uppercase()),
                            other => other,
                        })
                        .collect(),
                );
            }
            Ok(out)
        }
    }

    #[derive(Default)]
    struct RecordingSink(Arc<Mutex<Vec<Dataset>>>);

    impl Operator for RecordingSink {
        fn name(&self) -> &str {
            "recording"
        }
    }

    #[async_trait]
    impl Sink for RecordingSink {
        async fn load(&self, dataset: &Dataset) -> Result<u64> {
            self.0.lock().unwrap().push(dataset.clone());
            Ok(dataset.num_rows() as u64)
        }
    }

    #[tokio::test]
    async fn runs_stages_in_order() {
        let mut ds = Dataset::new(vec!["name".into()]);
        ds.push_row(vec![Value::text("ada")]);
        ds.push_row(vec![Value::text("grace")]);

        let loaded = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(
            Box::new(FixedSource(Some(ds))),
            Box::new(Upper),
            Box::new(RecordingSink(loaded.clone())),
        );

        let summary = pipeline.run().await.unwrap();
        assert_eq!(summary.extracted, 2);
        assert_eq!(summary.loaded, 2);

        let loaded = loaded.lock().unwrap();
        assert_eq!(loaded[0].value(1, "name"), Some(&Value::text("GRACE")));
    }

    #[tokio::test]
    async fn empty_source_never_reaches_the_sink() {
        let loaded = Arc::new(Mutex::new(Vec::new()));
        let pipeline = Pipeline::new(
            Box::new(FixedSource(None)),
            Box::new(Upper),
            Box::new(RecordingSink(loaded.clone())),
        );

        let err = pipeline.run().await.unwrap_err();
        assert!(matches!(err, PipelineError::EmptySource { .. }));
        assert!(loaded.lock().unwrap().is_empty());
    }
}
