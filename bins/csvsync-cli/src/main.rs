use anyhow::{Context, Result};
use clap::Parser;
use csvsync_core::{DatasetSpec, DatasetType, Pipeline, PipelineSpec, RunSummary};
use csvsync_io::{build_object_store, CsvObjectSource, FileSelector, SqlTableSink};
use csvsync_tx::{capture_run_timestamp, CanonicalTransform};
use std::path::PathBuf;
use tracing::{error, info, info_span, Instrument};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Replace-load CSV datasets from object storage into relational tables
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Pipeline YAML
    #[arg(short, long)]
    pipeline: PathBuf,

    /// Only run these dataset types (repeatable). Defaults to every dataset in the spec.
    #[arg(short, long = "dataset")]
    datasets: Vec<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::from_default_env())
        .with(tracing_subscriber::fmt::layer())
        .init();
    let args = Args::parse();

    let spec = {
        let y = std::fs::read_to_string(&args.pipeline)
            .with_context(|| format!("read {}", args.pipeline.display()))?;
        PipelineSpec::from_yaml(&y)?
    };

    let runs = select_datasets(&spec, &args.datasets)?;
    info!("Pipeline {}: {} dataset runs", spec.name, runs.len());

    // Runs are independent: one failure does not stop the others.
    let mut failed = Vec::new();
    for dataset in runs {
        let span = info_span!("run", dataset = %dataset.dataset_type, table = dataset.table());
        match run_dataset(&spec, dataset).instrument(span).await {
            Ok(summary) => info!(
                "{}: {} rows extracted, {} rows loaded into {}",
                dataset.dataset_type,
                summary.extracted,
                summary.loaded,
                dataset.table()
            ),
            Err(e) => {
                error!(dataset = %dataset.dataset_type, error = %e, "Run failed");
                failed.push(dataset.dataset_type.as_str());
            }
        }
    }

    if !failed.is_empty() {
        anyhow::bail!("dataset runs failed: {}", failed.join(", "));
    }
    Ok(())
}

fn select_datasets<'a>(spec: &'a PipelineSpec, requested: &[String]) -> Result<Vec<&'a DatasetSpec>> {
    if requested.is_empty() {
        return Ok(spec.datasets.iter().collect());
    }
    requested
        .iter()
        .map(|name| {
            let dataset_type: DatasetType = name.parse()?;
            spec.dataset(dataset_type)
                .with_context(|| format!("dataset {dataset_type} is not configured in {}", spec.name))
        })
        .collect()
}

async fn run_dataset(spec: &PipelineSpec, dataset: &DatasetSpec) -> csvsync_core::Result<RunSummary> {
    let run_at = capture_run_timestamp();

    let store = build_object_store(&spec.storage)?;
    let selector = FileSelector::for_dataset(dataset)?;
    let source = CsvObjectSource::new(store, spec.storage.prefix(), selector);

    let mut transform = CanonicalTransform::new(dataset.dataset_type, run_at);
    if spec.anonymize {
        transform = transform.anonymized();
    }

    let sink = SqlTableSink::from_spec(&spec.database, dataset.table())?;

    Pipeline::new(Box::new(source), Box::new(transform), Box::new(sink))
        .run()
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use csvsync_core::PipelineError;

    const YAML: &str = r#"
name: "psychobunny"
storage:
  type: local
  root: "/tmp/landing"
database:
  url: "sqlite::memory:"
  name: "main"
datasets:
  - type: customers
  - type: transactions
    table: sales
"#;

    fn spec() -> PipelineSpec {
        PipelineSpec::from_yaml(YAML).unwrap()
    }

    fn names(runs: &[&DatasetSpec]) -> Vec<DatasetType> {
        runs.iter().map(|d| d.dataset_type).collect()
    }

    #[test]
    fn no_filter_runs_every_configured_dataset() {
        let spec = spec();
        let runs = select_datasets(&spec, &[]).unwrap();
        assert_eq!(names(&runs), vec![DatasetType::Customers, DatasetType::Transactions]);
    }

    #[test]
    fn filter_keeps_requested_order() {
        let spec = spec();
        let runs =
            select_datasets(&spec, &["transactions".to_string(), "customers".to_string()]).unwrap();
        assert_eq!(names(&runs), vec![DatasetType::Transactions, DatasetType::Customers]);
        assert_eq!(runs[0].table(), "sales");
    }

    #[test]
    fn unknown_type_is_unsupported() {
        let spec = spec();
        let err = select_datasets(&spec, &["widgets".to_string()]).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<PipelineError>(),
            Some(PipelineError::UnsupportedType(name)) if name == "widgets"
        ));
    }

    #[test]
    fn unconfigured_type_is_an_error() {
        let spec = spec();
        let err = select_datasets(&spec, &["de_dates".to_string()]).unwrap_err();
        assert!(err.to_string().contains("de_dates is not configured"));
    }
}
