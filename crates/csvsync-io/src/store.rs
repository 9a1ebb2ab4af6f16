use anyhow::Context;
use csvsync_core::{PipelineError, Result, S3StorageSpec, StorageSpec};
use object_store::aws::AmazonS3Builder;
use object_store::local::LocalFileSystem;
use object_store::ObjectStore;
use std::sync::Arc;
use tracing::info;

/// Build the object store client for one run
pub fn build_object_store(spec: &StorageSpec) -> Result<Arc<dyn ObjectStore>> {
    match spec {
        StorageSpec::S3(s3) => build_s3(s3),
        StorageSpec::Local(local) => {
            info!("Using local directory {} as object store", local.root);
            let store = LocalFileSystem::new_with_prefix(&local.root)
                .with_context(|| format!("open local store at {}", local.root))?;
            Ok(Arc::new(store))
        }
    }
}

fn build_s3(spec: &S3StorageSpec) -> Result<Arc<dyn ObjectStore>> {
    if spec.bucket.is_empty() {
        return Err(PipelineError::Config("storage.bucket must not be empty".into()));
    }
    info!("Creating S3 object store for bucket {}", spec.bucket);

    // Anything not given explicitly falls back to the AWS_* environment.
    let mut builder = AmazonS3Builder::from_env()
        .with_bucket_name(&spec.bucket)
        .with_allow_http(spec.allow_http);
    if let Some(endpoint) = &spec.endpoint {
        info!("Using S3 endpoint {}", endpoint);
        builder = builder.with_endpoint(endpoint);
    }
    if let Some(region) = &spec.region {
        builder = builder.with_region(region);
    }
    if let Some(access_key) = &spec.access_key {
        builder = builder.with_access_key_id(access_key);
    }
    if let Some(secret_key) = &spec.secret_key {
        builder = builder.with_secret_access_key(secret_key);
    }

    let store = builder
        .build()
        .map_err(|e| PipelineError::Storage(Box::new(e)))?;
    Ok(Arc::new(store))
}
