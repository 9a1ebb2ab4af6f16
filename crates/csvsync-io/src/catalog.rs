use csvsync_core::{PipelineError, Result};
use futures::TryStreamExt;
use object_store::path::Path as ObjectPath;
use object_store::ObjectStore;
use std::sync::Arc;
use tracing::{debug, info};

/// Lists the objects of one bucket
pub struct SourceCatalog {
    store: Arc<dyn ObjectStore>,
}

impl SourceCatalog {
    pub fn new(store: Arc<dyn ObjectStore>) -> Self {
        Self { store }
    }

    /// Every object key under `prefix`, sorted
    ///
    /// `prefix` is a plain string prefix of the key, as with S3 `Prefix=`:
    /// `airflow/psycho` also lists `airflow/psychobunny/a.csv`. The store
    /// lists by whole path segments, so the listing starts at the last
    /// complete segment and is filtered from there.
    ///
    /// The store's list stream follows continuation tokens, so there is no
    /// page limit. Keys come back sorted so concatenation order is the same
    /// on every backend.
    ///
    /// # Errors
    /// [`PipelineError::EmptySource`] when the prefix holds no objects.
    pub async fn list_objects(&self, prefix: &str) -> Result<Vec<String>> {
        let wanted = prefix.trim_start_matches('/');
        let location = wanted
            .rsplit_once('/')
            .map(|(parent, _)| parent)
            .filter(|parent| !parent.is_empty())
            .map(ObjectPath::from);
        let mut keys: Vec<String> = self
            .store
            .list(location.as_ref())
            .map_ok(|meta| meta.location.to_string())
            .try_filter(|key| futures::future::ready(key.starts_with(wanted)))
            .try_collect()
            .await
            .map_err(|e| PipelineError::Storage(Box::new(e)))?;

        if keys.is_empty() {
            return Err(PipelineError::EmptySource {
                prefix: prefix.to_string(),
            });
        }

        keys.sort();
        info!("Found {} objects under '{}'", keys.len(), prefix);
        debug!(?keys, "Listed objects");
        Ok(keys)
    }
}
