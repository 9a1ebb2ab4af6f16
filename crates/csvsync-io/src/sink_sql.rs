use async_trait::async_trait;
use csvsync_core::{
    validate_identifier, DatabaseSpec, Dataset, Operator, PipelineError, ReplaceMode, Result, Sink,
    Value, TIMESTAMP_FORMAT,
};
use sqlx::{Any, AnyConnection, Connection};
use tracing::{error, info, warn};

/// Databases the loader can write to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    MySql,
    Sqlite,
}

impl Backend {
    pub fn from_url(url: &str) -> Result<Self> {
        match url.split_once(':').map(|(scheme, _)| scheme) {
            Some("mysql") | Some("mariadb") => Ok(Backend::MySql),
            Some("sqlite") => Ok(Backend::Sqlite),
            _ => Err(PipelineError::Config(format!(
                "unsupported database url '{url}', expected mysql:// or sqlite:"
            ))),
        }
    }
}

/// Replaces the full contents of one table with a dataset
///
/// Opens one connection per load. In [`ReplaceMode::Atomic`] the delete and
/// every insert share a transaction. In [`ReplaceMode::Truncate`] the
/// truncate commits on its own; if an insert then fails the table is left
/// empty.
pub struct SqlTableSink {
    id: String,
    url: String,
    backend: Backend,
    database: String,
    table: String,
    mode: ReplaceMode,
}

impl SqlTableSink {
    pub fn new(
        url: impl Into<String>,
        database: impl Into<String>,
        table: impl Into<String>,
        mode: ReplaceMode,
    ) -> Result<Self> {
        let url = url.into();
        let database = database.into();
        let table = table.into();
        validate_identifier(&database)?;
        validate_identifier(&table)?;
        Ok(Self {
            id: format!("sql-{table}"),
            backend: Backend::from_url(&url)?,
            url,
            database,
            table,
            mode,
        })
    }

    pub fn from_spec(spec: &DatabaseSpec, table: &str) -> Result<Self> {
        Self::new(spec.url.clone(), spec.name.clone(), table, spec.replace_mode)
    }

    fn qualified_table(&self) -> String {
        format!("{}.{}", self.database, self.table)
    }

    /// Statement clearing the table. SQLite has no `TRUNCATE`, and inside a
    /// transaction MySQL needs `DELETE` since `TRUNCATE` commits implicitly.
    fn clear_statement(&self) -> String {
        match (self.mode, self.backend) {
            (ReplaceMode::Truncate, Backend::MySql) => {
                format!("TRUNCATE TABLE {}", self.qualified_table())
            }
            _ => format!("DELETE FROM {}", self.qualified_table()),
        }
    }

    fn insert_statement(&self, columns: &[String]) -> String {
        let placeholders = vec!["?"; columns.len()].join(", ");
        format!(
            "INSERT INTO {} ({}) VALUES ({})",
            self.qualified_table(),
            columns.join(", "),
            placeholders
        )
    }

    /// Replace the table contents, returning the number of rows inserted
    pub async fn replace(&self, dataset: &Dataset) -> Result<u64> {
        for column in dataset.columns() {
            validate_identifier(column)?;
        }

        match self.replace_inner(dataset).await {
            Ok(inserted) => {
                info!(
                    "Data loaded successfully into table {}. {} rows inserted.",
                    self.table, inserted
                );
                Ok(inserted)
            }
            Err(e) => {
                error!(table = %self.table, error = %e, "Failed to load data into table {}", self.table);
                Err(PipelineError::Load {
                    table: self.table.clone(),
                    source: Box::new(e),
                })
            }
        }
    }

    async fn replace_inner(&self, dataset: &Dataset) -> Result<u64, sqlx::Error> {
        sqlx::any::install_default_drivers();
        let mut conn = AnyConnection::connect(&self.url).await?;
        let insert = self.insert_statement(dataset.columns());

        let inserted = match self.mode {
            ReplaceMode::Atomic => {
                let mut tx = conn.begin().await?;
                sqlx::query::<Any>(&self.clear_statement())
                    .execute(&mut *tx)
                    .await?;
                let inserted = insert_rows(&mut *tx, &insert, dataset).await?;
                tx.commit().await?;
                inserted
            }
            ReplaceMode::Truncate => {
                sqlx::query::<Any>(&self.clear_statement())
                    .execute(&mut conn)
                    .await?;
                info!("Table {} truncated successfully.", self.table);

                let mut tx = conn.begin().await?;
                let inserted = match insert_rows(&mut *tx, &insert, dataset).await {
                    Ok(n) => n,
                    Err(e) => {
                        warn!("Table {} was truncated but the insert failed; it is now empty", self.table);
                        return Err(e);
                    }
                };
                tx.commit().await?;
                inserted
            }
        };

        if let Err(e) = conn.close().await {
            warn!(error = %e, "Failed to close database connection cleanly");
        }
        Ok(inserted)
    }
}

/// One parameterized insert per row, values bound in column order
async fn insert_rows(conn: &mut AnyConnection, sql: &str, dataset: &Dataset) -> Result<u64, sqlx::Error> {
    let mut inserted = 0;
    for row in dataset.rows() {
        let mut query = sqlx::query::<Any>(sql);
        for value in row {
            query = match value {
                Value::Null => query.bind(None::<String>),
                Value::Text(s) => query.bind(s.clone()),
                Value::Integer(i) => query.bind(*i),
                Value::Decimal(d) => query.bind(*d),
                Value::Timestamp(ts) => query.bind(ts.format(TIMESTAMP_FORMAT).to_string()),
            };
        }
        inserted += query.execute(&mut *conn).await?.rows_affected();
    }
    Ok(inserted)
}

impl Operator for SqlTableSink {
    fn name(&self) -> &str {
        &self.id
    }
}

#[async_trait]
impl Sink for SqlTableSink {
    async fn load(&self, dataset: &Dataset) -> Result<u64> {
        self.replace(dataset).await
    }
}
