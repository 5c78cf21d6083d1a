pub mod mysql;
pub mod sqlite;

use thiserror::Error;
use tracing::{error, info};

pub use mysql::MySqlSession;
pub use sqlite::SqliteSession;

pub const TABLE_NAME: &str = "scraped_data";

/// Placeholder stored when a cell lacks the sub-element a field comes from.
pub const NOT_AVAILABLE: &str = "N/A";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("mysql: {0}")]
    MySql(#[from] sqlx::Error),
}

// ── Rows ──

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryRecord {
    pub name: String,
    pub link: String,
    pub description: String,
}

/// Extracted categories kept as three index-aligned columns.
///
/// Rows can only be appended whole, so `names`, `links` and `descriptions`
/// always have the same length and index `i` in each describes one record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryBatch {
    names: Vec<String>,
    links: Vec<String>,
    descriptions: Vec<String>,
}

impl CategoryBatch {
    pub fn push(&mut self, record: CategoryRecord) {
        self.names.push(record.name);
        self.links.push(record.link);
        self.descriptions.push(record.description);
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    #[cfg(test)]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[cfg(test)]
    pub fn links(&self) -> &[String] {
        &self.links
    }

    pub fn descriptions(&self) -> &[String] {
        &self.descriptions
    }

    pub fn set_description(&mut self, index: usize, description: String) {
        if let Some(slot) = self.descriptions.get_mut(index) {
            *slot = description;
        }
    }

    #[cfg(test)]
    pub fn record(&self, index: usize) -> Option<CategoryRecord> {
        Some(CategoryRecord {
            name: self.names.get(index)?.clone(),
            link: self.links.get(index)?.clone(),
            description: self.descriptions.get(index)?.clone(),
        })
    }

    /// `(name, link, description)` per record, in document order.
    pub fn rows(&self) -> impl Iterator<Item = (&str, &str, &str)> + '_ {
        self.names
            .iter()
            .zip(&self.links)
            .zip(&self.descriptions)
            .map(|((n, l), d)| (n.as_str(), l.as_str(), d.as_str()))
    }
}

// ── Session ──

/// One open database connection, owned by a single run.
#[allow(async_fn_in_trait)]
pub trait Session: Sized {
    async fn table_exists(&mut self) -> Result<bool, DbError>;
    async fn create_table(&mut self) -> Result<(), DbError>;

    /// Insert every row inside one transaction and commit it once.
    ///
    /// `inserted` counts the inserts executed so far. On error the
    /// transaction is dropped uncommitted, which rolls it back.
    async fn insert_batch(
        &mut self,
        batch: &CategoryBatch,
        inserted: &mut usize,
    ) -> Result<(), DbError>;

    async fn close(self);
}

// ── Persist ──

#[derive(Debug)]
pub enum PersistOutcome {
    Completed {
        table_created: bool,
        inserted: usize,
    },
    /// Nothing from the batch was committed. `inserted_before_failure` counts
    /// the inserts that had executed before `cause` and were rolled back.
    Failed {
        cause: DbError,
        inserted_before_failure: usize,
    },
}

impl PersistOutcome {
    pub fn inserted(&self) -> usize {
        match self {
            PersistOutcome::Completed { inserted, .. } => *inserted,
            PersistOutcome::Failed { .. } => 0,
        }
    }
}

/// Ensure the table exists, insert every row in one transaction and close
/// the session.
///
/// Database errors do not escape: they are logged here and reported through
/// [`PersistOutcome::Failed`]. The session is closed on every path.
pub async fn persist<S: Session>(mut session: S, batch: &CategoryBatch) -> PersistOutcome {
    let mut inserted = 0usize;
    let result = write_batch(&mut session, batch, &mut inserted).await;
    session.close().await;

    match result {
        Ok(table_created) => {
            info!(
                "Inserted {} rows into {} (table created: {})",
                inserted, TABLE_NAME, table_created
            );
            PersistOutcome::Completed {
                table_created,
                inserted,
            }
        }
        Err(cause) => {
            error!("Database error: {}", cause);
            PersistOutcome::Failed {
                cause,
                inserted_before_failure: inserted,
            }
        }
    }
}

async fn write_batch<S: Session>(
    session: &mut S,
    batch: &CategoryBatch,
    inserted: &mut usize,
) -> Result<bool, DbError> {
    let table_created = if session.table_exists().await? {
        false
    } else {
        info!("Table {} not found, creating it", TABLE_NAME);
        session.create_table().await?;
        true
    };

    session.insert_batch(batch, inserted).await?;
    Ok(table_created)
}
