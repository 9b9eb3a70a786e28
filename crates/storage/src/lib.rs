use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{
    error::ErrorKind,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Sqlite,
};
use std::{
    fmt, fs,
    path::{Path, PathBuf},
    str::FromStr,
};
use thiserror::Error;

mod persons;
mod roles;
mod users;

pub use persons::{PersonName, PersonRecord, PersonSummary};
pub use roles::{RoleRecord, RoleSummary};
pub use users::UserRecord;

#[derive(Clone)]
pub struct Storage {
    pool: Pool<Sqlite>,
}

/// Store-level failure, classified so callers can translate the three
/// expected outcomes without inspecting driver errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,
    #[error("duplicate key: {0}")]
    DuplicateKey(String),
    #[error("referential constraint violated: {0}")]
    ReferentialConstraint(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

// SQLITE_CONSTRAINT_FOREIGNKEY and SQLITE_CONSTRAINT_TRIGGER (raised by RESTRICT actions).
const SQLITE_FOREIGN_KEY_CODES: [&str; 2] = ["787", "1811"];

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        let classified = match &err {
            sqlx::Error::RowNotFound => return StoreError::NotFound,
            sqlx::Error::Database(db) => Some((
                db.kind(),
                db.code().is_some_and(|code| SQLITE_FOREIGN_KEY_CODES.contains(&&*code)),
                db.message().to_string(),
            )),
            _ => None,
        };
        match classified {
            Some((ErrorKind::UniqueViolation, _, message)) => StoreError::DuplicateKey(message),
            Some((ErrorKind::ForeignKeyViolation, _, message)) | Some((_, true, message)) => {
                StoreError::ReferentialConstraint(message)
            }
            _ => StoreError::Other(anyhow::Error::new(err)),
        }
    }
}

/// A persisted entity whose identity is assigned by the store.
pub trait Record: Clone + Send + Sync + 'static {
    type Id: Copy + fmt::Display + fmt::Debug + Send + Sync + 'static;

    fn id(&self) -> Option<Self::Id>;
    fn set_id(&mut self, id: Option<Self::Id>);
}

#[async_trait]
pub trait Repository<E: Record>: Send + Sync {
    async fn create(&self, record: &E) -> Result<E::Id, StoreError>;
    async fn update(&self, record: &E) -> Result<(), StoreError>;
    async fn get(&self, id: E::Id) -> Result<E, StoreError>;
    async fn delete(&self, id: E::Id) -> Result<(), StoreError>;
    async fn list(&self) -> Result<Vec<E>, StoreError>;
}

impl Storage {
    pub async fn new(database_url: &str) -> Result<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        tracing::debug!(%database_url, "storage ready");
        Ok(Self { pool })
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    pub async fn health_check(&self) -> Result<()> {
        let _: i64 = sqlx::query_scalar("SELECT 1")
            .fetch_one(&self.pool)
            .await
            .context("sqlite ping failed")?;
        Ok(())
    }
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> Result<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).with_context(|| {
        format!(
            "failed to create parent directory '{}' for database url '{database_url}'",
            parent.display()
        )
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
