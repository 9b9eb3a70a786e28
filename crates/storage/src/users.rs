use async_trait::async_trait;
use shared::domain::UserId;
use sqlx::{sqlite::SqliteRow, Row};

use crate::{Record, Repository, Storage, StoreError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserRecord {
    pub id: Option<UserId>,
    pub username: String,
    pub password: String,
}

impl Record for UserRecord {
    type Id = UserId;

    fn id(&self) -> Option<UserId> {
        self.id
    }

    fn set_id(&mut self, id: Option<UserId>) {
        self.id = id;
    }
}

fn user_from_row(row: &SqliteRow) -> UserRecord {
    UserRecord {
        id: Some(UserId(row.get::<i64, _>("id"))),
        username: row.get::<String, _>("username"),
        password: row.get::<String, _>("password"),
    }
}

#[async_trait]
impl Repository<UserRecord> for Storage {
    async fn create(&self, record: &UserRecord) -> Result<UserId, StoreError> {
        let rec = sqlx::query("INSERT INTO users (username, password) VALUES (?, ?) RETURNING id")
            .bind(&record.username)
            .bind(&record.password)
            .fetch_one(&self.pool)
            .await?;
        Ok(UserId(rec.get::<i64, _>(0)))
    }

    async fn update(&self, record: &UserRecord) -> Result<(), StoreError> {
        let Some(id) = record.id else {
            return Err(StoreError::NotFound);
        };
        let result = sqlx::query("UPDATE users SET username = ?, password = ? WHERE id = ?")
            .bind(&record.username)
            .bind(&record.password)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get(&self, id: UserId) -> Result<UserRecord, StoreError> {
        let row = sqlx::query("SELECT id, username, password FROM users WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        Ok(user_from_row(&row))
    }

    async fn delete(&self, id: UserId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<UserRecord>, StoreError> {
        let rows = sqlx::query("SELECT id, username, password FROM users ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        Ok(rows.iter().map(user_from_row).collect())
    }
}

impl Storage {
    pub async fn user_by_username(&self, username: &str) -> Result<UserRecord, StoreError> {
        let row = sqlx::query("SELECT id, username, password FROM users WHERE username = ?")
            .bind(username)
            .fetch_one(&self.pool)
            .await?;
        Ok(user_from_row(&row))
    }
}
