use std::collections::HashMap;

use async_trait::async_trait;
use shared::domain::{PersonId, RoleId};
use sqlx::Row;

use crate::{
    persons::{person_name_from_row, PersonSummary},
    Record, Repository, Storage, StoreError,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RoleRecord {
    pub id: Option<RoleId>,
    pub name: String,
    pub persons: Vec<PersonSummary>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoleSummary {
    pub id: RoleId,
    pub name: String,
}

impl Record for RoleRecord {
    type Id = RoleId;

    fn id(&self) -> Option<RoleId> {
        self.id
    }

    fn set_id(&mut self, id: Option<RoleId>) {
        self.id = id;
    }
}

#[async_trait]
impl Repository<RoleRecord> for Storage {
    async fn create(&self, record: &RoleRecord) -> Result<RoleId, StoreError> {
        let rec = sqlx::query("INSERT INTO roles (name) VALUES (?) RETURNING id")
            .bind(&record.name)
            .fetch_one(&self.pool)
            .await?;
        Ok(RoleId(rec.get::<i64, _>(0)))
    }

    async fn update(&self, record: &RoleRecord) -> Result<(), StoreError> {
        let Some(id) = record.id else {
            return Err(StoreError::NotFound);
        };
        let result = sqlx::query("UPDATE roles SET name = ? WHERE id = ?")
            .bind(&record.name)
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn get(&self, id: RoleId) -> Result<RoleRecord, StoreError> {
        let row = sqlx::query("SELECT id, name FROM roles WHERE id = ?")
            .bind(id.0)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::NotFound)?;
        let persons = self.persons_for_role(id).await?;
        Ok(RoleRecord {
            id: Some(RoleId(row.get::<i64, _>("id"))),
            name: row.get::<String, _>("name"),
            persons,
        })
    }

    async fn delete(&self, id: RoleId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM roles WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<RoleRecord>, StoreError> {
        let rows = sqlx::query("SELECT id, name FROM roles ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;

        let assignments = sqlx::query(
            "SELECT pr.role_id, p.id, p.title, p.first_name, p.middle_name, p.last_name, p.suffix
             FROM person_roles pr
             INNER JOIN persons p ON p.id = pr.person_id
             ORDER BY p.id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut persons_by_role: HashMap<i64, Vec<PersonSummary>> = HashMap::new();
        for row in assignments {
            persons_by_role
                .entry(row.get::<i64, _>("role_id"))
                .or_default()
                .push(PersonSummary {
                    id: PersonId(row.get::<i64, _>("id")),
                    name: person_name_from_row(&row),
                });
        }

        Ok(rows
            .into_iter()
            .map(|r| {
                let id = r.get::<i64, _>("id");
                RoleRecord {
                    id: Some(RoleId(id)),
                    name: r.get::<String, _>("name"),
                    persons: persons_by_role.remove(&id).unwrap_or_default(),
                }
            })
            .collect())
    }
}

impl Storage {
    async fn persons_for_role(&self, role_id: RoleId) -> Result<Vec<PersonSummary>, StoreError> {
        let rows = sqlx::query(
            "SELECT p.id, p.title, p.first_name, p.middle_name, p.last_name, p.suffix
             FROM persons p
             INNER JOIN person_roles pr ON pr.person_id = p.id
             WHERE pr.role_id = ?
             ORDER BY p.id ASC",
        )
        .bind(role_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| PersonSummary {
                id: PersonId(r.get::<i64, _>("id")),
                name: person_name_from_row(&r),
            })
            .collect())
    }
}
