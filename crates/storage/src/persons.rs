use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use chrono::NaiveDate;
use shared::domain::{PersonId, RoleId};
use sqlx::{sqlite::SqliteRow, Row, Sqlite, Transaction};

use crate::{roles::RoleSummary, Record, Repository, Storage, StoreError};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonName {
    pub title: String,
    pub first_name: String,
    pub middle_name: String,
    pub last_name: String,
    pub suffix: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersonSummary {
    pub id: PersonId,
    pub name: PersonName,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersonRecord {
    pub id: Option<PersonId>,
    pub name: PersonName,
    pub birthday: Option<NaiveDate>,
    pub employed: bool,
    pub roles: Vec<RoleSummary>,
}

impl Record for PersonRecord {
    type Id = PersonId;

    fn id(&self) -> Option<PersonId> {
        self.id
    }

    fn set_id(&mut self, id: Option<PersonId>) {
        self.id = id;
    }
}

pub(crate) fn person_name_from_row(row: &SqliteRow) -> PersonName {
    PersonName {
        title: row.get::<String, _>("title"),
        first_name: row.get::<String, _>("first_name"),
        middle_name: row.get::<String, _>("middle_name"),
        last_name: row.get::<String, _>("last_name"),
        suffix: row.get::<String, _>("suffix"),
    }
}

fn person_from_row(row: &SqliteRow, roles: Vec<RoleSummary>) -> PersonRecord {
    PersonRecord {
        id: Some(PersonId(row.get::<i64, _>("id"))),
        name: person_name_from_row(row),
        birthday: row.get::<Option<NaiveDate>, _>("birthday"),
        employed: row.get::<bool, _>("employed"),
        roles,
    }
}

async fn replace_roles(
    tx: &mut Transaction<'_, Sqlite>,
    person_id: PersonId,
    roles: &[RoleSummary],
) -> Result<(), StoreError> {
    sqlx::query("DELETE FROM person_roles WHERE person_id = ?")
        .bind(person_id.0)
        .execute(&mut **tx)
        .await?;

    let role_ids: BTreeSet<i64> = roles.iter().map(|r| r.id.0).collect();
    for role_id in role_ids {
        sqlx::query("INSERT INTO person_roles (person_id, role_id) VALUES (?, ?)")
            .bind(person_id.0)
            .bind(role_id)
            .execute(&mut **tx)
            .await?;
    }
    Ok(())
}

#[async_trait]
impl Repository<PersonRecord> for Storage {
    async fn create(&self, record: &PersonRecord) -> Result<PersonId, StoreError> {
        let mut tx = self.pool.begin().await?;
        let rec = sqlx::query(
            "INSERT INTO persons (title, first_name, middle_name, last_name, suffix, birthday, employed)
             VALUES (?, ?, ?, ?, ?, ?, ?)
             RETURNING id",
        )
        .bind(&record.name.title)
        .bind(&record.name.first_name)
        .bind(&record.name.middle_name)
        .bind(&record.name.last_name)
        .bind(&record.name.suffix)
        .bind(record.birthday)
        .bind(record.employed)
        .fetch_one(&mut *tx)
        .await?;
        let person_id = PersonId(rec.get::<i64, _>(0));
        replace_roles(&mut tx, person_id, &record.roles).await?;
        tx.commit().await?;
        Ok(person_id)
    }

    async fn update(&self, record: &PersonRecord) -> Result<(), StoreError> {
        let Some(person_id) = record.id else {
            return Err(StoreError::NotFound);
        };
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query(
            "UPDATE persons
             SET title = ?, first_name = ?, middle_name = ?, last_name = ?, suffix = ?, birthday = ?, employed = ?
             WHERE id = ?",
        )
        .bind(&record.name.title)
        .bind(&record.name.first_name)
        .bind(&record.name.middle_name)
        .bind(&record.name.last_name)
        .bind(&record.name.suffix)
        .bind(record.birthday)
        .bind(record.employed)
        .bind(person_id.0)
        .execute(&mut *tx)
        .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        replace_roles(&mut tx, person_id, &record.roles).await?;
        tx.commit().await?;
        Ok(())
    }

    async fn get(&self, id: PersonId) -> Result<PersonRecord, StoreError> {
        let row = sqlx::query(
            "SELECT id, title, first_name, middle_name, last_name, suffix, birthday, employed
             FROM persons WHERE id = ?",
        )
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await?
        .ok_or(StoreError::NotFound)?;
        let roles = self.roles_for_person(id).await?;
        Ok(person_from_row(&row, roles))
    }

    async fn delete(&self, id: PersonId) -> Result<(), StoreError> {
        let result = sqlx::query("DELETE FROM persons WHERE id = ?")
            .bind(id.0)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound);
        }
        Ok(())
    }

    async fn list(&self) -> Result<Vec<PersonRecord>, StoreError> {
        let rows = sqlx::query(
            "SELECT id, title, first_name, middle_name, last_name, suffix, birthday, employed
             FROM persons ORDER BY id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let assignments = sqlx::query(
            "SELECT pr.person_id, r.id, r.name
             FROM person_roles pr
             INNER JOIN roles r ON r.id = pr.role_id
             ORDER BY r.id ASC",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut roles_by_person: HashMap<i64, Vec<RoleSummary>> = HashMap::new();
        for row in assignments {
            roles_by_person
                .entry(row.get::<i64, _>("person_id"))
                .or_default()
                .push(RoleSummary {
                    id: RoleId(row.get::<i64, _>("id")),
                    name: row.get::<String, _>("name"),
                });
        }

        Ok(rows
            .iter()
            .map(|r| {
                let roles = roles_by_person
                    .remove(&r.get::<i64, _>("id"))
                    .unwrap_or_default();
                person_from_row(r, roles)
            })
            .collect())
    }
}

impl Storage {
    async fn roles_for_person(&self, person_id: PersonId) -> Result<Vec<RoleSummary>, StoreError> {
        let rows = sqlx::query(
            "SELECT r.id, r.name
             FROM roles r
             INNER JOIN person_roles pr ON pr.role_id = r.id
             WHERE pr.person_id = ?
             ORDER BY r.id ASC",
        )
        .bind(person_id.0)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|r| RoleSummary {
                id: RoleId(r.get::<i64, _>("id")),
                name: r.get::<String, _>("name"),
            })
            .collect())
    }
}
