use std::{fmt, sync::Arc};

use async_trait::async_trait;
use shared::error::{ErrorCode, FieldError, MessageArg, ValidationError};
use storage::{Record, Repository, Storage, StoreError};
use thiserror::Error;

pub mod persons;
pub mod roles;
pub mod users;
pub mod validation;

pub use persons::{person_service, PersonService};
pub use roles::{role_service, RoleService};
pub use users::UserService;

#[derive(Clone)]
pub struct ApiContext {
    pub storage: Storage,
    pub roles: Arc<RoleService>,
    pub persons: Arc<PersonService>,
    pub users: Arc<UserService>,
}

impl ApiContext {
    pub fn new(storage: Storage) -> Self {
        Self {
            roles: Arc::new(role_service(storage.clone())),
            persons: Arc::new(person_service(storage.clone())),
            users: Arc::new(UserService::new(storage.clone())),
            storage,
        }
    }
}

/// Outcome of a failed service call: either a user-facing rejection that the
/// caller renders, or anything else, which propagates untouched.
#[derive(Debug, Error)]
pub enum ServiceError<D> {
    #[error("{0}")]
    Rejected(ValidationError<D>),
    #[error(transparent)]
    Unexpected(anyhow::Error),
}

impl<D> ServiceError<D> {
    pub fn code(&self) -> ErrorCode {
        match self {
            ServiceError::Rejected(rejection) => rejection.code,
            ServiceError::Unexpected(_) => ErrorCode::Internal,
        }
    }
}

impl<D> From<ValidationError<D>> for ServiceError<D> {
    fn from(value: ValidationError<D>) -> Self {
        ServiceError::Rejected(value)
    }
}

impl<D> From<anyhow::Error> for ServiceError<D> {
    fn from(value: anyhow::Error) -> Self {
        ServiceError::Unexpected(value)
    }
}

fn unexpected<D>(cause: StoreError) -> ServiceError<D> {
    match cause {
        StoreError::Other(err) => ServiceError::Unexpected(err),
        classified => ServiceError::Unexpected(anyhow::Error::new(classified)),
    }
}

pub trait Assembler<E, D>: Send + Sync {
    fn to_dto(&self, entity: &E) -> D;
    fn to_entity(&self, dto: &D) -> E;
}

pub trait Validator<D>: Send + Sync {
    fn validate(&self, dto: &D) -> Vec<FieldError>;
}

/// Per-entity translation of classified store failures into rejections,
/// one hook per failure kind.
pub struct FailureHooks<E: Record, D> {
    pub on_duplicate: fn(&E, &StoreError) -> ValidationError<D>,
    pub on_not_found: fn(Option<E::Id>) -> ValidationError<D>,
    pub on_in_use: fn(&E, &StoreError) -> ValidationError<D>,
}

impl<E: Record, D: Default> Default for FailureHooks<E, D> {
    fn default() -> Self {
        Self {
            on_duplicate: default_duplicate::<E, D>,
            on_not_found: default_not_found::<E, D>,
            on_in_use: default_in_use::<E, D>,
        }
    }
}

fn default_duplicate<E, D: Default>(_: &E, _: &StoreError) -> ValidationError<D> {
    ValidationError::new(
        ErrorCode::DuplicateEntry,
        "validation.message.duplicateEntry",
        D::default(),
        Vec::new(),
    )
}

fn default_not_found<E: Record, D: Default>(id: Option<E::Id>) -> ValidationError<D> {
    ValidationError::new(
        ErrorCode::NotFound,
        "validation.message.notFound",
        D::default(),
        vec![MessageArg::text(display_id(id))],
    )
}

fn default_in_use<E, D: Default>(_: &E, _: &StoreError) -> ValidationError<D> {
    ValidationError::new(
        ErrorCode::InUse,
        "validation.message.inUse",
        D::default(),
        Vec::new(),
    )
}

pub(crate) fn display_id<I: fmt::Display>(id: Option<I>) -> String {
    id.map(|id| id.to_string()).unwrap_or_default()
}

impl<E: Record, D> FailureHooks<E, D> {
    fn translate(&self, entity: &E, cause: StoreError) -> ServiceError<D> {
        match cause {
            StoreError::Other(err) => ServiceError::Unexpected(err),
            StoreError::NotFound => ServiceError::Rejected((self.on_not_found)(entity.id())),
            ref cause @ StoreError::DuplicateKey(_) => {
                ServiceError::Rejected((self.on_duplicate)(entity, cause))
            }
            ref cause @ StoreError::ReferentialConstraint(_) => {
                ServiceError::Rejected((self.on_in_use)(entity, cause))
            }
        }
    }

    fn translate_lookup(&self, id: E::Id, cause: StoreError) -> ServiceError<D> {
        match cause {
            StoreError::NotFound => ServiceError::Rejected((self.on_not_found)(Some(id))),
            other => unexpected(other),
        }
    }
}

#[async_trait]
pub trait CrudApi<D: Send + 'static>: Send + Sync {
    type Id: Copy + fmt::Display + Send + Sync + 'static;

    async fn create(&self, dto: D) -> Result<Self::Id, ServiceError<D>>;
    /// Returns the record as re-read after the update.
    async fn update(&self, dto: D) -> Result<D, ServiceError<D>>;
    async fn get(&self, id: Self::Id) -> Result<D, ServiceError<D>>;
    async fn list(&self) -> Result<Vec<D>, ServiceError<D>>;
    /// Returns the record as it was just before removal.
    async fn delete(&self, id: Self::Id) -> Result<D, ServiceError<D>>;
}

pub struct CrudService<E: Record, D> {
    repository: Arc<dyn Repository<E>>,
    assembler: Arc<dyn Assembler<E, D>>,
    validator: Arc<dyn Validator<D>>,
    hooks: FailureHooks<E, D>,
}

impl<E: Record, D> CrudService<E, D> {
    pub fn new(
        repository: Arc<dyn Repository<E>>,
        assembler: Arc<dyn Assembler<E, D>>,
        validator: Arc<dyn Validator<D>>,
        hooks: FailureHooks<E, D>,
    ) -> Self {
        Self {
            repository,
            assembler,
            validator,
            hooks,
        }
    }

    pub fn field_errors(&self, dto: &D) -> Vec<FieldError> {
        self.validator.validate(dto)
    }

    pub fn validate(&self, dto: D) -> Result<D, ServiceError<D>> {
        let errors = self.field_errors(&dto);
        if errors.is_empty() {
            Ok(dto)
        } else {
            Err(ValidationError::fields(errors, dto).into())
        }
    }

    async fn fetch(&self, id: E::Id) -> Result<E, ServiceError<D>> {
        self.repository
            .get(id)
            .await
            .map_err(|cause| self.hooks.translate_lookup(id, cause))
    }
}

#[async_trait]
impl<E, D> CrudApi<D> for CrudService<E, D>
where
    E: Record,
    D: Send + Sync + 'static,
{
    type Id = E::Id;

    async fn create(&self, dto: D) -> Result<E::Id, ServiceError<D>> {
        let dto = self.validate(dto)?;
        let mut entity = self.assembler.to_entity(&dto);
        match self.repository.create(&entity).await {
            Ok(id) => {
                tracing::info!(%id, "record created");
                Ok(id)
            }
            Err(cause) => {
                entity.set_id(None);
                Err(self.hooks.translate(&entity, cause))
            }
        }
    }

    async fn update(&self, dto: D) -> Result<D, ServiceError<D>> {
        let dto = self.validate(dto)?;
        let entity = self.assembler.to_entity(&dto);
        let Some(id) = entity.id() else {
            return Err((self.hooks.on_not_found)(None).into());
        };
        self.repository
            .update(&entity)
            .await
            .map_err(|cause| self.hooks.translate(&entity, cause))?;
        tracing::info!(%id, "record updated");
        self.get(id).await
    }

    async fn get(&self, id: E::Id) -> Result<D, ServiceError<D>> {
        let entity = self.fetch(id).await?;
        Ok(self.assembler.to_dto(&entity))
    }

    async fn list(&self) -> Result<Vec<D>, ServiceError<D>> {
        let entities = self.repository.list().await.map_err(unexpected)?;
        Ok(entities
            .iter()
            .map(|entity| self.assembler.to_dto(entity))
            .collect())
    }

    async fn delete(&self, id: E::Id) -> Result<D, ServiceError<D>> {
        let entity = self.fetch(id).await?;
        self.repository
            .delete(id)
            .await
            .map_err(|cause| self.hooks.translate(&entity, cause))?;
        tracing::info!(%id, "record deleted");
        Ok(self.assembler.to_dto(&entity))
    }
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
