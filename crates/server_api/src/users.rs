use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use shared::{
    domain::{UserDto, UserId},
    error::{ErrorCode, FieldError, MessageArg, ValidationError},
};
use storage::{Storage, StoreError, UserRecord};

use crate::{
    display_id, unexpected,
    validation::{test_max_length, test_not_empty, MAX_CHARACTERS},
    Assembler, CrudApi, CrudService, FailureHooks, ServiceError, Validator,
};

/// User administration. Passwords are stored as SHA-256 hex digests; an
/// update that submits an empty password keeps the stored digest.
pub struct UserService {
    inner: CrudService<UserRecord, UserDto>,
    storage: Storage,
}

impl UserService {
    pub fn new(storage: Storage) -> Self {
        let inner = CrudService::new(
            Arc::new(storage.clone()),
            Arc::new(UserAssembler),
            Arc::new(UserValidator),
            FailureHooks {
                on_duplicate: duplicate_user,
                on_not_found: missing_user,
                ..FailureHooks::default()
            },
        );
        Self { inner, storage }
    }

    pub async fn get_by_username(&self, username: &str) -> Result<UserDto, ServiceError<UserDto>> {
        match self.storage.user_by_username(username).await {
            Ok(user) => Ok(UserAssembler.to_dto(&user)),
            Err(StoreError::NotFound) => Err(ValidationError::new(
                ErrorCode::NotFound,
                "user.validation.message.usernameNotFound",
                UserDto::default(),
                vec![MessageArg::text(username)],
            )
            .into()),
            Err(other) => Err(unexpected(other)),
        }
    }
}

pub fn hash_password(raw: &str) -> String {
    format!("{:x}", Sha256::digest(raw.as_bytes()))
}

#[async_trait]
impl CrudApi<UserDto> for UserService {
    type Id = UserId;

    async fn create(&self, mut user: UserDto) -> Result<UserId, ServiceError<UserDto>> {
        let mut errors = self.inner.field_errors(&user);
        test_not_empty(
            &user.password,
            "password",
            "user.data.column.password",
            &mut errors,
        );
        if !errors.is_empty() {
            return Err(ValidationError::fields(errors, user).into());
        }
        user.password = hash_password(&user.password);
        self.inner.create(user).await
    }

    async fn update(&self, user: UserDto) -> Result<UserDto, ServiceError<UserDto>> {
        let mut user = self.inner.validate(user)?;
        let Some(id) = user.id else {
            return self.inner.update(user).await;
        };
        let original = self.inner.get(id).await?;
        user.password = if user.password.is_empty() {
            original.password
        } else {
            hash_password(&user.password)
        };
        self.inner.update(user).await
    }

    async fn get(&self, id: UserId) -> Result<UserDto, ServiceError<UserDto>> {
        self.inner.get(id).await
    }

    async fn list(&self) -> Result<Vec<UserDto>, ServiceError<UserDto>> {
        self.inner.list().await
    }

    async fn delete(&self, id: UserId) -> Result<UserDto, ServiceError<UserDto>> {
        self.inner.delete(id).await
    }
}

pub struct UserAssembler;

impl Assembler<UserRecord, UserDto> for UserAssembler {
    fn to_dto(&self, entity: &UserRecord) -> UserDto {
        UserDto {
            id: entity.id,
            username: entity.username.clone(),
            password: entity.password.clone(),
        }
    }

    fn to_entity(&self, dto: &UserDto) -> UserRecord {
        UserRecord {
            id: dto.id,
            username: dto.username.clone(),
            password: dto.password.clone(),
        }
    }
}

pub struct UserValidator;

impl Validator<UserDto> for UserValidator {
    fn validate(&self, user: &UserDto) -> Vec<FieldError> {
        let mut errors = Vec::new();
        test_not_empty(
            &user.username,
            "username",
            "user.data.column.username",
            &mut errors,
        );
        test_max_length(
            &user.username,
            "username",
            MAX_CHARACTERS,
            "user.data.column.username",
            &mut errors,
        );
        errors
    }
}

fn duplicate_user(user: &UserRecord, _: &StoreError) -> ValidationError<UserDto> {
    ValidationError::new(
        ErrorCode::DuplicateEntry,
        "user.validation.message.duplicateEntry",
        UserAssembler.to_dto(user),
        vec![MessageArg::text(&user.username)],
    )
}

fn missing_user(id: Option<UserId>) -> ValidationError<UserDto> {
    ValidationError::new(
        ErrorCode::NotFound,
        "user.validation.message.notFound",
        UserDto::default(),
        vec![MessageArg::text(display_id(id))],
    )
}
