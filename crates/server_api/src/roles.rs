use std::sync::Arc;

use shared::{
    domain::{PersonRef, RoleDto, RoleId},
    error::{ErrorCode, FieldError, MessageArg, ValidationError},
};
use storage::{RoleRecord, Storage, StoreError};

use crate::{
    display_id,
    persons::name_dto,
    validation::{test_max_length, test_not_empty, MAX_CHARACTERS},
    Assembler, CrudService, FailureHooks, Validator,
};

pub type RoleService = CrudService<RoleRecord, RoleDto>;

pub fn role_service(storage: Storage) -> RoleService {
    CrudService::new(
        Arc::new(storage),
        Arc::new(RoleAssembler),
        Arc::new(RoleValidator),
        FailureHooks {
            on_duplicate: duplicate_role,
            on_not_found: missing_role,
            on_in_use: role_in_use,
        },
    )
}

pub struct RoleAssembler;

impl Assembler<RoleRecord, RoleDto> for RoleAssembler {
    fn to_dto(&self, entity: &RoleRecord) -> RoleDto {
        RoleDto {
            id: entity.id,
            name: entity.name.clone(),
            persons: entity
                .persons
                .iter()
                .map(|person| PersonRef {
                    id: person.id,
                    name: name_dto(&person.name).to_string(),
                })
                .collect(),
        }
    }

    fn to_entity(&self, dto: &RoleDto) -> RoleRecord {
        RoleRecord {
            id: dto.id,
            name: dto.name.clone(),
            persons: Vec::new(),
        }
    }
}

pub struct RoleValidator;

impl Validator<RoleDto> for RoleValidator {
    fn validate(&self, role: &RoleDto) -> Vec<FieldError> {
        let mut errors = Vec::new();
        test_not_empty(&role.name, "name", "role.data.column.name", &mut errors);
        test_max_length(
            &role.name,
            "name",
            MAX_CHARACTERS,
            "role.data.column.name",
            &mut errors,
        );
        errors
    }
}

/// Display names of the persons assigned to a role, `"; "`-separated.
pub fn person_names(role: &RoleDto) -> String {
    role.persons
        .iter()
        .map(|person| person.name.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

fn duplicate_role(role: &RoleRecord, _: &StoreError) -> ValidationError<RoleDto> {
    ValidationError::new(
        ErrorCode::DuplicateEntry,
        "role.validation.message.duplicateEntry",
        RoleAssembler.to_dto(role),
        vec![MessageArg::text(&role.name)],
    )
}

fn missing_role(id: Option<RoleId>) -> ValidationError<RoleDto> {
    ValidationError::new(
        ErrorCode::NotFound,
        "role.validation.message.notFound",
        RoleDto::default(),
        vec![MessageArg::text(display_id(id))],
    )
}

fn role_in_use(role: &RoleRecord, cause: &StoreError) -> ValidationError<RoleDto> {
    let dto = RoleAssembler.to_dto(role);
    if dto.persons.is_empty() {
        tracing::warn!(%cause, role = %role.name, "role rejected by constraint without assigned persons");
        return ValidationError::new(ErrorCode::InUse, "validation.message.inUse", dto, Vec::new());
    }
    let names = person_names(&dto);
    ValidationError::new(
        ErrorCode::InUse,
        "role.validation.message.inUsed",
        dto,
        vec![MessageArg::text(names)],
    )
}
