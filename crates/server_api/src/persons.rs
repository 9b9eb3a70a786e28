use std::sync::Arc;

use shared::{
    domain::{NameDto, PersonDto, PersonId, RoleRef},
    error::{ErrorCode, FieldError, MessageArg, ValidationError},
};
use storage::{PersonName, PersonRecord, RoleSummary, Storage, StoreError};

use crate::{
    display_id,
    validation::{test_max_length, test_not_empty, MAX_CHARACTERS},
    Assembler, CrudService, FailureHooks, Validator,
};

pub type PersonService = CrudService<PersonRecord, PersonDto>;

pub fn person_service(storage: Storage) -> PersonService {
    CrudService::new(
        Arc::new(storage),
        Arc::new(PersonAssembler),
        Arc::new(PersonValidator),
        FailureHooks {
            on_not_found: missing_person,
            on_in_use: unknown_role,
            ..FailureHooks::default()
        },
    )
}

pub(crate) fn name_dto(name: &PersonName) -> NameDto {
    NameDto {
        title: name.title.clone(),
        first_name: name.first_name.clone(),
        middle_name: name.middle_name.clone(),
        last_name: name.last_name.clone(),
        suffix: name.suffix.clone(),
    }
}

fn person_name(name: &NameDto) -> PersonName {
    PersonName {
        title: name.title.clone(),
        first_name: name.first_name.clone(),
        middle_name: name.middle_name.clone(),
        last_name: name.last_name.clone(),
        suffix: name.suffix.clone(),
    }
}

pub struct PersonAssembler;

impl Assembler<PersonRecord, PersonDto> for PersonAssembler {
    fn to_dto(&self, entity: &PersonRecord) -> PersonDto {
        PersonDto {
            id: entity.id,
            name: name_dto(&entity.name),
            birthday: entity.birthday,
            employed: entity.employed,
            roles: entity
                .roles
                .iter()
                .map(|role| RoleRef {
                    id: role.id,
                    name: role.name.clone(),
                })
                .collect(),
        }
    }

    fn to_entity(&self, dto: &PersonDto) -> PersonRecord {
        PersonRecord {
            id: dto.id,
            name: person_name(&dto.name),
            birthday: dto.birthday,
            employed: dto.employed,
            roles: dto
                .roles
                .iter()
                .map(|role| RoleSummary {
                    id: role.id,
                    name: role.name.clone(),
                })
                .collect(),
        }
    }
}

pub struct PersonValidator;

impl Validator<PersonDto> for PersonValidator {
    fn validate(&self, person: &PersonDto) -> Vec<FieldError> {
        let name = &person.name;
        let mut errors = Vec::new();
        test_not_empty(
            &name.first_name,
            "name.first_name",
            "person.data.column.firstName",
            &mut errors,
        );
        test_not_empty(
            &name.last_name,
            "name.last_name",
            "person.data.column.lastName",
            &mut errors,
        );
        for (value, field, label) in [
            (&name.title, "name.title", "person.data.column.title"),
            (&name.first_name, "name.first_name", "person.data.column.firstName"),
            (&name.middle_name, "name.middle_name", "person.data.column.middleName"),
            (&name.last_name, "name.last_name", "person.data.column.lastName"),
            (&name.suffix, "name.suffix", "person.data.column.suffix"),
        ] {
            test_max_length(value, field, MAX_CHARACTERS, label, &mut errors);
        }
        errors
    }
}

/// Display names of the roles assigned to a person, `"; "`-separated.
pub fn role_names(person: &PersonDto) -> String {
    person
        .roles
        .iter()
        .map(|role| role.name.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

fn missing_person(id: Option<PersonId>) -> ValidationError<PersonDto> {
    ValidationError::new(
        ErrorCode::NotFound,
        "person.validation.message.notFound",
        PersonDto::default(),
        vec![MessageArg::text(display_id(id))],
    )
}

// A person only references roles, so the constraint that can fail on
// create/update is a role id that does not (or no longer does) exist.
fn unknown_role(person: &PersonRecord, _: &StoreError) -> ValidationError<PersonDto> {
    let dto = PersonAssembler.to_dto(person);
    let name = dto.name.to_string();
    ValidationError::new(
        ErrorCode::InUse,
        "person.validation.message.invalidRole",
        dto,
        vec![MessageArg::text(name)],
    )
}
