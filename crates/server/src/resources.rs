use chrono::NaiveDate;
use serde::Deserialize;
use server_api::{persons, roles, ApiContext, PersonService, RoleService, UserService};
use shared::{
    domain::{NameDto, PersonDto, PersonId, RoleDto, RoleId, RoleRef, UserDto, UserId},
    error::{FieldError, MessageArg, ValidationError},
};

use crate::controller::{parse_id, Resource};

pub(crate) struct Roles;
pub(crate) struct Persons;
pub(crate) struct Users;

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct RoleForm {
    id: Option<String>,
    name: String,
}

impl Resource for Roles {
    type Id = RoleId;
    type Dto = RoleDto;
    type Form = RoleForm;
    type Service = RoleService;

    const PREFIX: &'static str = "role";
    const PATH: &'static str = "/roles";

    fn service(api: &ApiContext) -> &RoleService {
        &api.roles
    }

    fn from_form(form: RoleForm) -> Result<RoleDto, ValidationError<RoleDto>> {
        Ok(RoleDto {
            id: parse_id(form.id.as_deref()),
            name: form.name,
            persons: Vec::new(),
        })
    }

    fn display_name(dto: &RoleDto) -> String {
        dto.name.clone()
    }

    fn affected(dto: &RoleDto) -> Option<(&'static str, String)> {
        Some(("role.successMessage.affectedPersons", roles::person_names(dto)))
    }
}

/// Person form fields. Role ids arrive as repeated `roles` values (a
/// multi-select), each of which may also be a comma-separated list;
/// `employed` is a checkbox, present only when ticked.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct PersonForm {
    id: Option<String>,
    title: String,
    first_name: String,
    middle_name: String,
    last_name: String,
    suffix: String,
    birthday: String,
    employed: Option<String>,
    roles: Vec<String>,
}

impl Resource for Persons {
    type Id = PersonId;
    type Dto = PersonDto;
    type Form = PersonForm;
    type Service = PersonService;

    const PREFIX: &'static str = "person";
    const PATH: &'static str = "/persons";

    fn service(api: &ApiContext) -> &PersonService {
        &api.persons
    }

    fn from_form(form: PersonForm) -> Result<PersonDto, ValidationError<PersonDto>> {
        let mut errors = Vec::new();

        let birthday = match form.birthday.trim() {
            "" => None,
            raw => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
                Ok(date) => Some(date),
                Err(_) => {
                    errors.push(FieldError::field(
                        "birthday",
                        "validation.message.invalidDate",
                        vec![MessageArg::localized("person.data.column.birthday")],
                    ));
                    None
                }
            },
        };

        let mut roles = Vec::new();
        for raw in form
            .roles
            .iter()
            .flat_map(|value| value.split(','))
            .map(str::trim)
            .filter(|raw| !raw.is_empty())
        {
            match raw.parse::<i64>() {
                Ok(id) => roles.push(RoleRef {
                    id: RoleId(id),
                    name: String::new(),
                }),
                Err(_) => {
                    errors.push(FieldError::field(
                        "roles",
                        "validation.message.invalidNumber",
                        vec![MessageArg::localized("person.data.column.roles")],
                    ));
                    break;
                }
            }
        }

        let person = PersonDto {
            id: parse_id(form.id.as_deref()),
            name: NameDto {
                title: form.title,
                first_name: form.first_name,
                middle_name: form.middle_name,
                last_name: form.last_name,
                suffix: form.suffix,
            },
            birthday,
            employed: form
                .employed
                .is_some_and(|value| matches!(value.as_str(), "on" | "true" | "1")),
            roles,
        };

        if errors.is_empty() {
            Ok(person)
        } else {
            Err(ValidationError::fields(errors, person))
        }
    }

    fn display_name(dto: &PersonDto) -> String {
        dto.name.to_string()
    }

    fn affected(dto: &PersonDto) -> Option<(&'static str, String)> {
        Some(("person.successMessage.affectedRoles", persons::role_names(dto)))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub(crate) struct UserForm {
    id: Option<String>,
    username: String,
    password: String,
}

impl Resource for Users {
    type Id = UserId;
    type Dto = UserDto;
    type Form = UserForm;
    type Service = UserService;

    const PREFIX: &'static str = "user";
    const PATH: &'static str = "/users";

    fn service(api: &ApiContext) -> &UserService {
        &api.users
    }

    fn from_form(form: UserForm) -> Result<UserDto, ValidationError<UserDto>> {
        Ok(UserDto {
            id: parse_id(form.id.as_deref()),
            username: form.username,
            password: form.password,
        })
    }

    fn display_name(dto: &UserDto) -> String {
        dto.username.clone()
    }
}
