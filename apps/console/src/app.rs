use std::{cell::RefCell, future::Future, rc::Rc};

use chrono::NaiveDate;
use menu::{Menu, MenuError, UiRouter};
use server_api::{persons, roles, ApiContext, CrudApi, ServiceError};
use shared::{
    domain::{NameDto, PersonDto, PersonId, RoleDto, RoleId, RoleRef, UserDto, UserId},
    error::MessageArg,
};
use tokio::runtime::Runtime;

use crate::console::Console;

/// Everything a menu handler needs. Handlers block on the runtime for each
/// service call.
#[derive(Clone)]
pub struct Session {
    runtime: Rc<Runtime>,
    api: ApiContext,
    console: Rc<RefCell<Console>>,
}

impl Session {
    pub fn new(runtime: Rc<Runtime>, api: ApiContext, console: Rc<RefCell<Console>>) -> Self {
        Self {
            runtime,
            api,
            console,
        }
    }

    fn call<T, D>(
        &self,
        outcome: impl Future<Output = Result<T, ServiceError<D>>>,
    ) -> anyhow::Result<Option<T>> {
        match self.runtime.block_on(outcome) {
            Ok(value) => Ok(Some(value)),
            Err(err) => {
                self.console.borrow_mut().show_failure(err)?;
                Ok(None)
            }
        }
    }

    fn say(&self, line: impl std::fmt::Display) -> anyhow::Result<()> {
        self.console.borrow_mut().say(line)
    }

    fn prompt(&self, label_key: &str) -> anyhow::Result<String> {
        self.console.borrow_mut().prompt(label_key)
    }

    /// Prompts for a value; a blank answer keeps `current`.
    fn prompt_or(&self, label_key: &str, current: &str) -> anyhow::Result<String> {
        let answer = self.prompt(label_key)?;
        Ok(if answer.trim().is_empty() {
            current.to_string()
        } else {
            answer
        })
    }

    fn success(
        &self,
        key: &str,
        name: &str,
        affected: Option<(&str, String)>,
    ) -> anyhow::Result<()> {
        let console = self.console.borrow();
        let mut message = console.message(key, &[MessageArg::text(name)]);
        if let Some((affected_key, names)) = affected.filter(|(_, names)| !names.is_empty()) {
            message.push(' ');
            message.push_str(&console.message(affected_key, &[MessageArg::text(names)]));
        }
        drop(console);
        self.say(message)
    }

    fn read_id(&self) -> anyhow::Result<Option<i64>> {
        let raw = {
            let mut console = self.console.borrow_mut();
            console.say("ID:")?;
            console.read_line()?
        };
        match raw.trim().parse::<i64>() {
            Ok(id) => Ok(Some(id)),
            Err(_) => {
                self.say(format!("Invalid ID '{}'", raw.trim()))?;
                Ok(None)
            }
        }
    }
}

pub fn build_router(session: &Session) -> Result<UiRouter<i64>, MenuError> {
    let mut menu = Menu::new("Main Menu");
    let root = menu.root();

    let roles_menu = menu.add(root, "Roles")?;
    menu.add(roles_menu, "List roles")?;
    menu.add(roles_menu, "Create role")?;
    let select_role = menu.add(roles_menu, "Select role")?;
    menu.add(select_role, "Update role")?;
    menu.add(select_role, "Delete role")?;

    let persons_menu = menu.add(root, "Persons")?;
    menu.add(persons_menu, "List persons")?;
    menu.add(persons_menu, "Create person")?;
    let select_person = menu.add(persons_menu, "Select person")?;
    menu.add(select_person, "Update person")?;
    menu.add(select_person, "Delete person")?;

    let users_menu = menu.add(root, "Users")?;
    menu.add(users_menu, "List users")?;
    menu.add(users_menu, "Create user")?;
    menu.add(users_menu, "Find user by username")?;
    let select_user = menu.add(users_menu, "Select user")?;
    menu.add(select_user, "Update user")?;
    menu.add(select_user, "Delete user")?;

    let reporter = session.clone();
    let mut router = UiRouter::new(menu).with_reporter(move |err| {
        tracing::error!(error = %err, "menu handler failed");
        if let Err(write_err) = reporter.say(format!("Unexpected error: {err}")) {
            tracing::warn!(error = %write_err, "failed to write error to console");
        }
    });
    register_roles(&mut router, session);
    register_persons(&mut router, session);
    register_users(&mut router, session);
    Ok(router)
}

fn describe_role(role: &RoleDto) -> String {
    let id = role.id.map(|id| id.to_string()).unwrap_or_default();
    match roles::person_names(role) {
        names if names.is_empty() => format!("{id}: {}", role.name),
        names => format!("{id}: {} [{names}]", role.name),
    }
}

fn describe_person(person: &PersonDto) -> String {
    let id = person.id.map(|id| id.to_string()).unwrap_or_default();
    let mut line = format!("{id}: {}", person.name);
    if let Some(birthday) = person.birthday {
        line.push_str(&format!(" ({birthday})"));
    }
    if person.employed {
        line.push_str(" employed");
    }
    let roles = persons::role_names(person);
    if !roles.is_empty() {
        line.push_str(&format!(" [{roles}]"));
    }
    line
}

fn describe_user(user: &UserDto) -> String {
    let id = user.id.map(|id| id.to_string()).unwrap_or_default();
    format!("{id}: {}", user.username)
}

fn register_roles(router: &mut UiRouter<i64>, session: &Session) {
    let s = session.clone();
    router.register("List roles", move |_| {
        if let Some(roles) = s.call(s.api.roles.list())? {
            for role in &roles {
                s.say(describe_role(role))?;
            }
        }
        Ok(None)
    });

    let s = session.clone();
    router.register("Create role", move |_| {
        let role = RoleDto {
            name: s.prompt("role.data.column.name")?,
            ..RoleDto::default()
        };
        if s.call(s.api.roles.create(role.clone()))?.is_some() {
            s.success("role.successMessage.create", &role.name, None)?;
        }
        Ok(None)
    });

    let s = session.clone();
    router.register("Select role", move |_| {
        let Some(id) = s.read_id()? else {
            return Ok(None);
        };
        let role = s.call(s.api.roles.get(RoleId(id)))?;
        Ok(match role {
            Some(role) => {
                s.say(describe_role(&role))?;
                Some(id)
            }
            None => None,
        })
    });

    let s = session.clone();
    router.register("Update role", move |selected| {
        let Some(id) = selected.copied() else {
            s.say("No role selected.")?;
            return Ok(None);
        };
        let Some(mut role) = s.call(s.api.roles.get(RoleId(id)))? else {
            return Ok(None);
        };
        role.name = s.prompt_or("role.data.column.name", &role.name)?;
        if let Some(updated) = s.call(s.api.roles.update(role))? {
            s.success(
                "role.successMessage.update",
                &updated.name,
                Some(("role.successMessage.affectedPersons", roles::person_names(&updated))),
            )?;
        }
        Ok(None)
    });

    let s = session.clone();
    router.register("Delete role", move |selected| {
        let Some(id) = selected.copied() else {
            s.say("No role selected.")?;
            return Ok(None);
        };
        if let Some(deleted) = s.call(s.api.roles.delete(RoleId(id)))? {
            s.success("role.successMessage.delete", &deleted.name, None)?;
        }
        Ok(None)
    });
}

fn prompt_person(s: &Session, mut person: PersonDto) -> anyhow::Result<Option<PersonDto>> {
    let name = &person.name;
    person.name = NameDto {
        title: s.prompt_or("person.data.column.title", &name.title)?,
        first_name: s.prompt_or("person.data.column.firstName", &name.first_name)?,
        middle_name: s.prompt_or("person.data.column.middleName", &name.middle_name)?,
        last_name: s.prompt_or("person.data.column.lastName", &name.last_name)?,
        suffix: s.prompt_or("person.data.column.suffix", &name.suffix)?,
    };

    let current = person.birthday.map(|date| date.to_string()).unwrap_or_default();
    let birthday = s.prompt_or("person.data.column.birthday", &current)?;
    person.birthday = match birthday.trim() {
        "" => None,
        raw => match NaiveDate::parse_from_str(raw, "%Y-%m-%d") {
            Ok(date) => Some(date),
            Err(_) => {
                let console = s.console.borrow();
                let message = console.message(
                    "validation.message.invalidDate",
                    &[MessageArg::localized("person.data.column.birthday")],
                );
                drop(console);
                s.say(message)?;
                return Ok(None);
            }
        },
    };

    s.say("Employed (y/n):")?;
    let employed = s.console.borrow_mut().read_line()?;
    match employed.trim() {
        "" => {}
        answer => person.employed = answer.eq_ignore_ascii_case("y"),
    }

    let current: Vec<String> = person.roles.iter().map(|role| role.id.to_string()).collect();
    let raw = s.prompt_or("person.data.column.roles", &current.join(","))?;
    let mut roles = Vec::new();
    for part in raw.split(',').map(str::trim).filter(|part| !part.is_empty()) {
        let Ok(id) = part.parse::<i64>() else {
            let console = s.console.borrow();
            let message = console.message(
                "validation.message.invalidNumber",
                &[MessageArg::localized("person.data.column.roles")],
            );
            drop(console);
            s.say(message)?;
            return Ok(None);
        };
        roles.push(RoleRef {
            id: RoleId(id),
            name: String::new(),
        });
    }
    person.roles = roles;
    Ok(Some(person))
}

fn register_persons(router: &mut UiRouter<i64>, session: &Session) {
    let s = session.clone();
    router.register("List persons", move |_| {
        if let Some(persons) = s.call(s.api.persons.list())? {
            for person in &persons {
                s.say(describe_person(person))?;
            }
        }
        Ok(None)
    });

    let s = session.clone();
    router.register("Create person", move |_| {
        let Some(person) = prompt_person(&s, PersonDto::default())? else {
            return Ok(None);
        };
        let name = person.name.to_string();
        if s.call(s.api.persons.create(person))?.is_some() {
            s.success("person.successMessage.create", &name, None)?;
        }
        Ok(None)
    });

    let s = session.clone();
    router.register("Select person", move |_| {
        let Some(id) = s.read_id()? else {
            return Ok(None);
        };
        let person = s.call(s.api.persons.get(PersonId(id)))?;
        Ok(match person {
            Some(person) => {
                s.say(describe_person(&person))?;
                Some(id)
            }
            None => None,
        })
    });

    let s = session.clone();
    router.register("Update person", move |selected| {
        let Some(id) = selected.copied() else {
            s.say("No person selected.")?;
            return Ok(None);
        };
        let Some(current) = s.call(s.api.persons.get(PersonId(id)))? else {
            return Ok(None);
        };
        let Some(person) = prompt_person(&s, current)? else {
            return Ok(None);
        };
        if let Some(updated) = s.call(s.api.persons.update(person))? {
            s.success(
                "person.successMessage.update",
                &updated.name.to_string(),
                Some(("person.successMessage.affectedRoles", persons::role_names(&updated))),
            )?;
        }
        Ok(None)
    });

    let s = session.clone();
    router.register("Delete person", move |selected| {
        let Some(id) = selected.copied() else {
            s.say("No person selected.")?;
            return Ok(None);
        };
        if let Some(deleted) = s.call(s.api.persons.delete(PersonId(id)))? {
            s.success(
                "person.successMessage.delete",
                &deleted.name.to_string(),
                Some(("person.successMessage.affectedRoles", persons::role_names(&deleted))),
            )?;
        }
        Ok(None)
    });
}

fn register_users(router: &mut UiRouter<i64>, session: &Session) {
    let s = session.clone();
    router.register("List users", move |_| {
        if let Some(users) = s.call(s.api.users.list())? {
            for user in &users {
                s.say(describe_user(user))?;
            }
        }
        Ok(None)
    });

    let s = session.clone();
    router.register("Create user", move |_| {
        let user = UserDto {
            id: None,
            username: s.prompt("user.data.column.username")?,
            password: s.prompt("user.data.column.password")?,
        };
        let username = user.username.clone();
        if s.call(s.api.users.create(user))?.is_some() {
            s.success("user.successMessage.create", &username, None)?;
        }
        Ok(None)
    });

    let s = session.clone();
    router.register("Find user by username", move |_| {
        let username = s.prompt("user.data.column.username")?;
        if let Some(user) = s.call(s.api.users.get_by_username(username.trim()))? {
            s.say(describe_user(&user))?;
        }
        Ok(None)
    });

    let s = session.clone();
    router.register("Select user", move |_| {
        let Some(id) = s.read_id()? else {
            return Ok(None);
        };
        let user = s.call(s.api.users.get(UserId(id)))?;
        Ok(match user {
            Some(user) => {
                s.say(describe_user(&user))?;
                Some(id)
            }
            None => None,
        })
    });

    let s = session.clone();
    router.register("Update user", move |selected| {
        let Some(id) = selected.copied() else {
            s.say("No user selected.")?;
            return Ok(None);
        };
        let Some(current) = s.call(s.api.users.get(UserId(id)))? else {
            return Ok(None);
        };
        // A blank password keeps the stored one.
        let user = UserDto {
            id: current.id,
            username: s.prompt_or("user.data.column.username", &current.username)?,
            password: s.prompt("user.data.column.password")?,
        };
        if let Some(updated) = s.call(s.api.users.update(user))? {
            s.success("user.successMessage.update", &updated.username, None)?;
        }
        Ok(None)
    });

    let s = session.clone();
    router.register("Delete user", move |selected| {
        let Some(id) = selected.copied() else {
            s.say("No user selected.")?;
            return Ok(None);
        };
        if let Some(deleted) = s.call(s.api.users.delete(UserId(id)))? {
            s.success("user.successMessage.delete", &deleted.username, None)?;
        }
        Ok(None)
    });
}
