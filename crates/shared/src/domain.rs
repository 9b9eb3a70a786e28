use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

macro_rules! id_newtype {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub i64);

        impl From<i64> for $name {
            fn from(value: i64) -> Self {
                Self(value)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

id_newtype!(RoleId);
id_newtype!(PersonId);
id_newtype!(UserId);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonRef {
    pub id: PersonId,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRef {
    pub id: RoleId,
    pub name: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDto {
    pub id: Option<RoleId>,
    pub name: String,
    #[serde(default)]
    pub persons: Vec<PersonRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NameDto {
    #[serde(default)]
    pub title: String,
    pub first_name: String,
    #[serde(default)]
    pub middle_name: String,
    pub last_name: String,
    #[serde(default)]
    pub suffix: String,
}

/// Parts are joined in reading order and blank parts are skipped, so
/// `Dr. Jose Rizal` rather than `Dr. Jose  Rizal `.
impl fmt::Display for NameDto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts = [
            self.title.as_str(),
            self.first_name.as_str(),
            self.middle_name.as_str(),
            self.last_name.as_str(),
            self.suffix.as_str(),
        ];
        let mut first = true;
        for part in parts.iter().map(|p| p.trim()).filter(|p| !p.is_empty()) {
            if !first {
                f.write_str(" ")?;
            }
            f.write_str(part)?;
            first = false;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersonDto {
    pub id: Option<PersonId>,
    pub name: NameDto,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub birthday: Option<NaiveDate>,
    #[serde(default)]
    pub employed: bool,
    #[serde(default)]
    pub roles: Vec<RoleRef>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserDto {
    pub id: Option<UserId>,
    pub username: String,
    // Holds the submitted plain text on the way in and the stored digest on
    // the way out; views never see it.
    #[serde(default, skip_serializing)]
    pub password: String,
}
