use serde::{Deserialize, Serialize};

use crate::messages::Locale;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormMode {
    Create,
    Edit,
}

impl FormMode {
    pub fn action(self) -> &'static str {
        match self {
            FormMode::Create => "/create",
            FormMode::Edit => "/update",
        }
    }

    pub fn header_suffix(self) -> &'static str {
        match self {
            FormMode::Create => "headerTitle.create",
            FormMode::Edit => "headerTitle.update",
        }
    }
}

/// Everything the list page of one resource renders: the form (`command`),
/// the table (`data`) and the one-time messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListView<D> {
    pub header_title: String,
    pub mode: FormMode,
    pub action: String,
    pub command: D,
    pub data: Vec<D>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_messages: Vec<String>,
    pub locale: Locale,
}

/// The sign-in page. `username` echoes the last attempt; the password is
/// never sent back.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoginView {
    pub header_title: String,
    pub action: String,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub success_message: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub error_messages: Vec<String>,
    pub locale: Locale,
}
