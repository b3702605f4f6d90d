use serde::{Deserialize, Serialize};

use crate::utils::ids::{deserialize_id, deserialize_optional_id};

/// Cached copy of the backend's user record.
#[derive(Serialize, Deserialize, Debug, Clone, Default, PartialEq, Eq)]
pub struct CurrentUser {
    #[serde(deserialize_with = "deserialize_id")]
    pub id: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
    #[serde(
        default,
        alias = "tenantId",
        deserialize_with = "deserialize_optional_id"
    )]
    pub tenant_id: Option<String>,
    #[serde(default)]
    pub roles: Vec<String>,
    #[serde(default, alias = "firstName", skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, alias = "lastName", skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, alias = "isStaff")]
    pub is_staff: bool,
    #[serde(default, alias = "isSuperuser")]
    pub is_superuser: bool,
}

impl CurrentUser {
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r.eq_ignore_ascii_case(role))
    }
}
