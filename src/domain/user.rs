use serde::{Deserialize, Serialize};

/// The authenticated caller of an operation. `is_admin` mirrors the admin
/// claim carried by the session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub is_admin: bool,
}

impl User {
    pub fn new(id: impl Into<String>, email: impl Into<String>, is_admin: bool) -> Self {
        Self {
            id: id.into(),
            email: email.into(),
            is_admin,
        }
    }
}
