//! Account identity as returned by `GET /auth/me`.

use serde::{Deserialize, Serialize};

use super::{AccountId, Role, UserId};

/// The signed-in account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Opaque backend account id. Older backends do not return it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<AccountId>,
    /// Numeric patient-facing identifier; doctors type this when uploading.
    pub user_id: UserId,
    pub name: String,
    pub email: String,
    pub role: Role,
}

impl User {
    /// Whether this account holds `role`.
    #[must_use]
    pub fn is(&self, role: Role) -> bool {
        self.role == role
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_deserializes_me_payload() {
        let json = r#"{
            "id": "4c1e9f0a-0000-4000-8000-000000000001",
            "user_id": 123,
            "name": "Asha",
            "email": "asha@example.com",
            "role": "patient"
        }"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert_eq!(user.user_id, UserId::new(123));
        assert!(user.is(Role::Patient));
        assert!(user.id.is_some());
    }

    #[test]
    fn test_account_id_is_optional() {
        let json = r#"{"user_id": 9, "name": "Ravi", "email": "r@x.io", "role": "doctor"}"#;
        let user: User = serde_json::from_str(json).unwrap();
        assert!(user.id.is_none());
        assert_eq!(user.role, Role::Doctor);
    }
}
