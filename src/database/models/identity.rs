use serde::Serialize;
use sqlx::FromRow;

/// A registered user. `username` is unique across live rows.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct Identity {
    pub id: i32,
    pub username: String,
    #[serde(skip_serializing)]
    #[sqlx(rename = "password")]
    pub password_hash: String,
    pub is_admin: bool,
}

/// A validated change to one identity column.
///
/// Passwords arrive here already hashed; nothing in the store sees plain text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IdentityChange {
    Username(String),
    PasswordHash(String),
}

impl IdentityChange {
    pub fn column(&self) -> &'static str {
        match self {
            IdentityChange::Username(_) => "username",
            IdentityChange::PasswordHash(_) => "password",
        }
    }

    pub fn value(&self) -> &str {
        match self {
            IdentityChange::Username(v) | IdentityChange::PasswordHash(v) => v,
        }
    }

    /// Parameterized update for this change: `$1` is the new value, `$2` the identity id.
    pub fn statement(&self) -> &'static str {
        match self {
            IdentityChange::Username(_) => {
                "UPDATE users SET username = $1 WHERE id = $2 \
                 RETURNING id, username, password, is_admin"
            }
            IdentityChange::PasswordHash(_) => {
                "UPDATE users SET password = $1 WHERE id = $2 \
                 RETURNING id, username, password, is_admin"
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn serialized_identity_omits_password_hash() {
        let identity = Identity {
            id: 3,
            username: "a@b.com".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            is_admin: true,
        };
        let value = serde_json::to_value(&identity).unwrap();
        assert_eq!(value["id"], 3);
        assert_eq!(value["is_admin"], true);
        assert!(value.get("password_hash").is_none());
        assert!(!value.to_string().contains("argon2id"));
    }

    #[test]
    fn each_change_binds_only_its_own_column() {
        let change = IdentityChange::Username("new@b.com".to_string());
        assert!(change.statement().contains("SET username = $1"));
        assert_eq!(change.value(), "new@b.com");

        let change = IdentityChange::PasswordHash("hash".to_string());
        assert!(change.statement().contains("SET password = $1"));
        assert_eq!(change.column(), "password");
    }
}
