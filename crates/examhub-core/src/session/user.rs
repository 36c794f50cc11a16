use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// Platform role of a user.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Student,
    Educator,
    Admin,
}

impl std::str::FromStr for Role {
    type Err = MalformedUser;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "student" => Ok(Role::Student),
            "educator" => Ok(Role::Educator),
            "admin" => Ok(Role::Admin),
            other => Err(MalformedUser::UnknownRole(other.to_owned())),
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let value = match self {
            Role::Student => "student",
            Role::Educator => "educator",
            Role::Admin => "admin",
        };
        write!(f, "{value}")
    }
}

/// Canonical user shape kept in the session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: String,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub role: Role,
    pub institution_id: Option<String>,
    pub department_id: Option<String>,
    pub is_active: bool,
    pub created_at: Option<DateTime<Utc>>,
    pub avatar_url: Option<String>,
}

impl UserRecord {
    pub fn full_name(&self) -> String {
        format!("{} {}", self.first_name, self.last_name)
            .trim()
            .to_owned()
    }
}

/// User payload as the backend sends it, before normalization.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawUser {
    pub id: Option<String>,
    #[serde(rename = "_id")]
    pub object_id: Option<String>,
    pub email: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub role: Option<String>,
    pub institution_id: Option<Value>,
    pub department_id: Option<Value>,
    pub is_active: Option<bool>,
    pub created_at: Option<String>,
    pub avatar_url: Option<String>,
}

/// Reasons a backend user payload cannot become a [`UserRecord`].
#[derive(Debug, Error, PartialEq, Eq)]
pub enum MalformedUser {
    #[error("user payload has no identifier")]
    MissingId,
    #[error("user payload has no role")]
    MissingRole,
    #[error("unknown user role '{0}'")]
    UnknownRole(String),
}

impl TryFrom<RawUser> for UserRecord {
    type Error = MalformedUser;

    fn try_from(raw: RawUser) -> Result<Self, Self::Error> {
        let id = raw
            .id
            .or(raw.object_id)
            .filter(|id| !id.is_empty())
            .ok_or(MalformedUser::MissingId)?;
        let role = raw.role.ok_or(MalformedUser::MissingRole)?.parse::<Role>()?;
        let created_at = raw
            .created_at
            .as_deref()
            .and_then(|ts| DateTime::parse_from_rfc3339(ts).ok())
            .map(|ts| ts.with_timezone(&Utc));

        Ok(UserRecord {
            id,
            email: raw.email.unwrap_or_default(),
            first_name: raw.first_name.unwrap_or_default(),
            last_name: raw.last_name.unwrap_or_default(),
            role,
            institution_id: raw.institution_id.as_ref().and_then(reference_id),
            department_id: raw.department_id.as_ref().and_then(reference_id),
            is_active: raw.is_active.unwrap_or(true),
            created_at,
            avatar_url: raw.avatar_url.filter(|url| !url.is_empty()),
        })
    }
}

// References arrive either as a bare id or as a populated document.
fn reference_id(value: &Value) -> Option<String> {
    match value {
        Value::String(id) if !id.is_empty() => Some(id.clone()),
        Value::Object(doc) => ["id", "_id"]
            .iter()
            .find_map(|key| doc.get(*key).and_then(Value::as_str))
            .map(str::to_owned),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn raw(value: Value) -> RawUser {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn accepts_object_id_field() {
        let user = UserRecord::try_from(raw(json!({
            "_id": "u1",
            "email": "a@b.com",
            "firstName": "A",
            "lastName": "B",
            "role": "student"
        })))
        .unwrap();
        assert_eq!(user.id, "u1");
        assert_eq!(user.role, Role::Student);
        assert!(user.is_active);
        assert_eq!(user.full_name(), "A B");
    }

    #[test]
    fn plain_id_wins_over_object_id() {
        let user = UserRecord::try_from(raw(json!({
            "id": "canonical",
            "_id": "legacy",
            "role": "Educator"
        })))
        .unwrap();
        assert_eq!(user.id, "canonical");
        assert_eq!(user.role, Role::Educator);
    }

    #[test]
    fn populated_references_are_flattened() {
        let user = UserRecord::try_from(raw(json!({
            "id": "u2",
            "role": "admin",
            "institutionId": { "_id": "inst-1", "name": "Tech University" },
            "departmentId": "dep-9",
            "isActive": false,
            "createdAt": "2024-09-01T08:30:00.000Z"
        })))
        .unwrap();
        assert_eq!(user.institution_id.as_deref(), Some("inst-1"));
        assert_eq!(user.department_id.as_deref(), Some("dep-9"));
        assert!(!user.is_active);
        assert!(user.created_at.is_some());
    }

    #[test]
    fn null_name_fields_read_as_empty() {
        let user = UserRecord::try_from(raw(json!({
            "_id": "u4",
            "email": "n@b.com",
            "firstName": "Nadia",
            "lastName": null,
            "avatarUrl": null,
            "role": "student"
        })))
        .unwrap();
        assert_eq!(user.last_name, "");
        assert_eq!(user.full_name(), "Nadia");
        assert!(user.avatar_url.is_none());
    }

    #[test]
    fn rejects_missing_id_and_unknown_role() {
        assert_eq!(
            UserRecord::try_from(raw(json!({ "role": "student" }))).unwrap_err(),
            MalformedUser::MissingId
        );
        assert_eq!(
            UserRecord::try_from(raw(json!({ "id": "u3", "role": "janitor" }))).unwrap_err(),
            MalformedUser::UnknownRole("janitor".into())
        );
    }
}
