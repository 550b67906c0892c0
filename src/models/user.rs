//! User profile model.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::double_option;

/// A user profile document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: String,
    pub email: String,
    pub display_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default)]
    pub is_admin: bool,
    /// Internal version for optimistic concurrency control
    #[serde(default)]
    pub version: i64,
}

/// The identity asserted by the identity provider at sign-in.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthIdentity {
    pub uid: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub photo_url: Option<String>,
}

impl AuthIdentity {
    pub fn email_or_empty(&self) -> String {
        self.email.clone().unwrap_or_default()
    }

    /// Display name, else the e-mail local part, else "User".
    pub fn resolved_display_name(&self) -> String {
        if let Some(name) = self.display_name.as_deref().map(str::trim) {
            if !name.is_empty() {
                return name.to_string();
            }
        }
        self.email
            .as_deref()
            .and_then(|email| email.split('@').next())
            .filter(|local| !local.is_empty())
            .unwrap_or("User")
            .to_string()
    }

    /// Minimal profile used when the stored profile cannot be read or written.
    pub fn fallback_user(&self) -> User {
        User {
            id: self.uid.clone(),
            email: self.email_or_empty(),
            display_name: self.resolved_display_name(),
            photo_url: self.photo_url.clone(),
            created_at: Utc::now(),
            bio: None,
            is_admin: false,
            version: 0,
        }
    }
}

/// Request body for updating a profile.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRequest {
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default, deserialize_with = "double_option")]
    pub photo_url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub bio: Option<Option<String>>,
    /// Expected version for optimistic concurrency control
    #[serde(default)]
    pub expected_version: Option<i64>,
}

/// Request body for the admin flag endpoint.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdminStatusRequest {
    pub is_admin: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn identity(email: Option<&str>, name: Option<&str>) -> AuthIdentity {
        AuthIdentity {
            uid: "u1".to_string(),
            email: email.map(str::to_string),
            display_name: name.map(str::to_string),
            photo_url: None,
        }
    }

    #[test]
    fn display_name_fallbacks() {
        assert_eq!(
            identity(Some("ada@example.com"), Some("Ada")).resolved_display_name(),
            "Ada"
        );
        assert_eq!(
            identity(Some("ada@example.com"), Some("  ")).resolved_display_name(),
            "ada"
        );
        assert_eq!(identity(None, None).resolved_display_name(), "User");
    }

    #[test]
    fn fallback_user_is_never_admin() {
        let user = identity(Some("root@example.com"), None).fallback_user();
        assert!(!user.is_admin);
        assert_eq!(user.id, "u1");
        assert_eq!(user.email, "root@example.com");
        assert!(user.bio.is_none());
    }

    #[test]
    fn update_request_distinguishes_null_from_absent() {
        let req: UpdateUserRequest = serde_json::from_str(r#"{"bio": null}"#).unwrap();
        assert_eq!(req.bio, Some(None));
        assert_eq!(req.photo_url, None);
    }
}
