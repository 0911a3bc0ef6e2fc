use serde::{Deserialize, Serialize};

/// Role carried in the identity token. User records live in the auth
/// service; this backend only distinguishes admins for plan management.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    User,
    Admin,
}
