use serde::{Deserialize, Serialize};

use crate::models::user::UserRole;

#[derive(Debug, Serialize, Deserialize, PartialEq, Eq, Clone)]
#[serde(rename_all = "lowercase")]
pub enum TokenUse {
    Access,
    Refresh,
}

/// Identity minted by the auth service. This backend only consumes it; it
/// never issues tokens itself.
#[derive(Debug, Serialize, Deserialize, PartialEq, Clone)]
pub struct Claims {
    pub id: String, // user UUID
    pub email: String,
    pub exp: usize, // expiration (as UNIX timestamp)
    pub role: Option<UserRole>,
    pub plan: Option<String>,
    pub iss: String,
    pub aud: String,
    pub token_use: TokenUse,
}
