//! Core protocol types: the records the backend sends about the
//! authenticated principal.
//!
//! The session core treats most of these fields as opaque. The only field
//! it interprets is [`UserSession::role`], which drives the
//! identity-preservation rule and the role helpers.

use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

/// Extension fields the core passes through untouched (`tenantId`,
/// `branchCode`, `needsBranchMapping`, ...).
pub type Extra = serde_json::Map<String, serde_json::Value>;

// ---------------------------------------------------------------------------
// Identity types
// ---------------------------------------------------------------------------

/// Identifier of a user account.
///
/// The backend sends numeric ids (`"id": 42`) while social-login and test
/// fixtures use strings; both decode to the same string form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct UserId(pub String);

impl<'de> Deserialize<'de> for UserId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum Raw {
            Number(i64),
            Text(String),
        }

        Ok(match Raw::deserialize(deserializer)? {
            Raw::Number(n) => UserId(n.to_string()),
            Raw::Text(s) => UserId(s),
        })
    }
}

impl From<&str> for UserId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<i32> for UserId {
    fn from(value: i32) -> Self {
        Self(value.to_string())
    }
}

impl From<i64> for UserId {
    fn from(value: i64) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "U-{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Role
// ---------------------------------------------------------------------------

/// The platform role of a principal.
///
/// Only three roles get dedicated helpers; every other backend role string
/// (branch admins, headquarters staff, ...) is kept verbatim in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Consultant,
    Client,
    Other(String),
}

impl Role {
    /// Parses a backend role string. Matching is exact (`"ADMIN"`), as the
    /// backend always sends upper-case enum names.
    pub fn parse(value: &str) -> Self {
        match value {
            "ADMIN" => Self::Admin,
            "CONSULTANT" => Self::Consultant,
            "CLIENT" => Self::Client,
            other => Self::Other(other.to_string()),
        }
    }

    /// The wire form of this role.
    pub fn as_str(&self) -> &str {
        match self {
            Self::Admin => "ADMIN",
            Self::Consultant => "CONSULTANT",
            Self::Client => "CLIENT",
            Self::Other(s) => s,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// UserSession
// ---------------------------------------------------------------------------

/// The authenticated principal as described by `/api/auth/current-user`.
///
/// A value object: the core never mutates one in place except through the
/// merge performed by the session cache.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSession {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<UserId>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nickname: Option<String>,

    /// Raw role string. `None` and `Some("")` both mean "no role".
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,

    #[serde(default, alias = "profileImageUrl", skip_serializing_if = "Option::is_none")]
    pub profile_image: Option<String>,

    #[serde(default, alias = "socialProvider", skip_serializing_if = "Option::is_none")]
    pub provider: Option<String>,

    /// Platform-specific extension fields, kept verbatim.
    #[serde(flatten)]
    pub extra: Extra,
}

impl UserSession {
    /// Creates a user with only an id. Handy for tests and optimistic
    /// logins; chain the `with_*` methods for the rest.
    pub fn new(id: impl Into<UserId>) -> Self {
        Self {
            id: Some(id.into()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_email(mut self, email: impl Into<String>) -> Self {
        self.email = Some(email.into());
        self
    }

    #[must_use]
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    #[must_use]
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = Some(role.into());
        self
    }

    /// The role, if one is set and non-empty.
    pub fn role(&self) -> Option<Role> {
        self.role_str().map(Role::parse)
    }

    /// The raw role string, if one is set and non-empty.
    pub fn role_str(&self) -> Option<&str> {
        self.role.as_deref().filter(|r| !r.is_empty())
    }

    /// `true` if the principal carries a non-empty role.
    pub fn has_role_value(&self) -> bool {
        self.role_str().is_some()
    }

    /// `true` if the record names a principal at all (an id or an email).
    ///
    /// A body that decodes but identifies nobody is treated as malformed.
    pub fn is_identified(&self) -> bool {
        self.id.is_some() || self.email.as_deref().is_some_and(|e| !e.is_empty())
    }
}

// ---------------------------------------------------------------------------
// SessionInfo / tokens
// ---------------------------------------------------------------------------

/// Secondary, best-effort metadata from `/api/auth/session-info`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default)]
    pub is_authenticated: bool,

    #[serde(flatten)]
    pub extra: Extra,
}

/// Credentials handed to `set_user` by a login flow.
///
/// Cookie-based logins carry only `session_id`; token-based ones carry the
/// access/refresh pair.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionTokens {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl SessionTokens {
    /// `true` if no token field is set.
    pub fn is_empty(&self) -> bool {
        self.access_token.is_none() && self.refresh_token.is_none() && self.session_id.is_none()
    }
}

// ---------------------------------------------------------------------------
// Login
// ---------------------------------------------------------------------------

/// Body of `POST /api/auth/login` and `/api/auth/confirm-duplicate-login`.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

impl LoginRequest {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }
}

// Manual Debug: never print the password.
impl fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LoginRequest")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// The `data` part of a login answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginData {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<UserSession>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,

    /// Set when the account is already logged in elsewhere and the backend
    /// wants the user to confirm terminating that session.
    #[serde(default)]
    pub requires_confirmation: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// A decoded login answer, envelope flattened away.
#[derive(Debug, Clone, PartialEq)]
pub struct LoginResponse {
    pub success: bool,
    pub message: Option<String>,
    pub data: LoginData,
}

impl LoginResponse {
    /// Flattens an envelope into a response. A bare body counts as a
    /// success when it carries a user.
    pub fn from_envelope(envelope: ApiEnvelope<LoginData>) -> Self {
        match envelope {
            ApiEnvelope::Wrapped {
                success,
                message,
                data,
            } => {
                let data = data.unwrap_or_default();
                let message = message.or_else(|| data.message.clone());
                Self {
                    success,
                    message,
                    data,
                }
            }
            ApiEnvelope::Bare(data) => Self {
                success: data.user.is_some(),
                message: data.message.clone(),
                data,
            },
        }
    }

    /// Tokens to persist alongside the user.
    pub fn tokens(&self) -> SessionTokens {
        SessionTokens {
            access_token: self.data.access_token.clone(),
            refresh_token: self.data.refresh_token.clone(),
            session_id: self.data.session_id.clone(),
        }
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// The backend's response wrapper.
///
/// `#[serde(untagged)]` tries each variant in order: a body with a
/// `success` field is `Wrapped`, anything else is taken as the bare value.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ApiEnvelope<T> {
    Wrapped {
        success: bool,
        #[serde(default)]
        message: Option<String>,
        #[serde(default = "none")]
        data: Option<T>,
    },
    Bare(T),
}

fn none<T>() -> Option<T> {
    None
}

impl<T> ApiEnvelope<T> {
    /// Extracts the payload.
    ///
    /// # Errors
    /// - [`ProtocolError::Rejected`](crate::ProtocolError::Rejected) for `success: false`
    /// - [`ProtocolError::InvalidMessage`](crate::ProtocolError::InvalidMessage)
    ///   for a success without `data`
    pub fn into_data(self) -> Result<T, crate::ProtocolError> {
        match self {
            Self::Wrapped {
                success: true,
                data: Some(data),
                ..
            } => Ok(data),
            Self::Wrapped {
                success: true,
                data: None,
                ..
            } => Err(crate::ProtocolError::InvalidMessage(
                "successful envelope without data".into(),
            )),
            Self::Wrapped {
                success: false,
                message,
                ..
            } => Err(crate::ProtocolError::Rejected(message)),
            Self::Bare(data) => Ok(data),
        }
    }
}
