//! Who a credit account belongs to.

use std::fmt;

/// Prefix shared by every credit record key.
const KEY_PREFIX: &str = "monospace_credits_";

/// The owner of a credit account.
///
/// Signed-in users are keyed by the identity provider's stable user id;
/// everyone else shares the guest account.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub enum Identity {
    /// A user id supplied by the identity provider.
    Authenticated(String),
    /// No signed-in user.
    #[default]
    Guest,
}

impl Identity {
    /// Creates an authenticated identity. A blank id maps to [`Identity::Guest`].
    pub fn user(id: impl Into<String>) -> Self {
        let id = id.into();
        if id.trim().is_empty() {
            Self::Guest
        } else {
            Self::Authenticated(id)
        }
    }

    /// Resolves an optional user id. Missing or blank ids map to [`Identity::Guest`].
    pub fn from_optional(id: Option<&str>) -> Self {
        match id {
            Some(id) => Self::user(id),
            None => Self::Guest,
        }
    }

    /// Returns true for the guest identity.
    pub fn is_guest(&self) -> bool {
        matches!(self, Self::Guest)
    }

    /// Key under which this identity's account is persisted.
    pub fn storage_key(&self) -> String {
        match self {
            Self::Authenticated(id) => format!("{KEY_PREFIX}{id}"),
            Self::Guest => format!("{KEY_PREFIX}guest"),
        }
    }
}

impl From<Option<String>> for Identity {
    fn from(id: Option<String>) -> Self {
        Self::from_optional(id.as_deref())
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Authenticated(id) => write!(f, "user {id}"),
            Self::Guest => write!(f, "guest"),
        }
    }
}
