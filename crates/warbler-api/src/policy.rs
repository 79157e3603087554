//! Who is acting on a request, and whether they may.

use crate::error::ApiError;

/// Resolved once per request from its session token and passed explicitly
/// into every operation that needs it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Identity {
    #[default]
    Anonymous,
    Authenticated(i64),
}

impl Identity {
    pub fn user_id(self) -> Option<i64> {
        match self {
            Identity::Anonymous => None,
            Identity::Authenticated(id) => Some(id),
        }
    }

    pub fn is_authenticated(self) -> bool {
        matches!(self, Identity::Authenticated(_))
    }

    /// The acting user's id, or `Unauthorized` for anonymous callers.
    pub fn require(self) -> Result<i64, ApiError> {
        self.user_id().ok_or(ApiError::Unauthorized)
    }

    /// Like [`Identity::require`], and the caller must also be `owner_id`.
    pub fn require_owner(self, owner_id: i64) -> Result<i64, ApiError> {
        match self.require()? {
            id if id == owner_id => Ok(id),
            _ => Err(ApiError::Unauthorized),
        }
    }
}

impl From<Option<i64>> for Identity {
    fn from(user_id: Option<i64>) -> Self {
        user_id.map_or(Identity::Anonymous, Identity::Authenticated)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn anonymous_is_rejected() {
        assert!(matches!(Identity::Anonymous.require(), Err(ApiError::Unauthorized)));
        assert!(matches!(
            Identity::Anonymous.require_owner(1),
            Err(ApiError::Unauthorized)
        ));
    }

    #[test]
    fn only_the_owner_passes_ownership_check() {
        let me = Identity::Authenticated(1);

        assert_eq!(me.require().unwrap(), 1);
        assert_eq!(me.require_owner(1).unwrap(), 1);
        assert!(matches!(me.require_owner(2), Err(ApiError::Unauthorized)));
    }

    #[test]
    fn converts_from_optional_user_id() {
        assert_eq!(Identity::from(None), Identity::Anonymous);
        assert_eq!(Identity::from(Some(5)), Identity::Authenticated(5));
        assert!(!Identity::default().is_authenticated());
    }
}
