//! The caller's identity, resolved once and passed explicitly to whatever
//! needs it.

use herbsight_shared::SessionUser;

#[derive(Clone, Default)]
pub struct SessionContext {
    auth: Option<(String, SessionUser)>,
}

impl SessionContext {
    pub fn anonymous() -> Self {
        Self { auth: None }
    }

    pub fn authenticated(token: impl Into<String>, user: SessionUser) -> Self {
        Self {
            auth: Some((token.into(), user)),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    pub fn is_admin(&self) -> bool {
        self.user().is_some_and(SessionUser::is_admin)
    }

    pub fn user(&self) -> Option<&SessionUser> {
        self.auth.as_ref().map(|(_, user)| user)
    }

    pub fn token(&self) -> Option<&str> {
        self.auth.as_ref().map(|(token, _)| token.as_str())
    }
}

impl std::fmt::Debug for SessionContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionContext")
            .field("user", &self.user())
            .finish()
    }
}
