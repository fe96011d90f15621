use std::fmt::Display;
use std::sync::Arc;

use email_address::EmailAddress;
use log::info;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;

pub type Result<T> = std::result::Result<T, Error>;
pub type Provider = Arc<dyn IdentityProvider + Send + Sync>;

/// Stable identifier of an authenticated principal.
#[derive(Clone, Debug, Deserialize, Serialize, Hash, PartialEq, Eq, PartialOrd, Ord)]
#[serde(transparent)]
pub struct Uid(String);

impl Uid {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Uid {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for Uid {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize, Hash, PartialEq, Eq)]
#[serde(transparent)]
pub struct Email(String);

impl Email {
    pub fn parse(s: impl Into<String>) -> Result<Self> {
        let s = s.into();
        if !EmailAddress::is_valid(&s) {
            return Err(Error::InvalidEmail(s));
        }
        Ok(Self(s))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Display for Email {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Principal {
    uid: Uid,
    email: Email,
}

impl Principal {
    pub fn new(uid: impl Into<String>, email: impl Into<String>) -> Result<Self> {
        let uid = uid.into();
        if uid.trim().is_empty() {
            return Err(Error::EmptyUid);
        }

        Ok(Self {
            uid: Uid(uid),
            email: Email::parse(email)?,
        })
    }

    pub const fn uid(&self) -> &Uid {
        &self.uid
    }

    pub const fn email(&self) -> &Email {
        &self.email
    }
}

pub trait IdentityProvider {
    /// Currently authenticated principal, if any.
    fn current(&self) -> Option<Principal>;

    /// Push channel of auth state changes. The receiver starts at the
    /// current state.
    fn subscribe(&self) -> watch::Receiver<Option<Principal>>;
}

/// Identity provider whose state is driven by explicit sign-in/sign-out
/// events.
#[derive(Clone)]
pub struct Session {
    state: Arc<watch::Sender<Option<Principal>>>,
}

impl Default for Session {
    fn default() -> Self {
        Self::new()
    }
}

impl Session {
    pub fn new() -> Self {
        let (tx, _) = watch::channel(None);
        Self {
            state: Arc::new(tx),
        }
    }

    pub fn signed_in(principal: Principal) -> Self {
        let session = Self::new();
        session.sign_in(principal);
        session
    }

    pub fn sign_in(&self, principal: Principal) {
        info!("signed in as {}", principal.email());
        self.state.send_replace(Some(principal));
    }

    pub fn sign_out(&self) {
        if let Some(p) = self.state.send_replace(None) {
            info!("signed out {}", p.email());
        }
    }
}

impl IdentityProvider for Session {
    fn current(&self) -> Option<Principal> {
        self.state.borrow().clone()
    }

    fn subscribe(&self) -> watch::Receiver<Option<Principal>> {
        self.state.subscribe()
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("principal uid is empty")]
    EmptyUid,
    #[error("invalid email: {0}")]
    InvalidEmail(String),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_reject_invalid_email() {
        let res = Principal::new("u1", "not-an-email");

        assert!(matches!(res, Err(Error::InvalidEmail(_))));
    }

    #[test]
    fn should_reject_blank_uid() {
        let res = Principal::new("  ", "a@x.com");

        assert!(matches!(res, Err(Error::EmptyUid)));
    }

    #[tokio::test]
    async fn should_push_auth_state_changes() {
        let session = Session::new();
        let mut rx = session.subscribe();
        assert!(rx.borrow().is_none());

        let jora = Principal::new("jora-uid", "jora@x.com").unwrap();
        session.sign_in(jora.clone());
        rx.changed().await.unwrap();
        assert_eq!(rx.borrow().as_ref(), Some(&jora));
        assert_eq!(session.current(), Some(jora));

        session.sign_out();
        rx.changed().await.unwrap();
        assert!(rx.borrow().is_none());
        assert!(session.current().is_none());
    }
}
