use crate::auth::Principal;

use super::Kind;
use super::model::Message;

/// How a feed entry is presented to the current principal. Derived from
/// stored state only.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Presentation {
    /// Text written by the current principal.
    Own,
    /// Text written by someone else; shown with sender name and avatar.
    Peer,
    /// Request the current principal has accepted, or their own request
    /// someone else has accepted.
    Accepted,
    /// Request still open for the current principal; shows the accept control.
    Pending,
}

impl Presentation {
    pub const fn label(&self) -> Option<&'static str> {
        match self {
            Self::Accepted => Some("Request Accepted"),
            Self::Pending => Some("Accept"),
            Self::Own | Self::Peer => None,
        }
    }

    pub const fn can_accept(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

pub fn classify(msg: &Message, me: Option<&Principal>) -> Presentation {
    match (msg.kind(), me) {
        (Kind::Text, Some(me)) if msg.sender() == me.email().as_str() => Presentation::Own,
        (Kind::Text, _) => Presentation::Peer,
        (Kind::Request { accepted_by }, Some(me)) if accepted_by.contains(me.uid()) => {
            Presentation::Accepted
        }
        // the author sees their request as accepted once anyone took it
        (Kind::Request { accepted_by }, Some(me))
            if !accepted_by.is_empty() && msg.sender() == me.email().as_str() =>
        {
            Presentation::Accepted
        }
        (Kind::Request { .. }, _) => Presentation::Pending,
    }
}
