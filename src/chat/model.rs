use crate::message::RequestKind;

/// Input state of the chat screen: the text box and the request modal.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Compose {
    pub text: String,
    pub modal_open: bool,
    pub request_kind: RequestKind,
    pub item: String,
    pub quantity: String,
}

/// User-visible alert raised by a chat action.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Notice {
    RequestSent,
    MissingFields,
    SignedOut,
    RequestFailed(String),
    AcceptFailed(String),
}

impl Notice {
    pub fn title(&self) -> &'static str {
        match self {
            Self::RequestSent => "Request Sent",
            Self::MissingFields | Self::SignedOut => "Error",
            Self::RequestFailed(_) => "Request Failed",
            Self::AcceptFailed(_) => "Accept Failed",
        }
    }

    pub fn body(&self) -> String {
        match self {
            Self::RequestSent => "Your request has been sent successfully.".into(),
            Self::MissingFields => "Please fill in all the fields.".into(),
            Self::SignedOut => "Please sign in first.".into(),
            Self::RequestFailed(reason) | Self::AcceptFailed(reason) => reason.clone(),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AcceptOutcome {
    Accepted,
    AlreadyAccepted,
    NotFound,
    /// Target is a plain text message.
    NotRequest,
    SignedOut,
}
