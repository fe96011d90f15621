use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::auth::{self, Principal};
use crate::profile::model::Profile;
use crate::store::{self, Document};

use super::{Id, Kind, RequestKind, Type};

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Message {
    id: Id,
    text: String,
    sender: String,
    sender_name: Option<String>,
    sender_profile_pic: Option<String>,
    group_id: String,
    timestamp: i64,
    kind: Kind,
}

impl Message {
    pub const fn id(&self) -> &Id {
        &self.id
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// Email of the author.
    pub fn sender(&self) -> &str {
        &self.sender
    }

    pub fn sender_name(&self) -> Option<&str> {
        self.sender_name.as_deref()
    }

    pub fn sender_profile_pic(&self) -> Option<&str> {
        self.sender_profile_pic.as_deref()
    }

    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Milliseconds since the epoch, assigned by the sender.
    pub const fn timestamp(&self) -> i64 {
        self.timestamp
    }

    pub const fn kind(&self) -> &Kind {
        &self.kind
    }

    pub fn is_request(&self) -> bool {
        self.kind.r#type() == Type::Request
    }

    pub fn is_accepted_by(&self, uid: &auth::Uid) -> bool {
        match &self.kind {
            Kind::Request { accepted_by } => accepted_by.contains(uid),
            Kind::Text => false,
        }
    }

    pub fn accepted_by(&self) -> &[auth::Uid] {
        match &self.kind {
            Kind::Request { accepted_by } => accepted_by,
            Kind::Text => &[],
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredMessage {
    text: String,
    sender: String,
    #[serde(default)]
    sender_name: Option<String>,
    #[serde(default)]
    sender_profile_pic: Option<String>,
    #[serde(default)]
    group_id: String,
    timestamp: i64,
    // older records carry no type
    #[serde(rename = "type", default)]
    r#type: Type,
    #[serde(default)]
    accepted_by: Option<Vec<auth::Uid>>,
}

impl TryFrom<Document> for Message {
    type Error = serde_json::Error;

    fn try_from(doc: Document) -> Result<Self, Self::Error> {
        let (id, fields) = doc.into_parts();
        let m: StoredMessage = serde_json::from_value(Value::Object(fields))?;

        let kind = match m.r#type {
            Type::Text => Kind::Text,
            Type::Request => {
                let mut accepted_by = Vec::new();
                for uid in m.accepted_by.unwrap_or_default() {
                    if !accepted_by.contains(&uid) {
                        accepted_by.push(uid);
                    }
                }
                Kind::Request { accepted_by }
            }
        };

        Ok(Self {
            id,
            text: m.text,
            sender: m.sender,
            sender_name: m.sender_name,
            sender_profile_pic: m.sender_profile_pic,
            group_id: m.group_id,
            timestamp: m.timestamp,
            kind,
        })
    }
}

/// Outgoing message with the author's profile denormalised into it.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct NewMessage {
    text: String,
    sender: auth::Email,
    #[serde(skip_serializing_if = "Option::is_none")]
    sender_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    sender_profile_pic: Option<String>,
    group_id: String,
    timestamp: i64,
    #[serde(rename = "type")]
    r#type: Type,
    #[serde(skip_serializing_if = "Option::is_none")]
    accepted_by: Option<Vec<auth::Uid>>,
}

impl NewMessage {
    pub fn text(
        group_id: &str,
        sender: &Principal,
        profile: &Profile,
        text: &str,
    ) -> super::Result<Self> {
        if text.trim().is_empty() {
            return Err(super::Error::EmptyText);
        }

        Ok(Self::new(group_id, sender, profile, text.to_string(), Type::Text))
    }

    pub fn request(
        group_id: &str,
        sender: &Principal,
        profile: &Profile,
        kind: RequestKind,
        item: &str,
        quantity: &str,
    ) -> super::Result<Self> {
        let (item, quantity) = (item.trim(), quantity.trim());
        if item.is_empty() || quantity.is_empty() {
            return Err(super::Error::MissingFields);
        }

        let text = format!("{kind}: {item}, Quantity: {quantity}");
        let mut msg = Self::new(group_id, sender, profile, text, Type::Request);
        msg.accepted_by = Some(Vec::new());
        Ok(msg)
    }

    fn new(group_id: &str, sender: &Principal, profile: &Profile, text: String, r#type: Type) -> Self {
        Self {
            text,
            sender: sender.email().clone(),
            sender_name: profile.name.clone(),
            sender_profile_pic: profile.image_url.clone(),
            group_id: group_id.to_string(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            r#type,
            accepted_by: None,
        }
    }

    pub fn as_text(&self) -> &str {
        &self.text
    }

    pub fn to_fields(&self) -> super::Result<store::Fields> {
        match serde_json::to_value(self)? {
            Value::Object(fields) => Ok(fields),
            _ => Ok(store::Fields::new()),
        }
    }
}

#[cfg(test)]
mod test {
    use serde_json::json;

    use crate::message;

    use super::*;

    fn doc(v: Value) -> Document {
        match v {
            Value::Object(m) => Document::new(Id::from("m1"), m),
            _ => panic!("expected object"),
        }
    }

    fn jora() -> Principal {
        Principal::new("jora-uid", "jora@x.com").unwrap()
    }

    #[test]
    fn should_default_missing_type_to_text() {
        let untyped = doc(json!({ "text": "hi", "sender": "a@x.com", "timestamp": 1 }));
        let typed = doc(json!({ "text": "hi", "sender": "a@x.com", "timestamp": 1, "type": "text" }));

        let untyped = Message::try_from(untyped).unwrap();
        let typed = Message::try_from(typed).unwrap();

        assert_eq!(untyped.kind(), &Kind::Text);
        assert_eq!(untyped, typed);
    }

    #[test]
    fn should_drop_accepted_by_on_text() {
        let m = doc(json!({
            "text": "hi", "sender": "a@x.com", "timestamp": 1, "acceptedBy": ["u1"]
        }));

        let m = Message::try_from(m).unwrap();

        assert_eq!(m.kind(), &Kind::Text);
        assert!(m.accepted_by().is_empty());
    }

    #[test]
    fn should_collapse_duplicate_acceptors() {
        let m = doc(json!({
            "text": "REQUEST: rice, Quantity: 2",
            "sender": "a@x.com",
            "timestamp": 1,
            "type": "request",
            "acceptedBy": ["u1", "u2", "u1"]
        }));

        let m = Message::try_from(m).unwrap();

        assert_eq!(
            m.accepted_by(),
            &[auth::Uid::from("u1"), auth::Uid::from("u2")]
        );
    }

    #[test]
    fn should_map_request_without_acceptors() {
        let m = doc(json!({
            "text": "REQUEST: rice, Quantity: 2",
            "sender": "a@x.com",
            "timestamp": 1,
            "type": "request"
        }));

        let m = Message::try_from(m).unwrap();

        assert!(m.is_request());
        assert!(m.accepted_by().is_empty());
    }

    #[test]
    fn should_fail_on_missing_text() {
        let m = doc(json!({ "sender": "a@x.com", "timestamp": 1 }));

        assert!(Message::try_from(m).is_err());
    }

    #[test]
    fn should_compose_request_text() {
        let msg = NewMessage::request(
            "g1",
            &jora(),
            &Profile::new("Jora"),
            RequestKind::Request,
            " rice ",
            "2",
        )
        .unwrap();

        let fields = msg.to_fields().unwrap();
        assert_eq!(fields["text"], json!("REQUEST: rice, Quantity: 2"));
        assert_eq!(fields["type"], json!("request"));
        assert_eq!(fields["acceptedBy"], json!([]));
        assert_eq!(fields["sender"], json!("jora@x.com"));
        assert_eq!(fields["senderName"], json!("Jora"));
        assert_eq!(fields["groupId"], json!("g1"));
    }

    #[test]
    fn should_label_offers() {
        let msg = NewMessage::request(
            "g1",
            &jora(),
            &Profile::default(),
            RequestKind::Offer,
            "eggs",
            "6",
        )
        .unwrap();

        assert_eq!(msg.as_text(), "OFFER: eggs, Quantity: 6");
    }

    #[test]
    fn should_reject_blank_request_fields() {
        let res = NewMessage::request(
            "g1",
            &jora(),
            &Profile::default(),
            RequestKind::Request,
            "rice",
            "  ",
        );

        assert!(matches!(res, Err(message::Error::MissingFields)));
    }

    #[test]
    fn should_reject_blank_text() {
        let res = NewMessage::text("g1", &jora(), &Profile::default(), " \n\t ");

        assert!(matches!(res, Err(message::Error::EmptyText)));
    }

    #[test]
    fn should_not_write_accepted_by_on_text() {
        let msg = NewMessage::text("g1", &jora(), &Profile::default(), "hello").unwrap();

        let fields = msg.to_fields().unwrap();
        assert_eq!(fields["type"], json!("text"));
        assert!(!fields.contains_key("acceptedBy"));
        assert!(!fields.contains_key("senderName"));
    }
}
