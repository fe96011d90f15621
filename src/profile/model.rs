use serde::{Deserialize, Serialize};

/// Public profile of a principal, stored in the profiles collection under
/// the principal's uid.
#[derive(Clone, Debug, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Profile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bio: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

impl Profile {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: Some(name.into()),
            ..Default::default()
        }
    }

    pub fn with_bio(self, bio: impl Into<String>) -> Self {
        Self {
            bio: Some(bio.into()),
            ..self
        }
    }

    pub fn with_image_url(self, url: impl Into<String>) -> Self {
        Self {
            image_url: Some(url.into()),
            ..self
        }
    }
}
