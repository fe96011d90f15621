use std::env;

use crate::{integration, message, profile};

mod controller;
pub mod feed;
pub mod model;

pub use controller::ChatController;

type Result<T> = std::result::Result<T, Error>;

#[derive(Clone, Debug)]
pub struct Config {
    pub group_id: String,
    pub messages_collection: String,
    pub profiles_collection: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            group_id: String::from("neighbornom"),
            messages_collection: String::from("groupMessages"),
            profiles_collection: String::from("users"),
        }
    }
}

impl Config {
    pub fn env() -> integration::Result<Self> {
        let default = Self::default();
        let group_id = env::var("GROUP_ID").unwrap_or(default.group_id);
        let messages_collection =
            env::var("MESSAGES_COLLECTION").unwrap_or(default.messages_collection);
        let profiles_collection =
            env::var("PROFILES_COLLECTION").unwrap_or(default.profiles_collection);

        Ok(Self {
            group_id,
            messages_collection,
            profiles_collection,
        })
    }

    pub fn with_group(self, group_id: impl Into<String>) -> Self {
        Self {
            group_id: group_id.into(),
            ..self
        }
    }
}

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error("not signed in")]
    SignedOut,

    #[error(transparent)]
    _Message(#[from] message::Error),
    #[error(transparent)]
    _Profile(#[from] profile::Error),
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn should_keep_collections_without_group_id() {
        // only this test touches these variables
        unsafe {
            env::remove_var("GROUP_ID");
            env::set_var("MESSAGES_COLLECTION", "barterMessages");
            env::remove_var("PROFILES_COLLECTION");
        }

        let config = Config::env().unwrap();

        assert_eq!(config.group_id, "neighbornom");
        assert_eq!(config.messages_collection, "barterMessages");
        assert_eq!(config.profiles_collection, "users");

        unsafe { env::remove_var("MESSAGES_COLLECTION") };
    }
}
