use async_trait::async_trait;
use serde_json::Value;

use crate::auth;
use crate::store::{self, UpdateMode};

use super::model::Profile;

#[async_trait]
pub trait ProfileRepository {
    async fn find_by_uid(&self, uid: &auth::Uid) -> super::Result<Option<Profile>>;

    /// Merges the present fields of `profile` into the stored one, creating
    /// it if needed.
    async fn upsert(&self, uid: &auth::Uid, profile: &Profile) -> super::Result<()>;
}

pub struct StoreProfileRepository {
    store: store::Store,
    collection: String,
}

impl StoreProfileRepository {
    pub fn new(store: store::Store, collection: impl Into<String>) -> Self {
        Self {
            store,
            collection: collection.into(),
        }
    }
}

#[async_trait]
impl ProfileRepository for StoreProfileRepository {
    async fn find_by_uid(&self, uid: &auth::Uid) -> super::Result<Option<Profile>> {
        let id = store::Id(uid.to_string());
        let Some(doc) = self.store.get(&self.collection, &id).await? else {
            return Ok(None);
        };

        let (_, fields) = doc.into_parts();
        let profile = serde_json::from_value(Value::Object(fields))?;
        Ok(Some(profile))
    }

    async fn upsert(&self, uid: &auth::Uid, profile: &Profile) -> super::Result<()> {
        let fields = match serde_json::to_value(profile)? {
            Value::Object(fields) => fields,
            _ => store::Fields::new(),
        };

        self.store
            .update(
                &self.collection,
                &store::Id(uid.to_string()),
                fields,
                UpdateMode::Upsert,
            )
            .await?;

        Ok(())
    }
}
