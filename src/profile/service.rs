use async_trait::async_trait;
use log::{debug, warn};

use crate::auth;

use super::Repository;
use super::model::Profile;

#[async_trait]
pub trait ProfileService {
    /// Passive lookup: a missing profile or a backend failure both yield the
    /// empty profile.
    async fn find(&self, uid: &auth::Uid) -> Profile;

    async fn save(&self, uid: &auth::Uid, profile: &Profile) -> super::Result<()>;
}

#[derive(Clone)]
pub struct ProfileServiceImpl {
    repo: Repository,
}

impl ProfileServiceImpl {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }
}

#[async_trait]
impl ProfileService for ProfileServiceImpl {
    async fn find(&self, uid: &auth::Uid) -> Profile {
        match self.repo.find_by_uid(uid).await {
            Ok(Some(p)) => p,
            Ok(None) => {
                debug!("no profile for {uid}");
                Profile::default()
            }
            Err(e) => {
                warn!("failed to fetch profile for {uid}: {e}");
                Profile::default()
            }
        }
    }

    async fn save(&self, uid: &auth::Uid, profile: &Profile) -> super::Result<()> {
        let name = profile.name.as_deref().map(str::trim).unwrap_or_default();
        if name.is_empty() {
            return Err(super::Error::MissingName);
        }

        let profile = Profile {
            name: Some(name.to_string()),
            ..profile.clone()
        };
        self.repo.upsert(uid, &profile).await
    }
}
