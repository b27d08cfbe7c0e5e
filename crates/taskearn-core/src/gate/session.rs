use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Signed-in user as reported by the authentication backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub user_id: String,
}

impl Session {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Member,
    Admin,
}

/// Authentication backend the shell consults; external to this crate.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    async fn current_session(&self) -> anyhow::Result<Option<Session>>;

    async fn fetch_role(&self, user_id: &str) -> anyhow::Result<Role>;
}
