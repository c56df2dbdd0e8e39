use crate::error::Result;
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Saved preferences and pantry for a user
#[async_trait]
pub trait UserContext: Send + Sync {
    async fn lookup(&self, user_id: &str) -> Result<Option<UserProfile>>;
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct UserProfile {
    #[serde(default)]
    pub dietary_preferences: Vec<String>,
    #[serde(default)]
    pub allergies: Vec<String>,
    #[serde(default)]
    pub pantry: Vec<String>,
}

impl UserProfile {
    pub fn describe(&self) -> String {
        let list = |items: &[String]| {
            if items.is_empty() {
                "none recorded".to_string()
            } else {
                items.join(", ")
            }
        };
        format!(
            "Dietary preferences: {}\nAllergies: {}\nPantry: {}",
            list(&self.dietary_preferences),
            list(&self.allergies),
            list(&self.pantry)
        )
    }
}

/// Profiles held in memory, optionally loaded from a JSON map of user id to profile
#[derive(Debug, Clone, Default)]
pub struct InMemoryUserContext {
    profiles: HashMap<String, UserProfile>,
}

impl InMemoryUserContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_profile(mut self, user_id: impl Into<String>, profile: UserProfile) -> Self {
        self.profiles.insert(user_id.into(), profile);
        self
    }

    pub async fn from_json_file(path: &Path) -> Result<Self> {
        let content = tokio::fs::read_to_string(path).await?;
        Ok(InMemoryUserContext {
            profiles: serde_json::from_str(&content)?,
        })
    }
}

#[async_trait]
impl UserContext for InMemoryUserContext {
    async fn lookup(&self, user_id: &str) -> Result<Option<UserProfile>> {
        Ok(self.profiles.get(user_id).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_load_profiles_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"u1": {{"dietary_preferences": ["vegetarian"], "pantry": ["rice", "lentils"]}}}}"#
        )
        .unwrap();

        let users = InMemoryUserContext::from_json_file(file.path()).await.unwrap();
        let profile = users.lookup("u1").await.unwrap().unwrap();
        assert_eq!(
            profile.describe(),
            "Dietary preferences: vegetarian\nAllergies: none recorded\nPantry: rice, lentils"
        );
        assert!(users.lookup("u2").await.unwrap().is_none());
    }
}
