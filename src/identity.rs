// Identity collaborator - resolves a user id to the role the engines expect

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;
use tracing::debug;

use crate::approval::Role;
use crate::config::IdentityConfig;

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Unknown user: {0}")]
    UnknownUser(String),

    #[error("Invalid role {role:?} configured for user {user}")]
    InvalidRole { user: String, role: String },
}

/// `roleOf(userId)`: the engines take the resolved role as a parameter and
/// never query identity themselves.
#[async_trait]
pub trait RoleResolver: Send + Sync {
    async fn role_of(&self, user_id: &str) -> Result<Role, IdentityError>;
}

/// Static user → role table, typically built from configuration.
#[derive(Debug, Clone, Default)]
pub struct RoleDirectory {
    roles: HashMap<String, Role>,
    default_role: Option<Role>,
}

impl RoleDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_user(mut self, user_id: &str, role: Role) -> Self {
        self.roles.insert(user_id.to_string(), role);
        self
    }

    /// Role assumed for users missing from the table. Without one, unknown
    /// users are rejected.
    pub fn with_default_role(mut self, role: Role) -> Self {
        self.default_role = Some(role);
        self
    }

    pub fn from_config(config: &IdentityConfig) -> Result<Self, IdentityError> {
        let mut directory = Self::new();

        for (user, role) in &config.users {
            let parsed = role.parse::<Role>().map_err(|_| IdentityError::InvalidRole {
                user: user.clone(),
                role: role.clone(),
            })?;
            directory.roles.insert(user.clone(), parsed);
        }

        if let Some(role) = &config.default_role {
            let parsed = role.parse::<Role>().map_err(|_| IdentityError::InvalidRole {
                user: "<default>".to_string(),
                role: role.clone(),
            })?;
            directory.default_role = Some(parsed);
        }

        Ok(directory)
    }

    pub fn len(&self) -> usize {
        self.roles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roles.is_empty()
    }
}

#[async_trait]
impl RoleResolver for RoleDirectory {
    async fn role_of(&self, user_id: &str) -> Result<Role, IdentityError> {
        let role = self
            .roles
            .get(user_id)
            .copied()
            .or(self.default_role)
            .ok_or_else(|| IdentityError::UnknownUser(user_id.to_string()))?;
        debug!(user = %user_id, role = %role, "Resolved role");
        Ok(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_lookup_and_default() {
        let directory = RoleDirectory::new()
            .with_user("alice", Role::Assistant)
            .with_user("sam", Role::Supervisor);

        assert_eq!(directory.role_of("alice").await.unwrap(), Role::Assistant);
        assert!(matches!(
            directory.role_of("mallory").await,
            Err(IdentityError::UnknownUser(_))
        ));

        let directory = directory.with_default_role(Role::Employee);
        assert_eq!(directory.role_of("mallory").await.unwrap(), Role::Employee);
    }

    #[tokio::test]
    async fn test_from_config() {
        let mut config = IdentityConfig::default();
        config.users.insert("ana".to_string(), "Accounting".to_string());
        config.default_role = Some("employee".to_string());

        let directory = RoleDirectory::from_config(&config).unwrap();
        assert_eq!(directory.len(), 1);
        assert_eq!(directory.role_of("ana").await.unwrap(), Role::Accounting);
        assert_eq!(directory.role_of("erin").await.unwrap(), Role::Employee);

        config.users.insert("bob".to_string(), "cfo".to_string());
        assert!(matches!(
            RoleDirectory::from_config(&config),
            Err(IdentityError::InvalidRole { .. })
        ));
    }
}
