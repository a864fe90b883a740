//! User roster entries

use crate::core_post::PublicKey;
use crate::core_store::{Role, UserInfo};
use std::collections::HashMap;

/// Role context covering the whole cabal rather than one channel
pub const CABAL_CONTEXT: &str = "";

/// A known user
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub key: PublicKey,
    /// Name as set by the user; may be empty
    pub name: String,
    pub accept_role: bool,
    /// Context (channel name or [`CABAL_CONTEXT`]) -> role
    pub roles: HashMap<String, Role>,
}

impl User {
    pub fn new(key: PublicKey) -> Self {
        Self {
            key,
            name: String::new(),
            accept_role: true,
            roles: HashMap::new(),
        }
    }

    /// The set name, or the short hex form of the key when none is set
    pub fn display_name(&self) -> String {
        if self.name.is_empty() {
            self.key.short()
        } else {
            self.name.clone()
        }
    }

    pub fn update(&mut self, info: &UserInfo) {
        self.name = info.name.clone();
        self.accept_role = info.accept_role;
    }

    /// Role in `channel`, then cabal-wide
    fn has_role(&self, channel: &str, role: Role) -> bool {
        self.roles.get(channel) == Some(&role) || self.roles.get(CABAL_CONTEXT) == Some(&role)
    }

    pub fn is_admin(&self, channel: &str) -> bool {
        self.has_role(channel, Role::Admin)
    }

    pub fn is_moderator(&self, channel: &str) -> bool {
        self.has_role(channel, Role::Moderator)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::test_key;

    #[test]
    fn test_display_name_falls_back_to_key() {
        let mut user = User::new(test_key(0xab));
        assert_eq!(user.display_name(), "abababab");
        user.name = "alice".to_string();
        assert_eq!(user.display_name(), "alice");
    }

    #[test]
    fn test_roles_check_channel_then_cabal() {
        let mut user = User::new(test_key(1));
        user.roles.insert("dev".to_string(), Role::Moderator);
        assert!(user.is_moderator("dev"));
        assert!(!user.is_moderator("default"));
        assert!(!user.is_admin("dev"));

        user.roles.insert(CABAL_CONTEXT.to_string(), Role::Admin);
        assert!(user.is_admin("default"));
        assert!(user.is_admin("dev"));
    }

    #[test]
    fn test_update_from_store_info() {
        let mut user = User::new(test_key(1));
        user.update(&UserInfo { name: "bob".to_string(), accept_role: false });
        assert_eq!(user.name, "bob");
        assert!(!user.accept_role);
    }
}
