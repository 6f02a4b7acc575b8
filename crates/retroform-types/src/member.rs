//! Member identity record.
//!
//! Authentication lives outside this workspace; by the time a request reaches
//! the core, the caller has already been resolved to a [`MemberId`]. The
//! `Member` record exists so ownership checks and profile display have
//! something to point at.

use serde::{Deserialize, Serialize};

use crate::ids::MemberId;

/// A registered member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    /// Storage identity, absent until first persisted.
    pub id: Option<MemberId>,
    /// Identity at the external auth provider. Unique.
    pub social_id: String,
    /// Display nickname, editable by the member.
    pub nickname: String,
    /// Profile image URL.
    pub profile_url: String,
}

impl Member {
    /// Create a not-yet-persisted member.
    pub fn new(
        social_id: impl Into<String>,
        nickname: impl Into<String>,
        profile_url: impl Into<String>,
    ) -> Self {
        Self {
            id: None,
            social_id: social_id.into(),
            nickname: nickname.into(),
            profile_url: profile_url.into(),
        }
    }

    /// Rename the member.
    pub fn update_nickname(&mut self, nickname: impl Into<String>) {
        self.nickname = nickname.into();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_member_has_no_id() {
        let member = Member::new("social-1", "jason", "https://img.example/1");
        assert!(member.id.is_none());
        assert_eq!(member.nickname, "jason");
    }

    #[test]
    fn test_update_nickname() {
        let mut member = Member::new("social-1", "jason", "https://img.example/1");
        member.update_nickname("panda");
        assert_eq!(member.nickname, "panda");
    }
}
