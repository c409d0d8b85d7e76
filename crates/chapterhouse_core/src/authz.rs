//! crates/chapterhouse_core/src/authz.rs
//!
//! Ownership checks applied before every mutation, and the read-side
//! visibility rule for drafts.

use std::str::FromStr;
use uuid::Uuid;

use crate::domain::PublicationStatus;
use crate::error::{CoreError, CoreResult};

/// Admits the actor only if it is present and equals the owner.
pub fn authorize(actor: Option<Uuid>, owner: Uuid) -> CoreResult<Uuid> {
    match actor {
        None => Err(CoreError::Unauthenticated),
        Some(actor) if actor == owner => Ok(actor),
        Some(_) => Err(CoreError::Forbidden),
    }
}

/// Admits any signed-in actor.
pub fn require_identity(actor: Option<Uuid>) -> CoreResult<Uuid> {
    actor.ok_or(CoreError::Unauthenticated)
}

/// Who may read draft stories and chapters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DraftVisibility {
    /// Anyone, including anonymous visitors.
    #[default]
    Public,
    /// Only the owning author. Hidden drafts read as not found.
    OwnerOnly,
}

impl DraftVisibility {
    pub fn can_view(&self, status: PublicationStatus, owner: Uuid, viewer: Option<Uuid>) -> bool {
        match (self, status) {
            (_, PublicationStatus::Published) | (DraftVisibility::Public, _) => true,
            (DraftVisibility::OwnerOnly, PublicationStatus::Draft) => viewer == Some(owner),
        }
    }
}

impl FromStr for DraftVisibility {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "public" => Ok(DraftVisibility::Public),
            "owner-only" | "owner_only" => Ok(DraftVisibility::OwnerOnly),
            other => Err(format!("'{}' is not public or owner-only", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn owner_is_admitted() {
        let owner = Uuid::new_v4();
        assert_eq!(authorize(Some(owner), owner).unwrap(), owner);
    }

    #[test]
    fn anonymous_actor_is_unauthenticated() {
        assert!(matches!(
            authorize(None, Uuid::new_v4()),
            Err(CoreError::Unauthenticated)
        ));
    }

    #[test]
    fn other_actor_is_forbidden() {
        assert!(matches!(
            authorize(Some(Uuid::new_v4()), Uuid::new_v4()),
            Err(CoreError::Forbidden)
        ));
    }

    #[test]
    fn owner_only_hides_drafts_from_everyone_else() {
        let owner = Uuid::new_v4();
        let rule = DraftVisibility::OwnerOnly;
        assert!(rule.can_view(PublicationStatus::Draft, owner, Some(owner)));
        assert!(!rule.can_view(PublicationStatus::Draft, owner, None));
        assert!(!rule.can_view(PublicationStatus::Draft, owner, Some(Uuid::new_v4())));
        assert!(rule.can_view(PublicationStatus::Published, owner, None));
        assert!(DraftVisibility::Public.can_view(PublicationStatus::Draft, owner, None));
    }

    #[test]
    fn parses_configuration_values() {
        assert_eq!("owner-only".parse::<DraftVisibility>(), Ok(DraftVisibility::OwnerOnly));
        assert_eq!("PUBLIC".parse::<DraftVisibility>(), Ok(DraftVisibility::Public));
        assert!("friends".parse::<DraftVisibility>().is_err());
    }
}
