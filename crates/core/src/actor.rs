use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User identifier scoped to a company.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(Uuid);

impl UserId {
    /// Creates a random user identifier.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Creates a user identifier from an existing UUID value.
    #[must_use]
    pub fn from_uuid(value: Uuid) -> Self {
        Self(value)
    }

    /// Returns the underlying UUID value.
    #[must_use]
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

impl Display for UserId {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> std::fmt::Result {
        write!(formatter, "{}", self.0)
    }
}

/// Storage discriminant for the actor behind an audit-relevant event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorType {
    /// A human user acting through the application.
    User,
    /// The platform itself (jobs, bootstrap, operations).
    System,
    /// An automated detector or model.
    Ai,
}

impl ActorType {
    /// Returns a stable storage value for this actor type.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::System => "system",
            Self::Ai => "ai",
        }
    }
}

/// The party responsible for an audit-relevant event.
///
/// A user actor always carries its id; system and AI actors carry none,
/// which removes the ambiguity of a numeric sentinel id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "actor_type", rename_all = "snake_case")]
pub enum Actor {
    /// A human user identified by id.
    User {
        /// Identifier of the acting user.
        user_id: UserId,
    },
    /// The platform itself.
    System,
    /// An automated detector or model, identified by model version.
    Ai {
        /// Version tag of the producing model or rule set.
        model_version: String,
    },
}

impl Actor {
    /// Creates a user actor.
    #[must_use]
    pub fn user(user_id: UserId) -> Self {
        Self::User { user_id }
    }

    /// Creates an AI actor for the given model version.
    #[must_use]
    pub fn ai(model_version: impl Into<String>) -> Self {
        Self::Ai {
            model_version: model_version.into(),
        }
    }

    /// Returns the storage discriminant for this actor.
    #[must_use]
    pub fn actor_type(&self) -> ActorType {
        match self {
            Self::User { .. } => ActorType::User,
            Self::System => ActorType::System,
            Self::Ai { .. } => ActorType::Ai,
        }
    }

    /// Returns the user id when the actor is a user.
    #[must_use]
    pub fn user_id(&self) -> Option<UserId> {
        match self {
            Self::User { user_id } => Some(*user_id),
            Self::System | Self::Ai { .. } => None,
        }
    }

    /// Returns the model version when the actor is an AI component.
    #[must_use]
    pub fn model_version(&self) -> Option<&str> {
        match self {
            Self::Ai { model_version } => Some(model_version.as_str()),
            Self::User { .. } | Self::System => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::{Actor, ActorType, UserId};

    #[test]
    fn user_actor_carries_its_id() {
        let user_id = UserId::new();
        let actor = Actor::user(user_id);
        assert_eq!(actor.actor_type(), ActorType::User);
        assert_eq!(actor.user_id(), Some(user_id));
    }

    #[test]
    fn system_actor_has_no_user_id() {
        let actor = Actor::System;
        assert_eq!(actor.user_id(), None);
        assert_eq!(actor.model_version(), None);
    }

    #[test]
    fn ai_actor_exposes_model_version() {
        let actor = Actor::ai("rules-2026.03");
        assert_eq!(actor.actor_type(), ActorType::Ai);
        assert_eq!(actor.model_version(), Some("rules-2026.03"));
    }
}
