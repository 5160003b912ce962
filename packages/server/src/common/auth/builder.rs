use super::{AuthError, Capability, UserRole};
use crate::common::entity_ids::UserId;

/// The authenticated caller of an entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser {
    pub user_id: UserId,
    pub role: UserRole,
}

impl CurrentUser {
    pub fn new(user_id: UserId, role: UserRole) -> Self {
        Self { user_id, role }
    }

    pub fn is_privileged(&self) -> bool {
        self.role.is_privileged()
    }

    /// Entry point for an authorization check on this user.
    pub fn actor(&self) -> Actor {
        Actor::new(self.user_id, self.role)
    }
}

/// Entry point for authorization checks
///
/// Usage:
/// ```ignore
/// Actor::new(user_id, role)
///     .can(Capability::ModeratePosts)
///     .check()?;
///
/// // Authors may act on their own content without the capability
/// user.actor()
///     .can(Capability::DeleteAnyPost)
///     .or_owner_of(post.author_id)
///     .check()?;
/// ```
pub struct Actor {
    actor_id: UserId,
    role: UserRole,
}

impl Actor {
    pub fn new(actor_id: UserId, role: UserRole) -> Self {
        Self { actor_id, role }
    }

    /// Specify what capability the actor needs
    pub fn can(self, capability: Capability) -> CapabilityBuilder {
        CapabilityBuilder {
            actor_id: self.actor_id,
            role: self.role,
            capability,
            owner: None,
        }
    }
}

/// Builder after specifying capability
pub struct CapabilityBuilder {
    actor_id: UserId,
    role: UserRole,
    capability: Capability,
    owner: Option<UserId>,
}

impl CapabilityBuilder {
    /// Also allow the check when the actor owns the resource.
    pub fn or_owner_of(mut self, owner: UserId) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Perform the authorization check
    pub fn check(self) -> Result<(), AuthError> {
        if self.owner == Some(self.actor_id) {
            return Ok(());
        }

        if self.role >= self.capability.required_role() {
            return Ok(());
        }

        tracing::debug!(
            actor_id = %self.actor_id,
            role = %self.role,
            capability = ?self.capability,
            "authorization denied"
        );

        Err(AuthError::PermissionDenied(format!(
            "you are not allowed to {}",
            self.capability.describe()
        )))
    }
}
