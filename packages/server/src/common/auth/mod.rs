/// Authorization
///
/// Provides a fluent API for authorization checks in actions:
///
/// ```ignore
/// use crate::common::auth::{Actor, Capability};
///
/// Actor::new(user_id, role)
///     .can(Capability::ModeratePosts)
///     .check()?;
/// ```
///
/// Authentication (token verification) happens at the HTTP edge; actions
/// receive an already-verified `CurrentUser`.

mod builder;
mod capability;
mod errors;

pub use builder::{Actor, CapabilityBuilder, CurrentUser};
pub use capability::{Capability, UserRole};
pub use errors::AuthError;
