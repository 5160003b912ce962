// HTTP routes
pub mod health;
pub mod moderation;
pub mod posts;
pub mod profile;
pub mod topics;

pub use health::*;
pub use moderation::*;
pub use posts::*;
pub use profile::*;
pub use topics::*;
