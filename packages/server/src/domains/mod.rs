// Business domains
pub mod auth;
pub mod moderation;
pub mod posts;
pub mod topics;
