// Common test utilities
#![allow(dead_code)]

pub mod harness;
pub mod postgres;

pub use harness::*;
pub use postgres::*;
