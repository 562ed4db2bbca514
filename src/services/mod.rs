//! Service layer — business logic between HTTP handlers and the database.

pub mod auth;
pub mod billing;
pub mod card;
pub mod deck;
pub mod generate;
pub mod preview;
pub mod stats;
pub mod subscription;
