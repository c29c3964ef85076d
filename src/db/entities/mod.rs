//! Database entities

pub mod imagery;

pub use imagery::Entity as Imagery;
