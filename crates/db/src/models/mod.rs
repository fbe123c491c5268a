//! Row models and create DTOs for every table the service touches.

pub mod connection;
pub mod token_record;
pub mod user;
