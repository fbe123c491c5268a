//! PostgreSQL repositories, one per table.

pub mod connection_repo;
pub mod token_repo;
pub mod user_repo;

pub use connection_repo::ConnectionRepo;
pub use token_repo::TokenRepo;
pub use user_repo::UserRepo;
