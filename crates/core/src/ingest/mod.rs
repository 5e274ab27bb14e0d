pub mod provider;
pub mod statement;
pub mod types;
