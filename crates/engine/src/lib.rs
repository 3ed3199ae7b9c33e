pub mod filter;
pub mod health;
pub mod processor;
pub mod supervisor;
pub mod transport;
