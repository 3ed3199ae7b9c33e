pub mod client;
pub mod connector;
pub mod decoder;
pub mod error;
pub mod poller;

pub use connector::TelegramConnector;
