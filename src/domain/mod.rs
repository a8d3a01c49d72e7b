pub mod account;
pub mod events;
pub mod ports;
pub mod transaction;
