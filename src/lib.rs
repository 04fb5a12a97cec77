pub mod config;
pub mod cursor;
pub mod proto;
pub mod service;
pub mod store;
pub mod version;
pub mod voteable;
