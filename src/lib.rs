pub mod auth;
pub mod chat;
pub mod integration;
pub mod message;
pub mod profile;
pub mod store;
