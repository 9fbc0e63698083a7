pub mod auth;
pub mod chat;
pub mod event;
pub mod integration;
pub mod message;
pub mod schema;
pub mod state;
pub mod thread;
pub mod user;
