// src/handlers/mod.rs
pub mod cookies;
pub mod form;
pub mod health;
pub mod subscriptions;
pub mod users;
pub mod videos;
