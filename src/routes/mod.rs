pub mod activity;
pub mod auth;
pub mod comments;
pub mod health;
pub mod requests;
pub mod settings;
pub mod stats;
pub mod users;
