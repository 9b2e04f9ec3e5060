pub mod activity;
pub mod comment;
pub mod request;
pub mod setting;
pub mod stats;
pub mod user;
