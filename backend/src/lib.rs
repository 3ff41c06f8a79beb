pub mod chat;
pub mod config;
pub mod preprocess;
pub mod recognition;
pub mod routes;
