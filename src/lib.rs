pub mod attendance;
pub mod auth;
pub mod config;
pub mod database;
pub mod handlers;
pub mod models;
pub mod routes;
pub mod state;
pub mod tasks;
pub mod utils;
