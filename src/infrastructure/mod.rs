pub mod auth;
pub mod config;
pub mod db;
pub mod http;
pub mod oauth;
pub mod repositories;
pub mod session;
