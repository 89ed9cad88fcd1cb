pub mod access_token;
pub mod config;
pub mod domain;
pub mod http;
pub mod password;
pub mod state;
