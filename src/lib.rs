pub mod ai;
pub mod config;
pub mod history;
pub mod image;
pub mod models;
pub mod session;
pub mod storage;
pub mod types;
