pub mod ai;
pub mod app;
pub mod cache;
pub mod cli;
pub mod config;
pub mod error;
pub mod merge;
pub mod models;
pub mod remote;
pub mod session;
pub mod summary;
