pub mod app;
pub mod archive;
pub mod cache;
pub mod config;
pub mod domain;
pub mod error;
pub mod extract;
pub mod output;
pub mod stations;
