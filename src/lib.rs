pub mod cli;
pub mod commands;
pub mod config;
pub mod core;
pub mod launcher;
pub mod profiles;
pub mod stats;
pub mod ui;
