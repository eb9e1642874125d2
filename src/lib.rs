// Library root for the punchclock attendance service

pub mod api;
pub mod auth;
pub mod config;
pub mod core;
pub mod engine;
pub mod state;
