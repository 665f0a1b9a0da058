pub mod adapter;
pub mod backend;
pub mod config;
pub mod controller;
pub mod critic;
pub mod executor;
pub mod extract;
pub mod observer;
pub mod planner;
pub mod preflight;
mod subtask_parser;

pub use controller::CompletionController;
