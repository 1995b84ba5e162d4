#[macro_use]
extern crate log;

pub mod bus;
pub mod cli;
pub mod command_handler;
pub mod config;
pub mod config_loader;
pub mod demux;
pub mod env;
pub mod error;
pub mod logger;
pub mod monitor;
pub mod process_manager;
pub mod subsystem;
pub mod supervisor;

pub use miette::Result;
