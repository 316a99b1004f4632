pub mod action;
pub mod adb;
pub mod capture;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod log;
pub mod parsers;
pub mod runner;
pub mod server;
pub mod storage;

pub use action::{Action, Response, Status};
pub use error::{Error, Result};
