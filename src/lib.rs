#![allow(async_fn_in_trait)]

pub mod cli;
pub mod config;
pub mod error;
pub mod global;
pub mod models;
pub mod services;
pub mod views;

#[cfg(test)]
mod tests;

pub use config::Config;
pub use error::{Error, Result};
