#![allow(clippy::uninlined_format_args)]

pub mod analysis;
pub mod app;
pub mod backend;
pub mod config;
pub mod data;
pub mod embed;
pub mod example;
pub mod fetch;
pub mod inspect;
pub mod logging;
pub mod page;
pub mod tree;
pub mod ui;
pub mod validate;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::run;
