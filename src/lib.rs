#![allow(clippy::uninlined_format_args)]

pub mod algolia;
pub mod app;
pub mod comments;
pub mod config;
pub mod data;
pub mod gesture;
pub mod logging;
pub mod markup;
pub mod model;
pub mod navigation;
pub mod scroll;
pub mod session;
pub mod store;
pub mod ui;

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use app::{run, RunOptions};
