//! # colv - column-aware pager
//!
//! A terminal pager for line-oriented, column-structured text such as logs and
//! tabular reports. Lines are split into fields, aligned into columns, optionally
//! reformatted per column, and searched with regular expressions. Inputs can be
//! files (mapped or loaded, transparently decompressed) or streams such as a pipe
//! on standard input that keep growing while being viewed.
//!
//! ## Architecture
//!
//! - [`source`] - byte sources: fixed files and growing streams behind [`ByteSource`]
//! - [`cache`] - the line cache and scroll controller ([`LineCache`])
//! - [`row`] and [`rules`] - row model, field splitting, format and ignore rules
//! - [`pattern`] - compiled search patterns
//! - [`input`], [`render`] and [`app`] - the terminal viewer built on the above

pub mod cache;
pub mod cancel;
pub mod config;
pub mod error;
pub mod pattern;
pub mod row;
pub mod rules;
pub mod source;

pub mod input;
pub mod render;

pub mod app;

pub use app::Application;
pub use cache::{Direction, LineCache, Position};
pub use cancel::CancelToken;
pub use config::Config;
pub use error::{ColvError, Result};
pub use pattern::SearchPattern;
pub use source::{ByteSource, SourceFactory};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
