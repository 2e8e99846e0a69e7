//! # deskbot-core
//!
//! Core library for deskbot - a menu-driven hardware support assistant.
//!
//! This library provides:
//! - The device/model/number/question catalog and its navigator
//! - A mint/resolve-once token registry for question callbacks
//! - Content path resolution for solution images and documents
//! - A SQLite statistics store with daily/weekly/monthly rollups
//! - The interaction controller tying the pieces together
//!
//! ## Architecture
//!
//! The chat transport stays outside this crate. It delivers `(user, payload)`
//! events to [`dispatch::Controller`] and receives a [`Render`] instruction
//! back; everything in between - navigation, token resolution, content
//! lookup, statistics writes - happens here.
//!
//! ## Example
//!
//! ```rust,no_run
//! use deskbot_core::{Config, Database};
//!
//! // Load configuration
//! let config = Config::load().expect("failed to load config");
//!
//! // Open database
//! let db = Database::open(&Config::database_path()).expect("failed to open database");
//! db.migrate().expect("failed to run migrations");
//! ```

// Re-export commonly used items at the crate root
pub use catalog::DeviceCatalog;
pub use config::Config;
pub use db::Database;
pub use dispatch::{CallbackAction, Command, Controller};
pub use error::{Error, Result};
pub use navigator::Navigator;
pub use token::TokenRegistry;
pub use types::*;

// Public modules
pub mod catalog;
pub mod config;
pub mod content;
pub mod db;
pub mod dispatch;
pub mod error;
pub mod logging;
pub mod navigator;
pub mod report;
pub mod snapshot;
pub mod token;
pub mod types;
