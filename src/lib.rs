//! Select text anywhere, get it translated in a small always-on-top window.
//!
//! A low-level mouse hook ([`hook`]) feeds every mouse message to the
//! [`dispatch::Dispatcher`]; on mouse-up the [`worker`] copies the selection,
//! waits for the clipboard to settle, and asks the [`translate`] client for a
//! translation that [`ui`] then shows.

pub mod clipboard;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod hook;
pub mod logger;
pub mod shutdown;
pub mod task;
pub mod translate;
pub mod tray;
pub mod ui;
pub mod unicode;
pub mod worker;
