pub mod app;
pub mod cli;
pub mod config;
pub mod highlight;
pub mod journaling;
pub mod search;
pub mod store;
pub mod timeline;
pub mod ui;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
pub use journaling::{Journal, JournalEvent};
pub use timeline::{Timeline, TimelineId};
