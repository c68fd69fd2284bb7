pub mod config;
pub mod event;
pub mod format;
pub mod graphics;
pub mod harness;
pub mod logging;
pub mod summary;
pub mod system;
pub mod ui;
