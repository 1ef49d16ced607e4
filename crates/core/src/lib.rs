//! Content administration core: path-based document editing and
//! site-wide backup/restore over pluggable stores.

pub mod archive;
pub mod config;
pub mod document;
pub mod events;
pub mod media;
pub mod store;
