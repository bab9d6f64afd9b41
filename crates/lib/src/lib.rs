//! Weft core library — transcript message model, index, compose/merge engine,
//! update scheduler, and history used by both the CLI and desktop applications.

pub mod compose;
pub mod config;
pub mod group;
pub mod history;
pub mod index;
pub mod message;
pub mod schedule;
pub mod store;
