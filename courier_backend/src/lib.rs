//! Store-and-forward chat for a single operator.
//!
//! Remote users post messages over HTTP; every conversation is kept as a
//! JSON record per user and each arrival leaves an unread entry in a durable
//! inbox. The operator works through a small page-based interface driven by
//! key events, and messages they compose are pushed to the one live
//! websocket viewer.

pub mod chat;
pub mod config;
pub mod error;
pub mod health;
pub mod inbox;
pub mod keys;
pub mod model;
pub mod navigator;
pub mod runtime;
pub mod server;
pub mod session;
pub mod storage;
pub mod store;
pub mod view;
