//! Database layer.
//!
//! The store interfaces ([`tunemate_core::SessionStore`],
//! [`tunemate_core::ProfileStore`], [`tunemate_core::ChatLog`]) live in the
//! core crate. [`sqlite::SqliteStore`] implements all three on one pool. To
//! swap to another database, implement the traits for your new type and
//! change the concrete type in [`crate::state::AppState`].

pub mod sqlite;
