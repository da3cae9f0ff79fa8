//! Reportes - municipal incident report intake
//!
//! Citizens submit reports through a public form; a single admin identity
//! reviews, edits, resolves and deletes them behind a session-gated panel.

pub mod api;
pub mod config;
pub mod db;
pub mod models;
pub mod services;
