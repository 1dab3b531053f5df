//! End-to-end tests over an in-memory database.

mod api;
mod simulation;
