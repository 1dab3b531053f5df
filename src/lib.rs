//! GreenCart Logistics: delivery simulation engine and fleet bookkeeping API.
//!
//! Library crate exposing all modules for use by integration tests
//! and the binary entry point.

pub mod config;
pub mod types;
pub mod engine;
pub mod storage;
pub mod auth;
pub mod service;
pub mod api;
