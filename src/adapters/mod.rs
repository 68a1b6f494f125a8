//! Driving adapters
//!
//! The REST adapter exposes the supervisor over HTTP/JSON.

pub mod rest;
