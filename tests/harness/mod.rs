//! Test harness: an in-process server and a minimal client built on the
//! crate's own codec.

#![allow(dead_code)]

mod client;
mod server;

pub use client::{TEST_KEY, TestClient, raw_exchange, upgrade_request};
pub use server::{MARKER, TestServer};
