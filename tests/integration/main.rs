//! Integration tests over the in-memory repository

mod api_tests;
mod circulation_tests;
mod common;
