// Test module entry point for sync tests
// End-to-end runs against the in-memory storage backend

mod common;
mod diff_tests;
mod engine_tests;
mod property_tests;
