//! Consolidated test modules.
//!
//! End-to-end tests of the provider flows against a scripted protocol
//! client and in-memory stores.

mod harness;
