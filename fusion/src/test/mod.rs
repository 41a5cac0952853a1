//! Test support and suites.

pub mod helpers;
