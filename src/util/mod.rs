//! Filesystem helpers for the local storage adapter.

pub mod atomic;
