//! Humanized input
//!
//! Randomizes tap positions inside their target regions and the length of
//! the pauses between screen reads.

pub mod humanize;

pub use humanize::Humanizer;
