//! Common types used throughout `buildmeta`.
//!
//! This crate provides the identity record of a buildable artifact and the
//! operating-system classification derived from it.

mod artifact;

pub use artifact::{ArtifactSpec, Os};
