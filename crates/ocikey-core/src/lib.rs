//! Foundational file and path utilities shared across ocikey crates.
//!
//! Provides the atomic write used for key material and the credential file,
//! plus path rendering helpers for SDK-facing configuration values.

pub mod atomic_io;
pub mod path_utils;

pub use atomic_io::{write_text_atomic, write_text_atomic_with_mode};
pub use path_utils::{absolute_path, forward_slash_path};
