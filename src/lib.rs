//! `oa-patch` — fuzzy patch and edit engine for coding agents.
//!
//! Applies model-written edits to real files even when the model's idea of
//! *where* to edit is imprecise: wrong indentation, stale line numbers,
//! typographic punctuation or slightly wrong context. Ambiguous locations are
//! always reported, never guessed.
//!
//! # Edit modes
//!
//! - `replace`: old/new text pair, see [`edit::replace_text`]
//! - `patch`: create/delete/update a file from a diff, see
//!   [`edit::patch::apply_patch`]
//!
//! # Architecture
//!
//! ```text
//! tool request (JSON) → ToolRouter → edit / patch tool
//!                                        ↓
//!                 replace_text · apply_patch (engine, pure)
//!                                        ↓
//!                                  Storage adapter
//! ```

pub mod edit;
pub mod error;
pub mod storage;
pub mod tools;
pub mod util;

pub use edit::patch::{ApplyContext, FileChange, PatchInput, PatchOperation, apply_patch};
pub use edit::{ReplaceOptions, ReplaceResult, replace_text};
pub use error::{MatchFailure, PatchError, PatchResult};
pub use storage::{LocalStorage, MemoryStorage, Storage};
