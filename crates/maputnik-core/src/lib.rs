#![forbid(unsafe_code)]

//! Core: the style document model and the pure transformations the editor
//! applies to it.
//!
//! # Role in Maputnik
//! `maputnik-core` owns everything that can be computed from a style document
//! without touching the network, the disk, or the clock:
//!
//! - **Document model**: [`StyleDocument`], [`Layer`], [`SourceDescriptor`],
//!   and the typed [`StyleMetadata`] bag.
//! - **Validation**: the [`StyleValidator`] contract, the built-in
//!   [`SpecValidator`], error classification, and best-effort repair into a
//!   [`DirtyStyleDocument`].
//! - **Editing**: merge-patch, layer/source operations, and the floor filter.
//! - **URL state**: hash-gated encoding of the selected layer, open modals,
//!   and view mode into the address bar query string.
//! - **Tokens and export**: access-token substitution and export cleaning.
//!
//! # How it fits in the system
//! `maputnik-runtime` wires these pieces into the stateful editor store
//! (history, persistence, async source resolution). The core never holds
//! state between calls.

pub mod classify;
pub mod document;
pub mod edit;
pub mod error;
pub mod export;
pub mod floor;
mod lenient;
pub mod merge;
pub mod metadata;
pub mod path;
pub mod repair;
pub mod spec_table;
pub mod tokens;
pub mod url_state;
pub mod validate;

pub use classify::{LayerError, ValidationError};
pub use document::{
    Layer, SourceDescriptor, SourceKind, Sprite, SpriteSheet, StyleDocument, empty_style,
    ensure_style_validity, generate_id, parse_style,
};
pub use error::{Result, StyleError};
pub use export::{ExportFormat, clean_for_export, export_file_name, export_html, export_json};
pub use merge::merge_patch;
pub use metadata::{EditorKey, StyleMetadata};
pub use path::{JsonPath, PathSegment, reduce_error_path};
pub use repair::{DirtyStyleDocument, ValidationReport, repair, validate_style, validate_value};
pub use tokens::{TokenProvider, TokenService, TokenTable, substitute_tokens, substitute_url};
pub use url_state::{
    AddressBar, DecodedUrlState, LayerSelection, MemoryAddressBar, Modal, ViewMode,
    decode_url_state, encode_url_state, style_hash,
};
pub use validate::{SpecValidator, StyleValidator};
