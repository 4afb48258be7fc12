#![forbid(unsafe_code)]

//! Runtime: the stateful side of the Maputnik editor.
//!
//! # Role in Maputnik
//! `maputnik-runtime` owns the editor session around a style document:
//!
//! - **Store**: [`EditorStore`] accepts every edit through one pipeline and
//!   publishes the results through [`Observable`]s.
//! - **History**: [`RevisionHistory`] keeps undo/redo snapshots.
//! - **Persistence**: [`StylePersistence`] over a [`StorageBackend`].
//! - **Background work**: font, icon, and source-layer fetches run through a
//!   [`TaskSpawner`] and are applied by [`EditorStore::pump`].
//! - **Configuration**: [`EditorConfig`], loadable from TOML or JSON.
//!
//! # How it fits in the system
//! The pure document transformations live in `maputnik-core`; the
//! `maputnik` binary drives this crate from the command line.

pub mod config;
pub mod error;
pub mod fetch;
pub mod history;
pub mod pmtiles;
pub mod reactive;
pub mod sources;
pub mod spec_cache;
pub mod storage;
pub mod store;
pub mod tasks;

pub use config::{ConfigError, EditorConfig};
pub use error::{EditorError, FetchError, Result};
pub use fetch::{FetchConfig, Fetcher, HttpFetcher, StaticFetcher};
pub use history::{HistoryConfig, Revision, RevisionHistory};
pub use reactive::{BatchScope, Observable, Subscription};
pub use sources::{ResolvedSource, ResolvedSources, SourceResolver};
pub use storage::{FileStorage, MemoryStorage, StorageBackend, StorageError, StylePersistence};
pub use store::{EditOptions, EditorStore, EditorStoreBuilder, StoreState};
pub use tasks::{Completion, InlineSpawner, ManualSpawner, TaskSpawner, ThreadSpawner};
