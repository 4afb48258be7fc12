#![forbid(unsafe_code)]

//! The editor store: the single owner of the current style document.
//!
//! Every change to the document goes through [`EditorStore::apply_edit`],
//! which substitutes access tokens, validates and repairs, schedules the
//! derived-cache fetches, records history, persists, publishes, and finally
//! writes the UI position back into the address bar.
//!
//! # Publishing
//!
//! Observers subscribe to the observables in [`StoreState`]. The canonical
//! document, the dirty preview, the error list, and the resolved sources are
//! published inside one [`BatchScope`], so no subscriber sees a new document
//! next to a stale error list.
//!
//! # Background fetches
//!
//! Font lists, icon lists, and source layers are fetched off-thread. Their
//! completions are applied only by [`EditorStore::pump`] and
//! [`EditorStore::pump_until_idle`], never during an edit. Fonts and icons
//! carry a generation number: a completion for anything but the latest
//! generation is dropped.

use std::collections::BTreeSet;
use std::fmt;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};

use maputnik_core::{
    AddressBar, DirtyStyleDocument, ExportFormat, MemoryAddressBar, Modal, SpecValidator,
    StyleDocument, StyleValidator, TokenTable, ValidationError, ViewMode, decode_url_state,
    empty_style, encode_url_state, ensure_style_validity, export_html, export_json, parse_style,
    substitute_tokens, validate_style,
};
use serde_json::Value;
use tracing::{debug, info, info_span, warn};
use url::Url;

use crate::config::EditorConfig;
use crate::error::{EditorError, Result};
use crate::fetch::{Fetcher, HttpFetcher};
use crate::history::RevisionHistory;
use crate::reactive::{BatchScope, Observable};
use crate::sources::{ResolvedSources, SourceResolver, fetch_vector_layers};
use crate::spec_cache::{fetch_fonts, fetch_icons};
use crate::storage::{FileStorage, MemoryStorage, StylePersistence};
use crate::tasks::{Completion, TaskQueue, TaskSpawner, ThreadSpawner};

/// Query parameter naming a style to load on startup.
pub const STYLE_PARAM: &str = "style";

/// Side effects of one [`EditorStore::apply_edit`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EditOptions {
    pub persist: bool,
    pub record_history: bool,
    /// Restore the UI position from the address bar before publishing.
    pub is_initial_load: bool,
}

impl Default for EditOptions {
    fn default() -> Self {
        Self {
            persist: true,
            record_history: true,
            is_initial_load: false,
        }
    }
}

impl EditOptions {
    #[must_use]
    pub fn initial_load() -> Self {
        Self {
            is_initial_load: true,
            ..Self::default()
        }
    }

    /// Options for replaying a recorded revision.
    #[must_use]
    pub fn replay() -> Self {
        Self {
            record_history: false,
            ..Self::default()
        }
    }
}

/// Everything the store publishes.
#[derive(Clone)]
pub struct StoreState {
    /// Last accepted document; may be invalid.
    pub document: Observable<Arc<StyleDocument>>,
    /// Repaired preview of an invalid document.
    pub dirty: Observable<Option<DirtyStyleDocument>>,
    pub errors: Observable<Vec<ValidationError>>,
    pub fonts: Observable<Vec<String>>,
    pub icons: Observable<Vec<String>>,
    pub sources: Observable<ResolvedSources>,
    pub selected_layer: Observable<usize>,
    /// Id of the selected layer when it was selected or restored from the
    /// address bar. Differs from the layer at `selected_layer` once the list
    /// has changed underneath it.
    pub selected_layer_original_id: Observable<Option<String>>,
    pub modals: Observable<BTreeSet<Modal>>,
    pub view_mode: Observable<ViewMode>,
}

impl StoreState {
    fn new(document: StyleDocument) -> Self {
        Self {
            document: Observable::new(Arc::new(document)),
            dirty: Observable::new(None),
            errors: Observable::new(Vec::new()),
            fonts: Observable::new(Vec::new()),
            icons: Observable::new(Vec::new()),
            sources: Observable::new(ResolvedSources::new()),
            selected_layer: Observable::new(0),
            selected_layer_original_id: Observable::new(None),
            modals: Observable::new(BTreeSet::new()),
            view_mode: Observable::new(ViewMode::default()),
        }
    }
}

impl fmt::Debug for StoreState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StoreState")
            .field("document", &self.document.with(|doc| doc.id.clone()))
            .field("errors", &self.errors.with(Vec::len))
            .field("selected_layer", &self.selected_layer.get())
            .finish_non_exhaustive()
    }
}

/// Assembles an [`EditorStore`]; unset collaborators come from the config.
pub struct EditorStoreBuilder {
    config: EditorConfig,
    persistence: Option<StylePersistence>,
    fetcher: Option<Arc<dyn Fetcher>>,
    tasks: Option<TaskQueue>,
    address_bar: Option<Box<dyn AddressBar>>,
    validator: Option<Box<dyn StyleValidator>>,
}

impl EditorStoreBuilder {
    #[must_use]
    pub fn new(config: EditorConfig) -> Self {
        Self {
            config,
            persistence: None,
            fetcher: None,
            tasks: None,
            address_bar: None,
            validator: None,
        }
    }

    #[must_use]
    pub fn persistence(mut self, persistence: StylePersistence) -> Self {
        self.persistence = Some(persistence);
        self
    }

    #[must_use]
    pub fn fetcher(mut self, fetcher: impl Fetcher + 'static) -> Self {
        self.fetcher = Some(Arc::new(fetcher));
        self
    }

    #[must_use]
    pub fn spawner(mut self, spawner: impl TaskSpawner + 'static) -> Self {
        self.tasks = Some(TaskQueue::new(spawner));
        self
    }

    #[must_use]
    pub fn address_bar(mut self, address_bar: impl AddressBar + 'static) -> Self {
        self.address_bar = Some(Box::new(address_bar));
        self
    }

    #[must_use]
    pub fn validator(mut self, validator: impl StyleValidator + 'static) -> Self {
        self.validator = Some(Box::new(validator));
        self
    }

    pub fn build(self) -> Result<EditorStore> {
        let config = self.config.validated()?;

        let persistence = match self.persistence {
            Some(persistence) => persistence,
            None => match (&config.storage.dir, config.storage.quota_bytes) {
                (Some(dir), _) => StylePersistence::new(FileStorage::open(dir)?),
                (None, Some(quota)) => StylePersistence::new(MemoryStorage::with_quota(quota)),
                (None, None) => StylePersistence::in_memory(),
            },
        };
        let fetcher: Arc<dyn Fetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(&config.fetch)?),
        };
        let address_bar = match self.address_bar {
            Some(bar) => bar,
            None => Box::new(MemoryAddressBar::new(config.base_url()?)),
        };

        Ok(EditorStore {
            state: StoreState::new(empty_style()),
            history: RevisionHistory::new(config.history.clone()),
            persistence,
            validator: self.validator.unwrap_or_else(|| Box::new(SpecValidator::new())),
            tokens: config.token_table(),
            fetcher,
            tasks: self.tasks.unwrap_or_else(|| TaskQueue::new(ThreadSpawner)),
            address_bar,
            resolver: SourceResolver,
            font_generation: 0,
            icon_generation: 0,
        })
    }
}

/// The single-threaded editor store.
pub struct EditorStore {
    state: StoreState,
    history: RevisionHistory,
    persistence: StylePersistence,
    validator: Box<dyn StyleValidator>,
    tokens: TokenTable,
    fetcher: Arc<dyn Fetcher>,
    tasks: TaskQueue,
    address_bar: Box<dyn AddressBar>,
    resolver: SourceResolver,
    font_generation: u64,
    icon_generation: u64,
}

impl fmt::Debug for EditorStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EditorStore")
            .field("state", &self.state)
            .field("history", &self.history)
            .field("tasks", &self.tasks)
            .finish_non_exhaustive()
    }
}

impl EditorStore {
    #[must_use]
    pub fn builder(config: EditorConfig) -> EditorStoreBuilder {
        EditorStoreBuilder::new(config)
    }

    /// Accept `candidate` as the new document.
    ///
    /// Validation errors never reject the edit; they are published next to
    /// it. Storage failures other than a full quota are returned after the
    /// document was published and the address bar updated.
    pub fn apply_edit(&mut self, candidate: StyleDocument, options: EditOptions) -> Result<()> {
        let _span = info_span!(
            "store.apply_edit",
            id = %candidate.id,
            initial = options.is_initial_load
        )
        .entered();

        let candidate = Arc::new(substitute_tokens(&candidate, &self.tokens));

        let restored = options
            .is_initial_load
            .then(|| decode_url_state(&self.address_bar.current(), &candidate));

        let report = validate_style(self.validator.as_ref(), &candidate)?;

        let previous = self.state.document.get();
        let fonts_reset = candidate.glyphs != previous.glyphs && self.schedule_fonts(&candidate);
        let icons_reset = candidate.sprite != previous.sprite && self.schedule_icons(&candidate);

        let plan = self.resolver.plan(&candidate, &self.state.sources.get());
        for pending in plan.fetches {
            let fetcher = Arc::clone(&self.fetcher);
            self.tasks.submit(move || Completion::SourceLayers {
                result: fetch_vector_layers(fetcher.as_ref(), &pending.url),
                source_id: pending.source_id,
                url: pending.url,
            });
        }

        if options.record_history {
            self.history.append_arc(Arc::clone(&candidate));
        }

        let persisted = if options.persist {
            self.persistence.save(&candidate)
        } else {
            Ok(())
        };

        {
            let _batch = BatchScope::new();
            self.state.document.set(Arc::clone(&candidate));
            self.state.dirty.set(report.dirty);
            self.state.errors.set(report.errors);
            self.state.sources.set(plan.resolved);
            if fonts_reset {
                self.state.fonts.set(Vec::new());
            }
            if icons_reset {
                self.state.icons.set(Vec::new());
            }
            if let Some(restored) = restored {
                if let Some(layer) = restored.layer {
                    self.state.selected_layer.set(layer.index);
                    self.state
                        .selected_layer_original_id
                        .set(Some(layer.original_id));
                }
                self.state.modals.set(restored.modals);
                if let Some(mode) = restored.view_mode {
                    self.state.view_mode.set(mode);
                }
            }
            let last = candidate.layers.len().saturating_sub(1);
            if self.state.selected_layer.get() > last {
                self.state.selected_layer.set(last);
            }
        }

        self.sync_address_bar()?;

        debug!(
            layers = candidate.layers.len(),
            errors = self.state.errors.with(Vec::len),
            "edit applied"
        );
        persisted.map_err(EditorError::from)
    }

    /// Queue a font list fetch. Returns true when the list must be cleared now.
    fn schedule_fonts(&mut self, style: &StyleDocument) -> bool {
        self.font_generation += 1;
        let generation = self.font_generation;
        let Some(glyphs) = style.glyphs.clone() else {
            return true;
        };
        let fetcher = Arc::clone(&self.fetcher);
        self.tasks.submit(move || Completion::Fonts {
            generation,
            result: fetch_fonts(fetcher.as_ref(), &glyphs),
        });
        false
    }

    fn schedule_icons(&mut self, style: &StyleDocument) -> bool {
        self.icon_generation += 1;
        let generation = self.icon_generation;
        let Some(sprite) = style.sprite.clone() else {
            return true;
        };
        let fetcher = Arc::clone(&self.fetcher);
        self.tasks.submit(move || Completion::Icons {
            generation,
            icons: fetch_icons(fetcher.as_ref(), &sprite),
        });
        false
    }

    fn sync_address_bar(&mut self) -> Result<()> {
        let document = self.state.document.get();
        let modals = self.state.modals.get();
        encode_url_state(
            self.address_bar.as_mut(),
            &document,
            self.state.selected_layer.get(),
            &modals,
            self.state.view_mode.get(),
        )?;
        Ok(())
    }

    /// Merge an RFC 7396 patch into the current document and accept it.
    pub fn apply_patch(&mut self, patch: &Value) -> Result<()> {
        let next = self.document().merged(patch)?;
        self.apply_edit(next, EditOptions::default())
    }

    /// Step back one revision. Returns false when there is nothing to undo.
    pub fn undo(&mut self) -> Result<bool> {
        match self.history.undo() {
            Some(revision) => {
                self.apply_edit((*revision).clone(), EditOptions::replay())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn redo(&mut self) -> Result<bool> {
        match self.history.redo() {
            Some(revision) => {
                self.apply_edit((*revision).clone(), EditOptions::replay())?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub fn select_layer(&mut self, index: usize) -> Result<()> {
        let (index, id) = self.state.document.with(|doc| {
            let index = index.min(doc.layers.len().saturating_sub(1));
            (index, doc.layers.get(index).map(|layer| layer.id().to_string()))
        });
        {
            let _batch = BatchScope::new();
            self.state.selected_layer.set(index);
            self.state.selected_layer_original_id.set(id);
        }
        self.sync_address_bar()
    }

    pub fn open_modal(&mut self, modal: Modal) -> Result<()> {
        self.state.modals.update(|modals| {
            modals.insert(modal);
        });
        self.sync_address_bar()
    }

    pub fn close_modal(&mut self, modal: Modal) -> Result<()> {
        self.state.modals.update(|modals| {
            modals.remove(&modal);
        });
        self.sync_address_bar()
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) -> Result<()> {
        self.state.view_mode.set(mode);
        self.sync_address_bar()
    }

    /// Apply every completion that has already arrived.
    pub fn pump(&mut self) -> usize {
        let mut applied = 0;
        while let Some(completion) = self.tasks.try_recv() {
            self.apply_completion(completion);
            applied += 1;
        }
        applied
    }

    /// Wait for in-flight fetches until none remain or `timeout` elapses.
    pub fn pump_until_idle(&mut self, timeout: Duration) -> usize {
        let deadline = Instant::now() + timeout;
        let mut applied = self.pump();
        while self.tasks.in_flight() > 0 {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                warn!(in_flight = self.tasks.in_flight(), "fetches still pending");
                break;
            }
            if let Some(completion) = self.tasks.recv_timeout(remaining) {
                self.apply_completion(completion);
                applied += 1;
            }
        }
        applied
    }

    fn apply_completion(&mut self, completion: Completion) {
        match completion {
            Completion::Fonts { generation, result } => {
                if generation != self.font_generation {
                    debug!(generation, latest = self.font_generation, "dropping stale font list");
                    return;
                }
                match result {
                    Ok(fonts) => self.state.fonts.set(fonts),
                    Err(err) => warn!(error = %err, "could not load font list"),
                }
            }
            Completion::Icons { generation, icons } => {
                if generation != self.icon_generation {
                    debug!(generation, latest = self.icon_generation, "dropping stale icon list");
                    return;
                }
                self.state.icons.set(icons);
            }
            Completion::SourceLayers {
                source_id,
                url,
                result,
            } => match result {
                Ok(layers) => {
                    let document = self.state.document.get();
                    let resolved = self.state.sources.get();
                    if let Some(next) =
                        self.resolver
                            .apply(&document, &resolved, &source_id, &url, layers)
                    {
                        self.state.sources.set(next);
                    }
                }
                Err(err) => warn!(source_id, url, error = %err, "could not resolve source layers"),
            },
        }
    }

    /// Load the style named by the address bar's `style` parameter, else the
    /// most recently saved one, else the empty style.
    pub fn load_initial(&mut self) -> Result<()> {
        let address = self.address_bar.current();
        if let Some((_, url)) = address.query_pairs().find(|(key, _)| key == STYLE_PARAM) {
            let url = url.into_owned();
            info!(url, "loading style from address bar");
            let style = self.fetch_style(&url)?;
            return self.apply_edit(style, EditOptions::initial_load());
        }

        let style = match self.persistence.load_latest() {
            Ok(Some(style)) => style,
            Ok(None) => empty_style(),
            Err(err) => {
                warn!(error = %err, "could not restore saved style; starting empty");
                empty_style()
            }
        };
        self.apply_edit(style, EditOptions::initial_load())
    }

    /// Read a style file from disk and accept it.
    pub fn import_file(&mut self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        let json = std::fs::read_to_string(path).map_err(|source| EditorError::Import {
            path: path.to_path_buf(),
            source,
        })?;
        let style = parse_style(&json)?;
        self.apply_edit(style, EditOptions::default())
    }

    /// Fetch a style document and accept it.
    pub fn load_remote(&mut self, url: &str) -> Result<()> {
        let style = self.fetch_style(url)?;
        self.apply_edit(style, EditOptions::default())
    }

    fn fetch_style(&self, url: &str) -> Result<StyleDocument> {
        let value = self
            .fetcher
            .fetch_json(url)
            .map_err(|err| EditorError::remote(url, err))?;
        Ok(ensure_style_validity(StyleDocument::from_value(value)?))
    }

    /// Serialise the current document for download.
    pub fn export(&self, format: ExportFormat) -> Result<String> {
        let document = self.document();
        let text = match format {
            ExportFormat::Json => export_json(&document, &self.tokens)?,
            ExportFormat::Html => export_html(&document, &self.tokens)?,
        };
        Ok(text)
    }

    #[must_use]
    pub fn state(&self) -> &StoreState {
        &self.state
    }

    #[must_use]
    pub fn document(&self) -> Arc<StyleDocument> {
        self.state.document.get()
    }

    #[must_use]
    pub fn errors(&self) -> Vec<ValidationError> {
        self.state.errors.get()
    }

    #[must_use]
    pub fn dirty(&self) -> Option<DirtyStyleDocument> {
        self.state.dirty.get()
    }

    #[must_use]
    pub fn history(&self) -> &RevisionHistory {
        &self.history
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenTable {
        &self.tokens
    }

    /// The address bar's current URL.
    #[must_use]
    pub fn address(&self) -> Url {
        self.address_bar.current()
    }

    #[must_use]
    pub fn persistence(&self) -> &StylePersistence {
        &self.persistence
    }

    /// Fetches submitted and not yet applied.
    #[must_use]
    pub fn pending_fetches(&self) -> usize {
        self.tasks.in_flight()
    }
}
