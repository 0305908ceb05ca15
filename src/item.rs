//! The Work Item sum type: every unit of work flowing through the pipeline
//! is either a [`Page`] or an [`Asset`], dispatched by `match` rather than
//! through a trait object.
//!
//! Neither variant holds a DOM: `markup5ever_rcdom`'s tree is built on `Rc`,
//! which is never `Send`, and work items cross `tokio::spawn` boundaries via
//! `mpsc` channels on the default multi-threaded runtime. Parsing, rewriting,
//! and serializing all happen inside a single synchronous call in the parse
//! stage, which hands back plain bytes — the DOM itself never outlives that
//! call, let alone crosses an `.await`.

use std::path::PathBuf;

use url::Url;

use crate::dom::ResourceKind;
use crate::paths::resolve_save_path;

/// What a discovered resource is, once classified by [`crate::dom`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AssetKind {
    Stylesheet,
    Script,
    Image,
}

impl AssetKind {
    fn from_resource_kind(kind: ResourceKind) -> Option<Self> {
        match kind {
            ResourceKind::Stylesheet => Some(AssetKind::Stylesheet),
            ResourceKind::Script => Some(AssetKind::Script),
            ResourceKind::Image => Some(AssetKind::Image),
            ResourceKind::Link => None,
        }
    }
}

/// Which stage gave up on an item. The item still traverses every remaining
/// stage so ack accounting is preserved; this just records where it stopped
/// actually making progress.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Download,
    Parse,
    Save,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Stage::Download => "download",
            Stage::Parse => "parse",
            Stage::Save => "save",
        })
    }
}

/// A page discovered by link traversal: bytes are filled in by the fetch
/// stage and rewritten in place by the parse stage.
pub struct Page {
    pub url: Url,
    pub bytes: Option<Vec<u8>>,
    pub skipped_on: Option<Stage>,
}

impl Page {
    pub fn new(url: Url) -> Self {
        Self { url, bytes: None, skipped_on: None }
    }

    pub fn save_path(&self) -> PathBuf {
        resolve_save_path(&self.url, "index", "html")
    }
}

/// A non-HTML resource referenced by a page: a stylesheet, script, or image.
pub struct Asset {
    pub url: Url,
    pub kind: AssetKind,
    pub bytes: Option<Vec<u8>>,
    pub skipped_on: Option<Stage>,
}

impl Asset {
    pub fn new(url: Url, kind: AssetKind) -> Self {
        Self { url, kind, bytes: None, skipped_on: None }
    }

    pub fn save_path(&self) -> PathBuf {
        resolve_save_path(&self.url, "", "")
    }
}

/// Tagged union of everything the queue, fetch stage, and save stage move
/// around.
pub enum WorkItem {
    Page(Page),
    Asset(Asset),
}

impl WorkItem {
    pub fn item_id(&self) -> &str {
        match self {
            WorkItem::Page(p) => p.url.as_str(),
            WorkItem::Asset(a) => a.url.as_str(),
        }
    }

    pub fn url(&self) -> &Url {
        match self {
            WorkItem::Page(p) => &p.url,
            WorkItem::Asset(a) => &a.url,
        }
    }

    pub fn bytes(&self) -> Option<&[u8]> {
        match self {
            WorkItem::Page(p) => p.bytes.as_deref(),
            WorkItem::Asset(a) => a.bytes.as_deref(),
        }
    }

    pub fn set_bytes(&mut self, bytes: Vec<u8>) {
        match self {
            WorkItem::Page(p) => p.bytes = Some(bytes),
            WorkItem::Asset(a) => a.bytes = Some(bytes),
        }
    }

    pub fn skipped_on(&self) -> Option<Stage> {
        match self {
            WorkItem::Page(p) => p.skipped_on,
            WorkItem::Asset(a) => a.skipped_on,
        }
    }

    /// Records which stage gave up on this item. The item keeps flowing to
    /// whatever stage comes next rather than being dropped.
    pub fn mark_skipped(&mut self, stage: Stage) {
        match self {
            WorkItem::Page(p) => p.skipped_on = Some(stage),
            WorkItem::Asset(a) => a.skipped_on = Some(stage),
        }
    }

    pub fn is_page(&self) -> bool {
        matches!(self, WorkItem::Page(_))
    }
}

/// Builds the child [`WorkItem`] for a resource discovered on a page.
pub fn child_from_resource(url: Url, kind: ResourceKind) -> WorkItem {
    match AssetKind::from_resource_kind(kind) {
        Some(asset_kind) => WorkItem::Asset(Asset::new(url, asset_kind)),
        None => WorkItem::Page(Page::new(url)),
    }
}

/// The save path a resource of `kind` will end up at, using the same
/// fallback-name/extension rules as [`Page::save_path`] and [`Asset::save_path`].
/// Pure and independent of whether the resource was ever actually fetched —
/// this is what lets rewriting run immediately after parsing.
pub fn save_path_for_resource(url: &Url, kind: ResourceKind) -> PathBuf {
    match kind {
        ResourceKind::Link => resolve_save_path(url, "index", "html"),
        ResourceKind::Stylesheet | ResourceKind::Script | ResourceKind::Image => {
            resolve_save_path(url, "", "")
        }
    }
}
