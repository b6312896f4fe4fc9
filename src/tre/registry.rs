//! Process-wide TRE handler registry.
//!
//! The registry maps a 6-character tag to the layout descriptors that can
//! decode it. Handlers are loaded from JSON descriptor files in a plugin
//! directory (`NITF_PLUGIN_PATH` by convention) during initialization;
//! lookups after that are read-only and may come from any thread.
//!
//! A descriptor file that fails to load is logged and skipped; parsing a
//! file that carries such a tag then falls back to the raw-bytes handler,
//! which preserves the payload verbatim.

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, OnceLock, RwLock, RwLockReadGuard};

use tracing::{debug, warn};

use super::{Tre, TreDescriptor};
use crate::error::TreError;

/// Environment variable naming the plugin directory.
pub const PLUGIN_PATH_ENV: &str = "NITF_PLUGIN_PATH";

// =============================================================================
// TreRegistry
// =============================================================================

/// A store of layout descriptors keyed by tag.
///
/// Tags need not be unique: a tag may carry several descriptor variants,
/// distinguished by the descriptor's `variant` id. The first registered
/// descriptor for a tag is its default.
#[derive(Debug, Default)]
pub struct TreRegistry {
    handlers: HashMap<String, Vec<Arc<TreDescriptor>>>,
}

impl TreRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a descriptor built in code.
    pub fn register(&mut self, descriptor: TreDescriptor) {
        self.handlers
            .entry(descriptor.tag.trim().to_string())
            .or_default()
            .push(Arc::new(descriptor));
    }

    /// Load every `*.json` descriptor in a directory.
    ///
    /// Files are visited in name order so registration is deterministic.
    /// A file that cannot be read or parsed is logged at `warn` and
    /// skipped; its tag simply stays unhandled. Returns the number of
    /// descriptors loaded.
    pub fn load_dir(&mut self, dir: impl AsRef<Path>) -> Result<usize, TreError> {
        let dir = dir.as_ref();
        let mut entries: Vec<_> = std::fs::read_dir(dir)
            .map_err(|err| TreError::BadDescriptor {
                path: dir.display().to_string(),
                message: err.to_string(),
            })?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .collect();
        entries.sort();

        let mut loaded = 0;
        for path in entries {
            let path_str = path.display().to_string();
            let json = match std::fs::read_to_string(&path) {
                Ok(json) => json,
                Err(err) => {
                    warn!("skipping TRE descriptor {}: {}", path_str, err);
                    continue;
                }
            };
            match TreDescriptor::from_json(&path_str, &json) {
                Ok(descriptor) => {
                    debug!("loaded TRE handler {} from {}", descriptor.tag, path_str);
                    self.register(descriptor);
                    loaded += 1;
                }
                Err(err) => {
                    warn!("skipping TRE descriptor {}: {}", path_str, err);
                }
            }
        }
        Ok(loaded)
    }

    /// Whether a handler is registered for this tag.
    pub fn can_handle(&self, tag: &str) -> bool {
        self.handlers.contains_key(tag.trim())
    }

    /// Number of registered descriptors across all tags.
    pub fn len(&self) -> usize {
        self.handlers.values().map(Vec::len).sum()
    }

    /// True if no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Remove every handler. The raw-bytes fallback remains, as always.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    /// Fetch the descriptor for a tag, optionally selecting a variant.
    pub fn descriptor(&self, tag: &str, variant: Option<&str>) -> Option<Arc<TreDescriptor>> {
        let candidates = self.handlers.get(tag.trim())?;
        match variant {
            Some(id) => candidates
                .iter()
                .find(|descriptor| descriptor.variant.as_deref() == Some(id))
                .cloned(),
            None => candidates.first().cloned(),
        }
    }

    /// Construct an empty TRE for a tag.
    ///
    /// # Errors
    /// [`TreError::UnknownTag`] when no handler (or no matching variant)
    /// is registered. Callers wanting the fallback behavior can construct
    /// [`Tre::raw`] instead.
    pub fn construct(&self, tag: &str, variant: Option<&str>) -> Result<Tre, TreError> {
        let descriptor = self
            .descriptor(tag, variant)
            .ok_or_else(|| TreError::UnknownTag(tag.to_string()))?;
        Tre::from_descriptor(descriptor)
    }

    /// Decode a payload for a tag, falling back to raw bytes.
    ///
    /// The fallback covers both unknown tags and payloads that do not
    /// match their descriptor (logged at `warn`); either way the caller
    /// gets a TRE that re-serializes to the original bytes.
    pub fn parse_payload(&self, tag: &str, payload: &[u8]) -> Tre {
        match self.descriptor(tag, None) {
            Some(descriptor) => match Tre::parse(descriptor, payload) {
                Ok(tre) => tre,
                Err(err) => {
                    warn!("TRE {} payload did not match its handler ({}); carrying raw", tag, err);
                    Tre::raw(tag, payload)
                }
            },
            None => {
                debug!("no handler for TRE {}; carrying raw", tag);
                Tre::raw(tag, payload)
            }
        }
    }
}

// =============================================================================
// Process-wide instance
// =============================================================================

static GLOBAL: OnceLock<RwLock<TreRegistry>> = OnceLock::new();

impl TreRegistry {
    /// The process-wide registry.
    ///
    /// On first access the registry initializes itself from the directory
    /// named by `NITF_PLUGIN_PATH`, if set. Registration through the
    /// write lock must happen before readers and writers are active;
    /// afterwards treat it as read-only.
    pub fn global() -> &'static RwLock<TreRegistry> {
        GLOBAL.get_or_init(|| {
            let mut registry = TreRegistry::new();
            if let Ok(dir) = std::env::var(PLUGIN_PATH_ENV) {
                match registry.load_dir(&dir) {
                    Ok(count) => debug!("loaded {} TRE handlers from {}", count, dir),
                    Err(err) => warn!("could not load TRE handlers from {}: {}", dir, err),
                }
            }
            RwLock::new(registry)
        })
    }

    /// Read access to the process-wide registry.
    pub fn global_read() -> RwLockReadGuard<'static, TreRegistry> {
        match Self::global().read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tre::{DescriptorKind, FieldDef, FieldSpec};

    fn descriptor(tag: &str, variant: Option<&str>) -> TreDescriptor {
        TreDescriptor {
            tag: tag.to_string(),
            variant: variant.map(str::to_string),
            fields: vec![FieldSpec::Field(FieldDef {
                name: "BODY".to_string(),
                kind: DescriptorKind::A,
                len: 4,
                default: None,
            })],
        }
    }

    #[test]
    fn test_register_and_construct() {
        let mut registry = TreRegistry::new();
        registry.register(descriptor("TSTTAG", None));

        assert!(registry.can_handle("TSTTAG"));
        assert!(!registry.can_handle("NOPE"));

        let tre = registry.construct("TSTTAG", None).unwrap();
        assert_eq!(tre.tag(), "TSTTAG");
        assert!(!tre.is_raw());
    }

    #[test]
    fn test_construct_unknown_tag() {
        let registry = TreRegistry::new();
        let result = registry.construct("FOOBAR", None);
        assert!(matches!(result, Err(TreError::UnknownTag(_))));
    }

    #[test]
    fn test_variant_selection() {
        let mut registry = TreRegistry::new();
        registry.register(descriptor("TSTTAG", None));
        registry.register(descriptor("TSTTAG", Some("alt")));

        assert!(registry.descriptor("TSTTAG", Some("alt")).is_some());
        assert!(registry.descriptor("TSTTAG", Some("missing")).is_none());
        // Default is the first registered
        assert_eq!(registry.descriptor("TSTTAG", None).unwrap().variant, None);
    }

    #[test]
    fn test_parse_payload_falls_back_to_raw() {
        let registry = TreRegistry::new();
        let tre = registry.parse_payload("FOOBAR", b"opaque");
        assert!(tre.is_raw());
        let bytes = tre.serialize().unwrap();
        assert_eq!(&bytes[..], b"FOOBAR00006opaque");
    }

    #[test]
    fn test_parse_payload_bad_fit_falls_back_to_raw() {
        let mut registry = TreRegistry::new();
        registry.register(descriptor("TSTTAG", None));
        // Payload longer than the 4-byte layout: carried raw
        let tre = registry.parse_payload("TSTTAG", b"too-long-for-layout");
        assert!(tre.is_raw());
    }

    #[test]
    fn test_load_dir_skips_bad_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("a_good.json"),
            r#"{ "tag": "GOODIE", "fields": [
                { "field": { "name": "X", "kind": "A", "len": 2 } }
            ] }"#,
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.json"), "{ not json").unwrap();
        std::fs::write(dir.path().join("ignored.txt"), "not a descriptor").unwrap();

        let mut registry = TreRegistry::new();
        let loaded = registry.load_dir(dir.path()).unwrap();
        assert_eq!(loaded, 1);
        assert!(registry.can_handle("GOODIE"));
    }

    #[test]
    fn test_load_missing_dir_fails() {
        let mut registry = TreRegistry::new();
        assert!(registry.load_dir("/no/such/plugin/dir").is_err());
    }

    #[test]
    fn test_clear() {
        let mut registry = TreRegistry::new();
        registry.register(descriptor("TSTTAG", None));
        assert_eq!(registry.len(), 1);
        registry.clear();
        assert!(registry.is_empty());
    }
}
