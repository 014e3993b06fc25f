// Import resolution: logical names to parsed schemas, cached by canonical
// name

use std::cell::RefCell;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::error::LoadError;
use crate::ksy::parse_schema;
use crate::schema::Struct;

/// Where schema sources come from. The resolver is agnostic to the backing
/// store; the CLI uses the filesystem, tests use an in-memory map.
pub trait SchemaSource {
    fn open(&self, name: &str) -> io::Result<Box<dyn io::Read>>;
}

/// Filesystem-backed source. Names resolve relative to the process working
/// directory (or absolutely).
pub struct FsSource;

impl SchemaSource for FsSource {
    fn open(&self, name: &str) -> io::Result<Box<dyn io::Read>> {
        Ok(Box::new(fs::File::open(name)?))
    }
}

/// In-memory source for tests.
#[derive(Default)]
pub struct MemorySource {
    files: FxHashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, body: impl Into<String>) {
        self.files.insert(name.into(), body.into());
    }
}

impl SchemaSource for MemorySource {
    fn open(&self, name: &str) -> io::Result<Box<dyn io::Read>> {
        match self.files.get(name) {
            Some(body) => Ok(Box::new(io::Cursor::new(body.clone().into_bytes()))),
            None => Err(io::Error::new(io::ErrorKind::NotFound, name.to_string())),
        }
    }
}

/// Resolver with a write-once cache keyed by canonical name. Queries for
/// the same canonical name return the identical schema value.
pub struct Resolver {
    source: Box<dyn SchemaSource>,
    cache: RefCell<FxHashMap<String, Rc<Struct>>>,
}

impl Resolver {
    pub fn new(source: impl SchemaSource + 'static) -> Self {
        Self {
            source: Box::new(source),
            cache: RefCell::new(FxHashMap::default()),
        }
    }

    pub fn from_fs() -> Self {
        Self::new(FsSource)
    }

    /// Resolve a logical name. When `from` is empty, `to` is absolute;
    /// otherwise `to` is taken relative to `from`'s directory. Candidates
    /// are `{to}.ksy` then `{to}`; a file that opens but fails to parse is
    /// terminal.
    pub fn resolve(&self, from: &str, to: &str) -> Result<(String, Rc<Struct>), LoadError> {
        let canonical = if from.is_empty() {
            to.to_string()
        } else {
            let dir = Path::new(from).parent().unwrap_or_else(|| Path::new(""));
            path_to_name(&dir.join(to))
        };
        if let Some(cached) = self.cache.borrow().get(&canonical) {
            return Ok((canonical, Rc::clone(cached)));
        }
        let candidates = [format!("{}.ksy", canonical), canonical.clone()];
        for candidate in &candidates {
            let reader = match self.source.open(candidate) {
                Ok(reader) => reader,
                Err(_) => continue,
            };
            let schema = parse_schema(reader).map_err(|e| {
                LoadError::with_source(format!("error loading {:?}", candidate), e)
            })?;
            let schema = Rc::new(schema);
            self.cache
                .borrow_mut()
                .insert(canonical.clone(), Rc::clone(&schema));
            return Ok((canonical, schema));
        }
        Err(LoadError::new(format!(
            "failed to load schema {:?} from {:?} (checked {:?})",
            to, from, candidates
        )))
    }
}

fn path_to_name(path: &PathBuf) -> String {
    // Keep logical names in forward-slash form regardless of host.
    let s = path.to_string_lossy().into_owned();
    if std::path::MAIN_SEPARATOR == '/' {
        s
    } else {
        s.replace(std::path::MAIN_SEPARATOR, "/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolver() -> Resolver {
        let mut source = MemorySource::new();
        source.insert(
            "formats/outer.ksy",
            "meta:\n  id: outer\n  imports:\n    - inner\nseq: []\n",
        );
        source.insert("formats/inner.ksy", "meta:\n  id: inner\nseq: []\n");
        source.insert("bad.ksy", "meta:\n  endian: sideways\n");
        Resolver::new(source)
    }

    #[test]
    fn test_resolve_absolute_and_relative() {
        let r = resolver();
        let (name, outer) = r.resolve("", "formats/outer").unwrap();
        assert_eq!(name, "formats/outer");
        assert_eq!(outer.id, "outer");

        // Relative to the importing file's directory.
        let (name, inner) = r.resolve("formats/outer", "inner").unwrap();
        assert_eq!(name, "formats/inner");
        assert_eq!(inner.id, "inner");
    }

    #[test]
    fn test_cache_returns_identical_struct() {
        let r = resolver();
        let (_, a) = r.resolve("", "formats/inner").unwrap();
        let (_, b) = r.resolve("formats/outer", "inner").unwrap();
        assert!(Rc::ptr_eq(&a, &b));
    }

    #[test]
    fn test_parse_error_is_terminal() {
        let r = resolver();
        let err = r.resolve("", "bad").unwrap_err();
        assert!(err.to_string().contains("error loading"));
    }

    #[test]
    fn test_missing_lists_candidates() {
        let r = resolver();
        let err = r.resolve("", "absent").unwrap_err();
        assert!(err.to_string().contains("absent.ksy"));
    }
}
