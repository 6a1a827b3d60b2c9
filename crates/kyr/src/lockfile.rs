//! Lockfile parsing.
//!
//! A parser turns file content into `name -> version` pins. Malformed input
//! yields an empty map rather than an error: a broken lockfile in one
//! repository must not stop a pull.

use std::collections::BTreeMap;
use std::sync::Arc;

use toml_edit::DocumentMut;

/// Extracts pinned versions from one kind of lockfile.
pub trait LockfileParser: Send + Sync {
    /// Ecosystem the pins belong to, stored as the dependency language.
    fn language(&self) -> &'static str;

    /// File name this parser handles, e.g. `poetry.lock`.
    fn file_name(&self) -> &'static str;

    fn parse(&self, content: &str) -> BTreeMap<String, String>;
}

/// `poetry.lock`
#[derive(Debug, Default, Clone, Copy)]
pub struct PoetryLock;

impl LockfileParser for PoetryLock {
    fn language(&self) -> &'static str {
        "python"
    }

    fn file_name(&self) -> &'static str {
        "poetry.lock"
    }

    fn parse(&self, content: &str) -> BTreeMap<String, String> {
        parse_package_tables(content)
    }
}

/// `Cargo.lock`
#[derive(Debug, Default, Clone, Copy)]
pub struct CargoLock;

impl LockfileParser for CargoLock {
    fn language(&self) -> &'static str {
        "rust"
    }

    fn file_name(&self) -> &'static str {
        "Cargo.lock"
    }

    fn parse(&self, content: &str) -> BTreeMap<String, String> {
        parse_package_tables(content)
    }
}

/// Both formats list packages as a `[[package]]` array with `name` and
/// `version` keys. A name locked at several versions keeps the last one.
fn parse_package_tables(content: &str) -> BTreeMap<String, String> {
    let doc = match content.parse::<DocumentMut>() {
        Ok(doc) => doc,
        Err(e) => {
            tracing::debug!(error = %e, "unparseable lockfile");
            return BTreeMap::new();
        }
    };

    let Some(packages) = doc.get("package").and_then(|p| p.as_array_of_tables()) else {
        return BTreeMap::new();
    };

    packages
        .iter()
        .filter_map(|table| {
            let name = table.get("name")?.as_str()?;
            let version = table.get("version")?.as_str()?;
            Some((name.to_string(), version.to_string()))
        })
        .collect()
}

/// Parsers selected by the file name of a fetched path.
#[derive(Clone)]
pub struct ParserRegistry {
    parsers: Vec<Arc<dyn LockfileParser>>,
}

impl ParserRegistry {
    #[must_use]
    pub fn empty() -> Self {
        Self {
            parsers: Vec::new(),
        }
    }

    #[must_use]
    pub fn with(mut self, parser: impl LockfileParser + 'static) -> Self {
        self.parsers.push(Arc::new(parser));
        self
    }

    /// The parser for `path`, matched on its last segment.
    #[must_use]
    pub fn for_path(&self, path: &str) -> Option<&dyn LockfileParser> {
        let file_name = path.rsplit('/').next().unwrap_or(path);
        self.parsers
            .iter()
            .find(|p| p.file_name() == file_name)
            .map(|p| &**p)
    }
}

impl Default for ParserRegistry {
    fn default() -> Self {
        Self::empty().with(PoetryLock).with(CargoLock)
    }
}

impl std::fmt::Debug for ParserRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list()
            .entries(self.parsers.iter().map(|p| p.file_name()))
            .finish()
    }
}
