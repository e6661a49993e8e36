//! In-memory archive cache shared by every compile request.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use crate::archive::Archive;
use crate::error::TypeRegistrationError;
use crate::types::{TypeRegistry, TypeSnapshot};

#[derive(Debug, Default)]
struct StoreInner {
    archives: HashMap<String, Arc<Archive>>,
    types: TypeRegistry,
}

/// Import path -> archive, plus the matching type registry.
///
/// Both maps live behind one lock: a path is either archived and typed, or
/// neither. Entries are never replaced or removed.
#[derive(Debug, Default)]
pub struct ArchiveStore {
    inner: RwLock<StoreInner>,
}

impl ArchiveStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, import_path: &str) -> Option<Arc<Archive>> {
        self.inner.read().archives.get(import_path).cloned()
    }

    pub fn contains(&self, import_path: &str) -> bool {
        self.inner.read().archives.contains_key(import_path)
    }

    /// Registers the archive's types and stores it in one step.
    ///
    /// If the path is already present with compatible types the stored
    /// archive is returned and the argument is dropped. On a type collision
    /// nothing is inserted.
    pub fn insert(&self, archive: Archive) -> Result<Arc<Archive>, TypeRegistrationError> {
        let mut inner = self.inner.write();
        // Stored paths are checked too: a differently shaped copy is an error.
        inner.types.register(&archive)?;
        if let Some(existing) = inner.archives.get(&archive.import_path) {
            return Ok(existing.clone());
        }
        let archive = Arc::new(archive);
        inner
            .archives
            .insert(archive.import_path.clone(), archive.clone());
        Ok(archive)
    }

    pub fn types(&self) -> TypeSnapshot {
        self.inner.read().types.snapshot()
    }

    pub fn len(&self) -> usize {
        self.inner.read().archives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Stored import paths in sorted order.
    pub fn paths(&self) -> Vec<String> {
        let mut paths: Vec<_> = self.inner.read().archives.keys().cloned().collect();
        paths.sort_unstable();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ExportedSymbol;

    #[test]
    fn insert_archives_and_registers_types_together() {
        let store = ArchiveStore::new();
        let archive = Archive::new("errors", "// errors")
            .with_exports(vec![ExportedSymbol::new("New", "func(string) error")]);
        store.insert(archive).expect("insert");
        assert!(store.contains("errors"));
        assert_eq!(store.types().lookup("errors", "New"), Some("func(string) error"));
    }

    #[test]
    fn never_replaces_an_existing_path() {
        let store = ArchiveStore::new();
        let first = store.insert(Archive::new("fmt", "// first")).expect("insert");
        let second = store.insert(Archive::new("fmt", "// second")).expect("insert");
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(store.get("fmt").expect("stored").code, "// first");
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn reinsert_with_conflicting_signature_is_rejected() {
        let store = ArchiveStore::new();
        let fetched = Archive::new("fmt", "// fetched")
            .with_exports(vec![ExportedSymbol::new("Println", "func(int)")]);
        store.insert(fetched).expect("insert");

        let compatible = Archive::new("fmt", "// again")
            .with_exports(vec![ExportedSymbol::new("Println", "func(int)")]);
        assert_eq!(store.insert(compatible).expect("compatible").code, "// fetched");

        let conflicting = Archive::new("fmt", "// bundled")
            .with_exports(vec![ExportedSymbol::new("Println", "func() string")]);
        let err = store.insert(conflicting).unwrap_err();
        assert_eq!(err.symbol, "Println");
        assert_eq!(err.existing, "func(int)");
        assert_eq!(store.types().lookup("fmt", "Println"), Some("func(int)"));
    }

    #[test]
    fn type_collision_inserts_nothing() {
        let store = ArchiveStore::new();
        let archive = Archive::new("bad", "").with_exports(vec![
            ExportedSymbol::new("X", "int"),
            ExportedSymbol::new("X", "string"),
        ]);
        assert!(store.insert(archive).is_err());
        assert!(!store.contains("bad"));
        assert!(store.types().package("bad").is_none());
        assert!(store.is_empty());
    }
}
