//! Exported type information of resolved packages.
//!
//! Frontends type-check the entry program against this registry so that
//! references into previously resolved packages resolve. Entries are keyed
//! by import path and, like archives, are never replaced.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use crate::archive::Archive;
use crate::error::TypeRegistrationError;

/// Exported symbols of one package, name -> signature.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackageTypes {
    pub import_path: String,
    pub name: String,
    pub symbols: BTreeMap<String, String>,
}

impl PackageTypes {
    /// Collects the exports of an archive.
    ///
    /// An archive may list the same symbol twice only with the same
    /// signature.
    pub fn from_archive(archive: &Archive) -> Result<Self, TypeRegistrationError> {
        let mut symbols: BTreeMap<String, String> = BTreeMap::new();
        for export in &archive.exports {
            if let Some(existing) = symbols.get(&export.name) {
                if symbol_check(existing, &export.signature) == SymbolCheck::Conflict {
                    return Err(TypeRegistrationError {
                        path: archive.import_path.clone(),
                        symbol: export.name.clone(),
                        existing: existing.clone(),
                        incoming: export.signature.clone(),
                    });
                }
                continue;
            }
            symbols.insert(export.name.clone(), export.signature.clone());
        }
        Ok(Self {
            import_path: archive.import_path.clone(),
            name: archive.name.clone(),
            symbols,
        })
    }

    pub fn lookup(&self, symbol: &str) -> Option<&str> {
        self.symbols.get(symbol).map(String::as_str)
    }
}

/// Result of comparing a registered signature with an incoming one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SymbolCheck {
    /// Same shape; registering again is a no-op.
    Same,
    /// Different shape for the same symbol.
    Conflict,
}

/// Signatures are compared after collapsing whitespace runs.
pub fn symbol_check(existing: &str, incoming: &str) -> SymbolCheck {
    let normalize = |s: &str| s.split_whitespace().collect::<Vec<_>>().join(" ");
    if normalize(existing) == normalize(incoming) {
        SymbolCheck::Same
    } else {
        SymbolCheck::Conflict
    }
}

#[derive(Debug, Default)]
pub struct TypeRegistry {
    packages: HashMap<String, Arc<PackageTypes>>,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validates an archive against the registry without modifying it.
    ///
    /// Returns the types to insert, or `None` when the path is already
    /// registered with compatible symbols.
    fn prepare(
        &self,
        archive: &Archive,
    ) -> Result<Option<Arc<PackageTypes>>, TypeRegistrationError> {
        let incoming = PackageTypes::from_archive(archive)?;
        let Some(existing) = self.packages.get(&archive.import_path) else {
            return Ok(Some(Arc::new(incoming)));
        };
        for (symbol, signature) in &incoming.symbols {
            if let Some(registered) = existing.lookup(symbol) {
                if symbol_check(registered, signature) == SymbolCheck::Conflict {
                    return Err(TypeRegistrationError {
                        path: archive.import_path.clone(),
                        symbol: symbol.clone(),
                        existing: registered.to_string(),
                        incoming: signature.clone(),
                    });
                }
            }
        }
        Ok(None)
    }

    /// Inserts prepared types. Existing paths are left untouched.
    fn insert(&mut self, types: Arc<PackageTypes>) {
        self.packages
            .entry(types.import_path.clone())
            .or_insert(types);
    }

    /// Validates and inserts in one step; on error nothing changes.
    pub fn register(&mut self, archive: &Archive) -> Result<(), TypeRegistrationError> {
        if let Some(types) = self.prepare(archive)? {
            self.insert(types);
        }
        Ok(())
    }

    pub fn get(&self, import_path: &str) -> Option<Arc<PackageTypes>> {
        self.packages.get(import_path).cloned()
    }

    pub fn contains(&self, import_path: &str) -> bool {
        self.packages.contains_key(import_path)
    }

    pub fn snapshot(&self) -> TypeSnapshot {
        TypeSnapshot {
            packages: Arc::new(self.packages.clone()),
        }
    }
}

/// Read-only view of the registry handed to frontends.
#[derive(Debug, Clone, Default)]
pub struct TypeSnapshot {
    packages: Arc<HashMap<String, Arc<PackageTypes>>>,
}

impl TypeSnapshot {
    pub fn package(&self, import_path: &str) -> Option<&PackageTypes> {
        self.packages.get(import_path).map(Arc::as_ref)
    }

    pub fn lookup(&self, import_path: &str, symbol: &str) -> Option<&str> {
        self.package(import_path)?.lookup(symbol)
    }

    pub fn len(&self) -> usize {
        self.packages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.packages.is_empty()
    }

    /// Import paths in sorted order.
    pub fn paths(&self) -> Vec<&str> {
        let mut paths: Vec<_> = self.packages.keys().map(String::as_str).collect();
        paths.sort_unstable();
        paths
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::ExportedSymbol;

    fn fmt_archive(signature: &str) -> Archive {
        Archive::new("fmt", "").with_exports(vec![ExportedSymbol::new("Println", signature)])
    }

    #[test]
    fn registers_and_looks_up_symbols() {
        let mut registry = TypeRegistry::new();
        registry
            .register(&fmt_archive("func(a ...any) (int, error)"))
            .expect("register");
        let snapshot = registry.snapshot();
        assert_eq!(
            snapshot.lookup("fmt", "Println"),
            Some("func(a ...any) (int, error)")
        );
        assert_eq!(snapshot.paths(), ["fmt"]);
    }

    #[test]
    fn re_registering_the_same_shape_is_a_no_op() {
        let mut registry = TypeRegistry::new();
        registry
            .register(&fmt_archive("func(a ...any) (int, error)"))
            .expect("register");
        let prepared = registry
            .prepare(&fmt_archive("func(a  ...any)  (int, error)"))
            .expect("compatible");
        assert!(prepared.is_none());
    }

    #[test]
    fn rejects_differently_shaped_symbol_for_same_path() {
        let mut registry = TypeRegistry::new();
        registry
            .register(&fmt_archive("func(a ...any) (int, error)"))
            .expect("register");
        let err = registry.register(&fmt_archive("func() int")).unwrap_err();
        assert_eq!(err.path, "fmt");
        assert_eq!(err.symbol, "Println");
        assert_eq!(err.incoming, "func() int");
    }

    #[test]
    fn rejects_conflicting_duplicate_inside_one_archive() {
        let archive = Archive::new("strings", "").with_exports(vec![
            ExportedSymbol::new("Repeat", "func(string, int) string"),
            ExportedSymbol::new("Repeat", "func(string) string"),
        ]);
        assert!(PackageTypes::from_archive(&archive).is_err());
    }

    #[test]
    fn snapshot_is_isolated_from_later_registrations() {
        let mut registry = TypeRegistry::new();
        let before = registry.snapshot();
        registry
            .register(&fmt_archive("func()"))
            .expect("register");
        assert!(before.is_empty());
        assert_eq!(registry.snapshot().len(), 1);
    }
}
