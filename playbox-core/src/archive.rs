//! Compiled package archives.
//!
//! An archive is one fully compiled package: its import path, the packages it
//! imports, the symbols it exports and the generated code fragment. Archives
//! are produced by the external toolchain and travel as JSON.

use serde::{Deserialize, Serialize};

use crate::error::ArchiveFormatError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportedSymbol {
    pub name: String,
    /// Type signature as rendered by the toolchain; compared verbatim.
    pub signature: String,
}

impl ExportedSymbol {
    pub fn new(name: impl Into<String>, signature: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            signature: signature.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Archive {
    pub import_path: String,
    /// Package name as declared in source; defaults to the last path segment.
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub imports: Vec<String>,
    #[serde(default)]
    pub exports: Vec<ExportedSymbol>,
    pub code: String,
}

impl Archive {
    pub fn new(import_path: impl Into<String>, code: impl Into<String>) -> Self {
        let import_path = import_path.into();
        Self {
            name: default_name(&import_path),
            import_path,
            imports: Vec::new(),
            exports: Vec::new(),
            code: code.into(),
        }
    }

    pub fn with_imports<I, S>(mut self, imports: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.imports = imports.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_exports(mut self, exports: Vec<ExportedSymbol>) -> Self {
        self.exports = exports;
        self
    }

    /// Parses an archive fetched for `expected_path`.
    pub fn read(expected_path: &str, bytes: &[u8]) -> Result<Self, ArchiveFormatError> {
        let archive = Self::from_slice(bytes)
            .map_err(|reason| ArchiveFormatError::new(expected_path, reason))?;
        if archive.import_path != expected_path {
            return Err(ArchiveFormatError::new(
                expected_path,
                format!("archive declares import path {}", archive.import_path),
            ));
        }
        Ok(archive)
    }

    /// Parses an archive without checking which path it was requested as.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, String> {
        let mut archive: Archive = serde_json::from_slice(bytes).map_err(|e| e.to_string())?;
        if archive.import_path.is_empty() {
            return Err("archive has an empty import path".to_string());
        }
        if archive.name.is_empty() {
            archive.name = default_name(&archive.import_path);
        }
        Ok(archive)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }
}

fn default_name(import_path: &str) -> String {
    import_path
        .rsplit('/')
        .next()
        .unwrap_or(import_path)
        .to_string()
}
