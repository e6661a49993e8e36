//! Decoding of values that cross the script boundary.
//!
//! Everything here is plain data in, plain data out, so it runs (and is
//! tested) outside the browser.

use std::collections::BTreeMap;
use std::sync::Arc;

use playbox_core::types::TypeSnapshot;
use playbox_core::{Archive, FetchError, FetchErrorKind, Position, SourceError};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("frontend returned malformed JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("frontend returned an invalid archive: {0}")]
    Archive(String),
}

impl From<DecodeError> for Vec<SourceError> {
    fn from(error: DecodeError) -> Self {
        vec![SourceError::unlocated(error.to_string())]
    }
}

#[derive(Deserialize)]
struct RawDiagnostic {
    #[serde(default)]
    position: Option<Position>,
    /// Byte offset into the parsed file, used when `position` is absent.
    #[serde(default)]
    offset: Option<usize>,
    message: String,
}

/// Turns whatever the frontend threw into source errors.
///
/// The expected shape is `[{position?: {file, line, column}, offset?, message}]`;
/// `locate` maps an offset to a position. Anything else becomes one
/// unlocated error carrying the raw text.
pub fn decode_diagnostics(
    raised: &str,
    locate: impl Fn(usize) -> Option<Position>,
) -> Vec<SourceError> {
    match serde_json::from_str::<Vec<RawDiagnostic>>(raised) {
        Ok(raw) if !raw.is_empty() => raw
            .into_iter()
            .map(|diagnostic| SourceError {
                position: diagnostic
                    .position
                    .or_else(|| diagnostic.offset.and_then(&locate)),
                message: diagnostic.message,
            })
            .collect(),
        _ if raised.trim().is_empty() => {
            vec![SourceError::unlocated("frontend failed without diagnostics")]
        }
        _ => vec![SourceError::unlocated(raised)],
    }
}

pub fn decode_imports(json: &str) -> Result<Vec<String>, DecodeError> {
    Ok(serde_json::from_str(json)?)
}

/// Reads the entry archive; it always carries the entry package's path.
pub fn decode_archive(package: &str, json: &str) -> Result<Archive, DecodeError> {
    let mut value: serde_json::Value = serde_json::from_str(json)?;
    if let Some(object) = value.as_object_mut() {
        object.insert("import_path".into(), package.into());
    }
    let bytes = serde_json::to_vec(&value)?;
    Archive::from_slice(&bytes).map_err(DecodeError::Archive)
}

/// `{import path: {symbol: signature}}` for the snapshot plus the packages
/// imported during this compile.
pub fn types_json(snapshot: &TypeSnapshot, imported: &[Arc<Archive>]) -> String {
    let mut packages: BTreeMap<&str, BTreeMap<&str, &str>> = BTreeMap::new();
    for path in snapshot.paths() {
        if let Some(types) = snapshot.package(path) {
            packages.insert(
                path,
                types
                    .symbols
                    .iter()
                    .map(|(name, signature)| (name.as_str(), signature.as_str()))
                    .collect(),
            );
        }
    }
    for archive in imported {
        packages
            .entry(archive.import_path.as_str())
            .or_insert_with(|| {
                archive
                    .exports
                    .iter()
                    .map(|e| (e.name.as_str(), e.signature.as_str()))
                    .collect()
            });
    }
    serde_json::to_string(&packages).unwrap_or_else(|_| "{}".to_string())
}

/// Message for a value raised while evaluating a program.
pub fn runtime_message(is_error: bool, text: &str) -> String {
    if is_error {
        text.to_string()
    } else {
        format!("compiled code panicked: {text}")
    }
}

#[derive(Deserialize)]
struct FetchResponse {
    status: u16,
    body: String,
}

pub fn decode_fetch_response(url: &str, json: &str) -> Result<Vec<u8>, FetchError> {
    let response: FetchResponse = serde_json::from_str(json)
        .map_err(|e| FetchError::new(url, FetchErrorKind::Io(e.to_string())))?;
    match response.status {
        200..=299 => Ok(response.body.into_bytes()),
        404 => Err(FetchError::new(url, FetchErrorKind::NotFound)),
        // A synchronous XHR reports network failures as status 0.
        0 => Err(FetchError::new(
            url,
            FetchErrorKind::Transport("request failed".to_string()),
        )),
        code => Err(FetchError::new(url, FetchErrorKind::Status(code))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use playbox_core::{ArchiveStore, ExportedSymbol, FileSet};

    fn nowhere(_: usize) -> Option<Position> {
        None
    }

    #[test]
    fn decodes_located_and_unlocated_diagnostics() {
        let errors = decode_diagnostics(
            r#"[{"position":{"file":"prog","line":3,"column":7},"message":"expected ;"},
                {"message":"too many errors"}]"#,
            nowhere,
        );
        assert_eq!(errors.len(), 2);
        assert_eq!(errors[0].position, Some(Position::new("prog", 3, 7)));
        assert_eq!(errors[1].position, None);
        assert_eq!(errors[0].to_string(), "prog:3:7: expected ;");
    }

    #[test]
    fn non_json_throw_becomes_single_error() {
        let errors = decode_diagnostics("TypeError: frontend.parse is not a function", nowhere);
        assert_eq!(
            errors,
            [SourceError::unlocated("TypeError: frontend.parse is not a function")]
        );
        assert_eq!(decode_diagnostics("[]", nowhere).len(), 1);
    }

    #[test]
    fn offsets_resolve_through_the_file_set() {
        let files = FileSet::new();
        files.add_file("prog", "earlier\n");
        let file = files.add_file("prog", "import \"fmt\"\nfmt.Prinln()\n");
        let errors = decode_diagnostics(
            r#"[{"offset":17,"message":"undefined: fmt.Prinln"},{"message":"one more"}]"#,
            |offset| files.position(file.pos(offset)),
        );
        assert_eq!(errors[0].position, Some(Position::new("prog", 2, 5)));
        assert_eq!(errors[0].to_string(), "prog:2:5: undefined: fmt.Prinln");
        assert_eq!(errors[1].position, None);
    }

    #[test]
    fn archive_takes_entry_package_path() {
        let archive = decode_archive("main", r#"{"imports":["fmt"],"code":"main();"}"#)
            .expect("archive");
        assert_eq!(archive.import_path, "main");
        assert_eq!(archive.imports, ["fmt"]);
        assert!(decode_archive("main", "[1, 2]").is_err());
    }

    #[test]
    fn types_include_store_and_fresh_imports() {
        let store = ArchiveStore::new();
        store
            .insert(Archive::new("errors", "").with_exports(vec![ExportedSymbol::new(
                "New",
                "func(string) error",
            )]))
            .expect("insert");
        let fmt = Arc::new(
            Archive::new("fmt", "")
                .with_exports(vec![ExportedSymbol::new("Println", "func(...any)")]),
        );

        let value: serde_json::Value =
            serde_json::from_str(&types_json(&store.types(), &[fmt])).expect("json");
        assert_eq!(value["errors"]["New"], "func(string) error");
        assert_eq!(value["fmt"]["Println"], "func(...any)");
    }

    #[test]
    fn non_error_throws_are_wrapped() {
        assert_eq!(runtime_message(true, "x is undefined"), "x is undefined");
        assert_eq!(runtime_message(false, "42"), "compiled code panicked: 42");
    }

    #[test]
    fn fetch_statuses_map_to_error_kinds() {
        let url = "./pkg/fmt.a.js";
        assert_eq!(
            decode_fetch_response(url, r#"{"status":200,"body":"{}"}"#).expect("ok"),
            b"{}"
        );
        let not_found = decode_fetch_response(url, r#"{"status":404,"body":""}"#).unwrap_err();
        assert_eq!(not_found.kind, FetchErrorKind::NotFound);
        let unavailable = decode_fetch_response(url, r#"{"status":503,"body":""}"#).unwrap_err();
        assert_eq!(unavailable.kind, FetchErrorKind::Status(503));
        let offline = decode_fetch_response(url, r#"{"status":0,"body":""}"#).unwrap_err();
        assert!(matches!(offline.kind, FetchErrorKind::Transport(_)));
    }
}
