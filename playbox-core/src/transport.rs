//! Where archive bytes come from.

use std::fs;
use std::io;
use std::path::{Component, Path, PathBuf};
#[cfg(feature = "http")]
use std::time::Duration;

use crate::error::{FetchError, FetchErrorKind};

/// Blocking source of archive bytes keyed by import path.
pub trait Transport: Send + Sync {
    fn fetch(&self, import_path: &str) -> Result<Vec<u8>, FetchError>;
}

/// `<base>/pkg/<escaped import path>.a.js`
pub fn archive_url(base_url: &str, import_path: &str) -> String {
    let escaped: Vec<String> = import_path.split('/').map(escape_segment).collect();
    format!(
        "{}/pkg/{}.a.js",
        base_url.trim_end_matches('/'),
        escaped.join("/")
    )
}

fn escape_segment(segment: &str) -> String {
    let mut escaped = String::with_capacity(segment.len());
    for byte in segment.bytes() {
        if byte.is_ascii_alphanumeric() || matches!(byte, b'-' | b'.' | b'_' | b'~') {
            escaped.push(byte as char);
        } else {
            escaped.push_str(&format!("%{byte:02X}"));
        }
    }
    escaped
}

/// Fetches archives over HTTP(S).
#[cfg(feature = "http")]
#[derive(Clone, Debug)]
pub struct HttpTransport {
    base_url: String,
    agent: ureq::Agent,
}

#[cfg(feature = "http")]
impl HttpTransport {
    pub fn new(base_url: &str, timeout: Duration, connect_timeout: Duration) -> Self {
        let agent = ureq::AgentBuilder::new()
            .timeout(timeout)
            .timeout_connect(connect_timeout)
            .build();
        Self {
            base_url: base_url.to_string(),
            agent,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[cfg(feature = "http")]
impl Transport for HttpTransport {
    fn fetch(&self, import_path: &str) -> Result<Vec<u8>, FetchError> {
        use std::io::Read;

        let url = archive_url(&self.base_url, import_path);
        let response = match self.agent.get(&url).call() {
            Ok(response) => response,
            Err(ureq::Error::Status(404, _)) => {
                return Err(FetchError::new(url, FetchErrorKind::NotFound));
            }
            Err(ureq::Error::Status(code, _)) => {
                return Err(FetchError::new(url, FetchErrorKind::Status(code)));
            }
            Err(ureq::Error::Transport(transport)) => {
                return Err(FetchError::new(
                    url,
                    FetchErrorKind::Transport(transport.to_string()),
                ));
            }
        };

        let mut body = Vec::new();
        response
            .into_reader()
            .read_to_end(&mut body)
            .map_err(|e| FetchError::new(url.as_str(), FetchErrorKind::Io(e.to_string())))?;
        Ok(body)
    }
}

/// Serves archives from a local mirror laid out like the remote one.
#[derive(Clone, Debug)]
pub struct DirTransport {
    root: PathBuf,
}

impl DirTransport {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// `None` for import paths that would leave the mirror root.
    pub fn archive_path(&self, import_path: &str) -> Option<PathBuf> {
        let relative = Path::new(import_path);
        let contained = !import_path.is_empty()
            && relative
                .components()
                .all(|component| matches!(component, Component::Normal(_)));
        contained.then(|| self.root.join("pkg").join(format!("{import_path}.a.js")))
    }
}

impl Transport for DirTransport {
    fn fetch(&self, import_path: &str) -> Result<Vec<u8>, FetchError> {
        let Some(path) = self.archive_path(import_path) else {
            return Err(FetchError::new(import_path, FetchErrorKind::NotFound));
        };
        fs::read(&path).map_err(|e| {
            let kind = match e.kind() {
                io::ErrorKind::NotFound => FetchErrorKind::NotFound,
                _ => FetchErrorKind::Io(e.to_string()),
            };
            FetchError::new(path.display().to_string(), kind)
        })
    }
}
