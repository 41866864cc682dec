use std::collections::HashMap;
use std::path::PathBuf;

use crate::common::{CrioError, Result};

/// `file` or `memory`, parsed from a connection string's scheme.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    File,
    Memory,
}

/// The parsed form of `<scheme>://<host>/<path>?<k1>=<v1>&<k2>=<v2>`.
/// `host` is accepted but unused by either recognized scheme; it exists so
/// the grammar round-trips URL-shaped strings embedders are likely to pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionInfo {
    pub kind: BackendKind,
    pub path: PathBuf,
    pub options: HashMap<String, String>,
}

impl ConnectionInfo {
    /// For `file` connections, the companion free-space-list path:
    /// `<path>.fsl`.
    pub fn fsl_path(&self) -> PathBuf {
        companion_path(&self.path, "fsl")
    }

    /// For `file` connections, the companion write-ahead log path:
    /// `<path>.log`.
    pub fn log_path(&self) -> PathBuf {
        companion_path(&self.path, "log")
    }
}

fn companion_path(base: &std::path::Path, suffix: &str) -> PathBuf {
    let mut path_str = base.to_string_lossy().to_string();
    path_str.push('.');
    path_str.push_str(suffix);
    PathBuf::from(path_str)
}

/// Parses a connection string by hand — the grammar is simpler than general
/// URL parsing, so no `url` crate is pulled in for it.
pub fn parse(s: &str) -> Result<ConnectionInfo> {
    let (scheme, rest) = s
        .split_once("://")
        .ok_or_else(|| CrioError::ParseError(format!("missing scheme in {s:?}")))?;

    let kind = match scheme {
        "file" => BackendKind::File,
        "memory" => BackendKind::Memory,
        other => {
            return Err(CrioError::ParseError(format!(
                "unrecognized scheme {other:?}"
            )))
        }
    };

    let (host_and_path, query) = match rest.split_once('?') {
        Some((a, b)) => (a, Some(b)),
        None => (rest, None),
    };

    if host_and_path.is_empty() {
        return Err(CrioError::ParseError(format!(
            "missing path in {s:?}"
        )));
    }

    // The grammar's "host" segment is not otherwise distinguished from the
    // path; everything between "://" and the query string is the path, so
    // `file:///abs/path` (empty host) yields the absolute path `/abs/path`.
    let path_str = host_and_path;

    let mut options = HashMap::new();
    if let Some(query) = query {
        for pair in query.split('&').filter(|p| !p.is_empty()) {
            let (k, v) = pair.split_once('=').ok_or_else(|| {
                CrioError::ParseError(format!("malformed query parameter {pair:?}"))
            })?;
            options.insert(k.to_string(), v.to_string());
        }
    }

    Ok(ConnectionInfo {
        kind,
        path: PathBuf::from(path_str),
        options,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_a_file_connection_with_options() {
        let info = parse("file:///var/lib/crio/main.db?page_size=4096&cache_size=64").unwrap();
        assert_eq!(info.kind, BackendKind::File);
        assert_eq!(info.path, PathBuf::from("/var/lib/crio/main.db"));
        assert_eq!(info.options.get("page_size").map(String::as_str), Some("4096"));
        assert_eq!(info.options.get("cache_size").map(String::as_str), Some("64"));
    }

    #[test]
    fn parses_a_memory_connection_without_options() {
        let info = parse("memory://db").unwrap();
        assert_eq!(info.kind, BackendKind::Memory);
        assert_eq!(info.path, PathBuf::from("db"));
        assert!(info.options.is_empty());
    }

    #[test]
    fn derives_companion_fsl_and_log_paths() {
        let info = parse("file:///data/main.db").unwrap();
        assert_eq!(info.fsl_path(), PathBuf::from("/data/main.db.fsl"));
        assert_eq!(info.log_path(), PathBuf::from("/data/main.db.log"));
    }

    #[test]
    fn rejects_an_unrecognized_scheme() {
        assert!(parse("ftp://host/path").is_err());
    }

    #[test]
    fn rejects_a_missing_scheme() {
        assert!(parse("not-a-connection-string").is_err());
    }
}
