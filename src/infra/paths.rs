// src/infra/paths.rs — Filesystem locations and output naming
//
// Config lives under $MANIFIX_HOME/ when set, otherwise ~/.manifix/.
// Session working directories default to <tmp>/manifix-sessions.

use directories::BaseDirs;
use std::io;
use std::path::{Path, PathBuf};

/// Returns the MANIFIX_HOME override, if set.
fn manifix_home() -> Option<PathBuf> {
    std::env::var_os("MANIFIX_HOME").map(PathBuf::from)
}

/// Configuration directory: $MANIFIX_HOME/ or ~/.manifix/
pub fn config_dir() -> PathBuf {
    if let Some(home) = manifix_home() {
        return home;
    }
    match BaseDirs::new() {
        Some(base) => base.home_dir().join(".manifix"),
        None => PathBuf::from(".manifix"),
    }
}

/// Config file path
pub fn config_file_path() -> PathBuf {
    config_dir().join("config.toml")
}

/// Default root for per-session working directories.
pub fn default_session_root() -> PathBuf {
    std::env::temp_dir().join("manifix-sessions")
}

/// Create every directory the service writes into.
pub async fn ensure_dirs(dirs: &[&Path]) -> std::io::Result<()> {
    for dir in dirs {
        tokio::fs::create_dir_all(dir).await?;
    }
    Ok(())
}

/// Reduce an uploaded filename to a safe ASCII name.
///
/// Keeps alphanumerics, `-`, `_` and `.`; whitespace becomes `_`; leading
/// dots and underscores are stripped so the result can't be hidden or
/// escape the directory. May return an empty string.
pub fn sanitize_filename(name: &str) -> String {
    // Drop any directory components a client may have sent.
    let base = name.rsplit(['/', '\\']).next().unwrap_or("");

    let mut out = String::with_capacity(base.len());
    for c in base.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
            out.push(c);
        } else if c.is_whitespace() {
            out.push('_');
        }
    }
    out.trim_start_matches(['.', '_']).trim_end_matches('.').to_string()
}

/// Sanitized stem of `path`, or `model` when nothing usable remains.
pub fn safe_stem(path: &Path) -> String {
    let stem = path
        .file_stem()
        .map(|s| sanitize_filename(&s.to_string_lossy()))
        .unwrap_or_default();
    if stem.is_empty() {
        "model".to_string()
    } else {
        stem
    }
}

/// Lower-cased extension of a filename, empty when there is none.
pub fn file_extension(filename: &str) -> String {
    match filename.rsplit_once('.') {
        Some((_, ext)) => ext.to_ascii_lowercase(),
        None => String::new(),
    }
}

/// `<dir>/<stem><suffix>` for `index == 0`, otherwise the counter goes in
/// front of the suffix's final extension: `part.fixed.1.stl`.
fn numbered_output_path(dir: &Path, stem: &str, suffix: &str, index: u32) -> PathBuf {
    if index == 0 {
        return dir.join(format!("{stem}{suffix}"));
    }
    let (prefix, ext) = match suffix.rfind('.') {
        Some(pos) if pos > 0 => (&suffix[..pos], &suffix[pos..]),
        _ => (suffix, ""),
    };
    dir.join(format!("{stem}{prefix}.{index}{ext}"))
}

/// First free path `<dir>/<stem><suffix>`.
///
/// On collision a counter goes in front of the suffix's final extension:
/// `part.fixed.stl`, `part.fixed.1.stl`, `part.fixed.2.stl`, ...
pub fn unique_output_path(dir: &Path, stem: &str, suffix: &str) -> PathBuf {
    let mut index = 0u32;
    loop {
        let candidate = numbered_output_path(dir, stem, suffix, index);
        if !candidate.exists() {
            return candidate;
        }
        index += 1;
    }
}

/// Same naming as [`unique_output_path`], but the name is claimed by
/// creating an empty file, so concurrent callers never share a path.
pub async fn reserve_output_path(dir: &Path, stem: &str, suffix: &str) -> io::Result<PathBuf> {
    let mut index = 0u32;
    loop {
        let candidate = numbered_output_path(dir, stem, suffix, index);
        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
            .await
        {
            Ok(_) => return Ok(candidate),
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => index += 1,
            Err(e) => return Err(e),
        }
    }
}
