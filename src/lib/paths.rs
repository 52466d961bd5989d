use std::path::{Path, PathBuf};

/// Expands a leading `~` to the current user's home directory.  Paths that do not start with
/// `~`, or that do but for which no home directory can be found, are returned unchanged.
#[must_use]
pub fn expand_tilde(path: &Path) -> PathBuf {
    if !path.starts_with("~") {
        return path.to_path_buf();
    }
    match (dirs::home_dir(), path.strip_prefix("~")) {
        (Some(home), Ok(rest)) if rest.as_os_str().is_empty() => home,
        // root as home: don't prepend an extra `/`
        (Some(home), Ok(rest)) if home == Path::new("/") => Path::new("/").join(rest),
        (Some(home), Ok(rest)) => home.join(rest),
        _ => path.to_path_buf(),
    }
}
