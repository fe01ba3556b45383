use std::path::{Path, PathBuf};

use crate::error::{LookoutError, Result};

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const LOOKOUT_DIR: &str = ".lookout";
pub const IMPLS_DIR: &str = ".lookout/impls";
pub const BIN_DIR: &str = ".lookout/bin";

/// Where `setup` installs the client on a remote host, expanded remotely.
pub const REMOTE_BIN: &str = "$HOME/.lookout/bin/lookout";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn home_dir() -> Result<PathBuf> {
    home::home_dir().ok_or(LookoutError::HomeNotFound)
}

/// Default cache directory for downloaded implements.
pub fn default_cache_dir() -> Result<PathBuf> {
    Ok(home_dir()?.join(IMPLS_DIR))
}

pub fn cached_implement(cache_dir: &Path, source_file: &str) -> PathBuf {
    cache_dir.join(source_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cached_implement_joins_file_name() {
        let path = cached_implement(Path::new("/tmp/impls"), "check.sh");
        assert_eq!(path, PathBuf::from("/tmp/impls/check.sh"));
    }

    #[test]
    fn cache_and_bin_live_under_lookout_dir() {
        assert!(IMPLS_DIR.starts_with(LOOKOUT_DIR));
        assert!(BIN_DIR.starts_with(LOOKOUT_DIR));
    }

    #[test]
    fn remote_bin_lives_in_bin_dir() {
        assert!(REMOTE_BIN.ends_with(&format!("{BIN_DIR}/lookout")));
    }
}
