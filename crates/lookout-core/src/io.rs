use crate::error::{LookoutError, Result};
use crate::operation::Operations;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;

/// Where spec documents come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpecInput {
    /// One or more files, merged in order.
    Files(Vec<PathBuf>),
    Stdin,
}

impl SpecInput {
    /// Pick the input from CLI flags. Exactly one of the two must be used.
    pub fn choose(files: Vec<PathBuf>, use_stdin: bool) -> Result<SpecInput> {
        match (files.is_empty(), use_stdin) {
            (true, true) => Ok(SpecInput::Stdin),
            (false, false) => Ok(SpecInput::Files(files)),
            (false, true) => Err(LookoutError::InvalidInput(
                "cannot specify both a file and to use stdin".into(),
            )),
            (true, false) => Err(LookoutError::InvalidInput(
                "must use one of --file or --stdin".into(),
            )),
        }
    }

    /// Read every document, in merge order.
    pub fn read(&self) -> Result<Vec<Vec<u8>>> {
        match self {
            SpecInput::Stdin => {
                let mut raw = Vec::new();
                std::io::stdin().read_to_end(&mut raw)?;
                Ok(vec![raw])
            }
            SpecInput::Files(files) => files.iter().map(|f| read_spec_file(f)).collect(),
        }
    }

    /// Read and merge every document into one aggregate.
    pub fn load(&self) -> Result<Operations> {
        load_operations(self.read()?)
    }
}

/// Merge documents sequentially. The first failure aborts the whole load.
pub fn load_operations<I, B>(documents: I) -> Result<Operations>
where
    I: IntoIterator<Item = B>,
    B: AsRef<[u8]>,
{
    let mut ops = Operations::default();
    for doc in documents {
        ops.load(doc.as_ref())?;
    }
    Ok(ops)
}

pub fn read_spec_file(path: &Path) -> Result<Vec<u8>> {
    if !path.is_file() {
        return Err(LookoutError::InvalidInput(format!(
            "--file '{}' is not a file",
            path.display()
        )));
    }
    Ok(std::fs::read(path)?)
}

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Prevents a half-downloaded implement from ever being executed.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Mark `path` as executable by everyone (0755).
#[cfg(unix)]
pub fn make_executable(path: &Path) -> Result<()> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o755))?;
    Ok(())
}

#[cfg(not(unix))]
pub fn make_executable(_path: &Path) -> Result<()> {
    Ok(())
}
