use std::io;
use std::path::{Path, PathBuf};

/// Vault-path collaborator: the absolute base every relative path hangs off.
pub trait VaultPaths {
    fn base_path(&self) -> &Path;

    fn resolve(&self, relative: &str) -> PathBuf {
        self.base_path().join(relative.trim_start_matches('/'))
    }
}

/// A vault on the local filesystem.
#[derive(Clone, Debug)]
pub struct FsVault {
    pub base_dir: PathBuf,
}

impl FsVault {
    pub fn new(base_dir: impl Into<PathBuf>) -> io::Result<Self> {
        let base_dir = base_dir.into();
        std::fs::create_dir_all(&base_dir)?;
        Ok(FsVault { base_dir })
    }

    /// Absolute attachments directory, created if missing.
    pub fn attachments(&self, dir: &str) -> io::Result<PathBuf> {
        let path = self.resolve(dir);
        std::fs::create_dir_all(&path)?;
        Ok(path)
    }

    pub fn exists(&self, ident: &str) -> bool {
        self.resolve(ident).exists()
    }

    pub fn read(&self, ident: &str) -> io::Result<Vec<u8>> {
        std::fs::read(self.resolve(ident))
    }

    pub fn write(&self, ident: &str, data: &[u8]) -> io::Result<()> {
        write_atomic(&self.resolve(ident), data)
    }
}

/// Writes through a sibling temp file so readers never see a partial file.
pub fn write_atomic(path: &Path, data: &[u8]) -> io::Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut temp = tempfile::Builder::new().prefix(".tmp-").tempfile_in(dir)?;
    io::Write::write_all(&mut temp, data)?;
    temp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

impl VaultPaths for FsVault {
    fn base_path(&self) -> &Path {
        &self.base_dir
    }
}
