//! Capability-scoped directory access built on `cap-std` and `camino`.
//!
//! Caches and document templates live under configured roots. Every access
//! goes through a [`ScopedDir`] so relative names supplied by callers cannot
//! escape the root they were granted. Paths given on the command line are
//! opened with the ambient helpers.
#![forbid(unsafe_code)]

use std::io::{self, Write};
use std::path::Component;
use std::process;
use std::sync::atomic::{AtomicU64, Ordering};

use camino::{Utf8Path, Utf8PathBuf};
use cap_std::{ambient_authority, fs_utf8};

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// A directory handle restricted to one root.
#[derive(Debug)]
pub struct ScopedDir {
    root: Utf8PathBuf,
    dir: fs_utf8::Dir,
}

impl ScopedDir {
    /// Open an existing directory.
    ///
    /// # Errors
    /// Returns the underlying I/O error when the directory cannot be opened.
    pub fn open(root: &Utf8Path) -> io::Result<Self> {
        let dir = fs_utf8::Dir::open_ambient_dir(root, ambient_authority())?;
        Ok(Self {
            root: root.to_path_buf(),
            dir,
        })
    }

    /// Open a directory, creating it and any missing parents first.
    ///
    /// # Errors
    /// Returns the underlying I/O error when creation or opening fails.
    pub fn create(root: &Utf8Path) -> io::Result<Self> {
        let (anchor, relative) = split_anchor(root)?;
        if !relative.as_str().is_empty() {
            anchor.create_dir_all(&relative)?;
        }
        Self::open(root)
    }

    /// Root this handle was opened on.
    #[must_use]
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Report whether `relative` names a regular file.
    ///
    /// A missing entry is not an error and yields `Ok(false)`.
    ///
    /// # Errors
    /// Returns I/O errors other than [`io::ErrorKind::NotFound`].
    pub fn is_file(&self, relative: &Utf8Path) -> io::Result<bool> {
        match self.dir.metadata(relative) {
            Ok(meta) => Ok(meta.is_file()),
            Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err),
        }
    }

    /// Open `relative` for reading.
    ///
    /// # Errors
    /// Returns the underlying I/O error when the file cannot be opened.
    pub fn open_file(&self, relative: &Utf8Path) -> io::Result<fs_utf8::File> {
        self.dir.open(relative)
    }

    /// Read the whole of `relative` into memory.
    ///
    /// # Errors
    /// Returns the underlying I/O error when the file cannot be read.
    pub fn read(&self, relative: &Utf8Path) -> io::Result<Vec<u8>> {
        self.dir.read(relative)
    }

    /// Replace `name` with `contents` in one step.
    ///
    /// The bytes are written to a sibling temporary file which is then
    /// renamed over the destination, so readers observe either the previous
    /// contents or the new ones, never a partial write.
    ///
    /// # Errors
    /// Returns the underlying I/O error when writing or renaming fails.
    pub fn write_atomic(&self, name: &str, contents: &[u8]) -> io::Result<()> {
        if name.contains('/') || name.contains('\\') {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "atomic writes take a bare file name",
            ));
        }
        let temporary = temporary_name(name);
        self.dir.write(&temporary, contents)?;
        if let Err(err) = self.dir.rename(&temporary, &self.dir, name) {
            // Best effort: the temporary is useless once the rename failed.
            let _cleanup = self.dir.remove_file(&temporary);
            return Err(err);
        }
        Ok(())
    }
}

/// Sibling name a pending write goes to before it is renamed into place.
fn temporary_name(name: &str) -> String {
    let sequence = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
    format!(".{name}.{}.{sequence}.tmp", process::id())
}

/// A file written beside its destination and renamed over it on commit.
///
/// Dropping a pending file without calling [`PendingFile::commit`] removes
/// the temporary and leaves any existing destination untouched.
#[derive(Debug)]
pub struct PendingFile {
    dir: fs_utf8::Dir,
    name: String,
    temporary: String,
    file: Option<fs_utf8::File>,
}

impl PendingFile {
    /// Start writing a replacement for `path`.
    ///
    /// # Errors
    /// Returns the underlying I/O error when the parent directory cannot be
    /// opened or the temporary cannot be created.
    pub fn create(path: &Utf8Path) -> io::Result<Self> {
        let (dir, name) = open_dir_and_file(path)?;
        let temporary = temporary_name(&name);
        let file = dir.create(temporary.as_str())?;
        Ok(Self {
            dir,
            name,
            temporary,
            file: Some(file),
        })
    }

    /// Flush the written bytes to disk and move them over the destination.
    ///
    /// # Errors
    /// Returns the underlying I/O error when syncing or renaming fails; the
    /// temporary is removed and the destination keeps its previous contents.
    pub fn commit(mut self) -> io::Result<()> {
        let file = self.file.take().ok_or_else(closed)?;
        file.sync_all()?;
        drop(file);
        self.dir.rename(&self.temporary, &self.dir, &self.name)?;
        self.temporary.clear();
        Ok(())
    }

    fn file(&mut self) -> io::Result<&mut fs_utf8::File> {
        self.file.as_mut().ok_or_else(closed)
    }
}

fn closed() -> io::Error {
    io::Error::other("pending file already closed")
}

impl Write for PendingFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.file()?.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.file()?.flush()
    }
}

impl Drop for PendingFile {
    fn drop(&mut self) {
        drop(self.file.take());
        if !self.temporary.is_empty() {
            let _cleanup = self.dir.remove_file(&self.temporary);
        }
    }
}

/// Open a UTF-8 file path using ambient authority.
///
/// # Errors
/// Returns the underlying I/O error when the file cannot be opened.
pub fn open_utf8_file(path: &Utf8Path) -> io::Result<fs_utf8::File> {
    fs_utf8::File::open_ambient(path, ambient_authority())
}

/// Resolve the directory holding `path` and the file name within it.
///
/// # Errors
/// Returns an error when `path` has no file name or its parent cannot be
/// opened.
pub fn open_dir_and_file(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, String)> {
    let parent = path
        .parent()
        .filter(|parent| !parent.as_str().is_empty())
        .unwrap_or_else(|| Utf8Path::new("."));
    let file_name = path
        .file_name()
        .ok_or_else(|| io::Error::other("target should include a file name"))?
        .to_owned();
    let dir = fs_utf8::Dir::open_ambient_dir(parent, ambient_authority())?;
    Ok((dir, file_name))
}

/// Return whether `path` exists and is a regular file.
///
/// # Errors
/// Returns the underlying I/O error, including [`io::ErrorKind::NotFound`]
/// for missing entries.
pub fn file_is_file(path: &Utf8Path) -> io::Result<bool> {
    let (dir, name) = open_dir_and_file(path)?;
    dir.metadata(name.as_str()).map(|meta| meta.is_file())
}

/// Split `path` into an ambient directory that already exists (the
/// filesystem root or the current directory) and the remainder below it.
fn split_anchor(path: &Utf8Path) -> io::Result<(fs_utf8::Dir, Utf8PathBuf)> {
    let std_path = path.as_std_path();
    let anchor = match std_path.components().next() {
        Some(Component::Prefix(prefix)) => {
            let prefix = prefix
                .as_os_str()
                .to_str()
                .ok_or_else(|| io::Error::other("non-UTF-8 path prefix"))?;
            Utf8PathBuf::from(prefix).join(std::path::MAIN_SEPARATOR.to_string())
        }
        Some(Component::RootDir) => Utf8PathBuf::from(std::path::MAIN_SEPARATOR.to_string()),
        _ => Utf8PathBuf::from("."),
    };
    let relative = if anchor.as_str() == "." {
        path.to_path_buf()
    } else {
        path.strip_prefix(&anchor)
            .map_err(|_| io::Error::other("failed to strip the anchor from the path"))?
            .to_path_buf()
    };
    let dir = fs_utf8::Dir::open_ambient_dir(&anchor, ambient_authority())?;
    Ok((dir, relative))
}
