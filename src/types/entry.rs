//! Directory listing entries.

use std::fmt;

/// Kind of a listed filesystem entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    /// Regular file.
    File,
    /// Directory.
    Dir,
}

impl EntryKind {
    /// Parses the type column of a listing line (`FILE` / `DIR`, any case).
    #[must_use]
    pub fn from_label(label: &str) -> Option<Self> {
        if label.eq_ignore_ascii_case("file") {
            Some(Self::File)
        } else if label.eq_ignore_ascii_case("dir") {
            Some(Self::Dir)
        } else {
            None
        }
    }

    /// Returns the lowercase label (`"file"` or `"dir"`).
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Dir => "dir",
        }
    }
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file or directory reported by the device's `/ls` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Entry kind.
    pub kind: EntryKind,
    /// Entry name as printed by the device.
    pub name: String,
    /// Size in bytes (0 for directories and unsized entries).
    pub size_bytes: u64,
}

impl FileEntry {
    /// Creates a new entry.
    #[must_use]
    pub fn new(kind: EntryKind, name: impl Into<String>, size_bytes: u64) -> Self {
        Self {
            kind,
            name: name.into(),
            size_bytes,
        }
    }

    /// Returns true if this entry is a directory.
    #[must_use]
    pub fn is_dir(&self) -> bool {
        self.kind == EntryKind::Dir
    }
}
