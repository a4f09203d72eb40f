// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::collections::HashMap;
use std::path::Path;

/// The file access seam of the core. The driver never performs I/O on its
/// own; every read goes through this trait via the file data cache, so a
/// caller can interpose, virtualize, or refuse file access.
pub trait FileProvider {
    /// Returns whether a file exists at `path` without reading it.
    fn exists(&self, path: &str) -> bool;

    /// Loads the raw bytes of the file at `path`.
    fn load(&self, path: &str) -> Result<Vec<u8>, std::io::Error>;
}

/// A provider backed by the real file system.
#[derive(Debug, Default)]
pub struct NativeFileProvider;

impl NativeFileProvider {
    pub fn new() -> Self {
        Self
    }
}

impl FileProvider for NativeFileProvider {
    fn exists(&self, path: &str) -> bool {
        Path::new(path).is_file()
    }

    fn load(&self, path: &str) -> Result<Vec<u8>, std::io::Error> {
        std::fs::read(path)
    }
}

/// An in-memory provider for unit testing; it never touches the real file
/// system.
#[derive(Debug, Default)]
pub struct MemoryFileProvider {
    files: HashMap<String, Vec<u8>>,
}

impl MemoryFileProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_file(&mut self, path: &str, content: &str) {
        self.files.insert(path.to_owned(), content.as_bytes().to_vec());
    }

    pub fn add_binary_file(&mut self, path: &str, content: &[u8]) {
        self.files.insert(path.to_owned(), content.to_vec());
    }
}

impl FileProvider for MemoryFileProvider {
    fn exists(&self, path: &str) -> bool {
        self.files.contains_key(path)
    }

    fn load(&self, path: &str) -> Result<Vec<u8>, std::io::Error> {
        self.files.get(path).cloned().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "file not found")
        })
    }
}

#[cfg(test)]
mod tests {
    use crate::file_provider::{FileProvider, MemoryFileProvider};

    #[test]
    fn test_memory_file_provider() {
        let mut provider = MemoryFileProvider::new();
        provider.add_file("/usr/include/a.h", "int a;");

        assert!(provider.exists("/usr/include/a.h"));
        assert!(!provider.exists("/usr/include/b.h"));
        assert_eq!(provider.load("/usr/include/a.h").unwrap(), b"int a;");
        assert!(provider.load("/usr/include/b.h").is_err());
    }
}
