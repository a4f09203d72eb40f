// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::collections::HashMap;

use log::debug;

use crate::{
    file_provider::FileProvider,
    lexer::lex_file,
    output::OutputList,
    token_list::TokenList,
};

/// The cached state of one resolved path: its raw token list, or the
/// knowledge that the file does not exist, so repeated misses never probe
/// the provider again.
enum CachedFile {
    Tokens(TokenList),
    Missing,
}

/// A cache of lexed files keyed by their simplified path.
///
/// Every miss is served through the caller's [`FileProvider`], which makes
/// this the only place where file content enters the core. A caller can
/// also pre-populate entries to preprocess fully in memory.
pub struct FileDataCache<'a> {
    provider: &'a dyn FileProvider,
    items: HashMap<String, CachedFile>,
}

impl<'a> FileDataCache<'a> {
    pub fn new(provider: &'a dyn FileProvider) -> Self {
        Self {
            provider,
            items: HashMap::new(),
        }
    }

    /// Pre-populates the cache with an already-lexed file.
    pub fn insert(&mut self, path: &str, tokens: TokenList) {
        self.items.insert(path.to_owned(), CachedFile::Tokens(tokens));
    }

    /// Marks a path as known-missing.
    pub fn insert_missing(&mut self, path: &str) {
        self.items.insert(path.to_owned(), CachedFile::Missing);
    }

    /// Returns whether a file exists at `path`, consulting the cache first
    /// and the provider on a miss. Existence alone does not lex the file.
    pub fn exists(&mut self, path: &str) -> bool {
        match self.items.get(path) {
            Some(CachedFile::Tokens(_)) => true,
            Some(CachedFile::Missing) => false,
            None => {
                let found = self.provider.exists(path);
                if !found {
                    self.items.insert(path.to_owned(), CachedFile::Missing);
                }
                found
            }
        }
    }

    /// Returns the raw token list for `path`, loading and lexing it on the
    /// first request. A load or lex failure marks the path missing; lexer
    /// diagnostics go to `outputs`.
    pub fn fetch(
        &mut self,
        path: &str,
        files: &mut Vec<String>,
        outputs: &mut OutputList,
    ) -> Option<&TokenList> {
        if !self.items.contains_key(path) {
            let loaded = match self.provider.load(path) {
                Ok(data) => {
                    debug!("lexing '{}'", path);
                    match lex_file(&data, path, files, outputs) {
                        Ok(tokens) => CachedFile::Tokens(tokens),
                        Err(error) => {
                            outputs.push(error.into_output());
                            CachedFile::Missing
                        }
                    }
                }
                Err(_) => CachedFile::Missing,
            };
            self.items.insert(path.to_owned(), loaded);
        }

        match self.items.get(path) {
            Some(CachedFile::Tokens(tokens)) => Some(tokens),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        file_cache::FileDataCache,
        file_provider::MemoryFileProvider,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn test_fetch_lexes_once() {
        let mut provider = MemoryFileProvider::new();
        provider.add_file("/usr/include/a.h", "int a;");

        let mut cache = FileDataCache::new(&provider);
        let mut files = vec![];
        let mut outputs = vec![];

        let tokens = cache.fetch("/usr/include/a.h", &mut files, &mut outputs).unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(files, vec!["/usr/include/a.h".to_owned()]);

        // A second fetch is served from the cache; the file list does not
        // grow again.
        let tokens = cache.fetch("/usr/include/a.h", &mut files, &mut outputs).unwrap();
        assert_eq!(tokens.len(), 3);
        assert_eq!(files.len(), 1);
    }

    #[test]
    fn test_fetch_missing_is_remembered() {
        let provider = MemoryFileProvider::new();
        let mut cache = FileDataCache::new(&provider);
        let mut files = vec![];
        let mut outputs = vec![];

        assert!(cache.fetch("/no/such.h", &mut files, &mut outputs).is_none());
        assert!(!cache.exists("/no/such.h"));
    }

    #[test]
    fn test_exists_does_not_lex() {
        let mut provider = MemoryFileProvider::new();
        provider.add_file("/usr/include/a.h", "int a;");

        let mut cache = FileDataCache::new(&provider);
        assert!(cache.exists("/usr/include/a.h"));
        assert!(!cache.exists("/usr/include/b.h"));
    }

    #[test]
    fn test_prepopulated_entry() {
        let provider = MemoryFileProvider::new();
        let mut cache = FileDataCache::new(&provider);
        let mut files = vec![];
        let mut outputs = vec![];

        let mut lexed_files = vec![];
        let list = crate::lexer::lex_file(b"x", "mem.h", &mut lexed_files, &mut outputs).unwrap();
        cache.insert("mem.h", list);

        assert!(cache.exists("mem.h"));
        assert!(cache.fetch("mem.h", &mut files, &mut outputs).is_some());
    }
}
