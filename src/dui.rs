// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::collections::HashSet;

/// The caller configuration consumed by the driver: defines, undefines,
/// and includes, plus the language-standard selector.
#[derive(Debug, Default, Clone)]
pub struct Dui {
    /// Macro definitions, each `NAME` or `NAME=VALUE`
    /// (also `NAME(params)=body`).
    pub defines: Vec<String>,

    /// Names that may never be defined; a `#define` of such a name is
    /// silently dropped.
    pub undefined: HashSet<String>,

    /// Ordered include search roots.
    pub include_paths: Vec<String>,

    /// Files force-included before the main input.
    pub includes: Vec<String>,

    /// The language-standard selector, e.g. `c99`, `c11`, `c++14`.
    /// Controls `__STDC_VERSION__`, `__cplusplus`, and the availability
    /// of `__has_include`. Empty selects a permissive default.
    pub std: String,

    /// Drop comment tokens from the output.
    pub remove_comments: bool,
}

/// Maps the standard selector to the version macro it implies:
/// `__STDC_VERSION__` for C, `__cplusplus` for C++.
pub fn standard_version_macro(std: &str) -> Option<(&'static str, &'static str)> {
    match std {
        "c94" | "gnu94" | "iso9899:199409" => Some(("__STDC_VERSION__", "199409L")),
        "c99" | "gnu99" => Some(("__STDC_VERSION__", "199901L")),
        "c11" | "gnu11" => Some(("__STDC_VERSION__", "201112L")),
        "c17" | "c18" | "gnu17" | "gnu18" => Some(("__STDC_VERSION__", "201710L")),
        "c++98" | "c++03" | "gnu++98" | "gnu++03" => Some(("__cplusplus", "199711L")),
        "c++11" | "gnu++11" => Some(("__cplusplus", "201103L")),
        "c++14" | "gnu++14" => Some(("__cplusplus", "201402L")),
        "c++17" | "gnu++17" => Some(("__cplusplus", "201703L")),
        "c++20" | "gnu++20" => Some(("__cplusplus", "202002L")),
        _ => None,
    }
}

/// Whether the standard provides the `__has_include` operator: C++17 and
/// C17 onwards, plus the permissive default when no standard is given.
pub fn has_include_available(std: &str) -> bool {
    match std {
        "" => true,
        "c17" | "c18" | "gnu17" | "gnu18" | "c23" | "gnu23" => true,
        "c++17" | "gnu++17" | "c++20" | "gnu++20" => true,
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use crate::dui::{has_include_available, standard_version_macro};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_standard_version_macro() {
        assert_eq!(
            standard_version_macro("c99"),
            Some(("__STDC_VERSION__", "199901L"))
        );
        assert_eq!(
            standard_version_macro("c++14"),
            Some(("__cplusplus", "201402L"))
        );
        assert_eq!(standard_version_macro("c89"), None);
        assert_eq!(standard_version_macro(""), None);
    }

    #[test]
    fn test_has_include_available() {
        assert!(has_include_available(""));
        assert!(has_include_available("c++17"));
        assert!(has_include_available("c17"));
        assert!(!has_include_available("c99"));
        assert!(!has_include_available("c++11"));
    }
}
