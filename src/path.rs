// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

/// Normalizes an include path without touching the file system:
/// backslashes become slashes, `.` components and repeated slashes
/// collapse, and `a/..` resolves unless `a` is itself `..`.
///
/// A path starting with exactly two slashes keeps that prefix (UNC);
/// longer runs collapse to a single slash. The function is idempotent.
pub fn simplify_path(path: &str) -> String {
    let forward = path.replace('\\', "/");

    let absolute = forward.starts_with('/');
    let unc = forward.starts_with("//") && !forward[2..].starts_with('/');

    let mut components: Vec<&str> = vec![];
    for component in forward.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                // `a/..` collapses; a leading run of `..` is kept.
                if matches!(components.last(), Some(&c) if c != "..") {
                    components.pop();
                } else if !absolute {
                    components.push("..");
                }
            }
            _ => components.push(component),
        }
    }

    let prefix = if unc {
        "//"
    } else if absolute {
        "/"
    } else {
        ""
    };

    let joined = components.join("/");
    if joined.is_empty() {
        if absolute {
            prefix.to_owned()
        } else {
            ".".to_owned()
        }
    } else {
        format!("{}{}", prefix, joined)
    }
}

/// Maps a Cygwin-style path to Windows conventions:
/// `/cygdrive/x/dir/file` becomes `X:\dir\file`, anything else just has
/// its slashes flipped.
pub fn convert_cygwin_to_windows_path(path: &str) -> String {
    let converted = match path
        .strip_prefix("/cygdrive/")
        .filter(|rest| !rest.is_empty())
    {
        Some(rest) => {
            let drive = rest.chars().next().unwrap().to_ascii_uppercase();
            format!("{}:{}", drive, &rest[1..])
        }
        None => path.to_owned(),
    };

    converted.replace('/', "\\")
}

#[cfg(test)]
mod tests {
    use crate::path::{convert_cygwin_to_windows_path, simplify_path};
    use pretty_assertions::assert_eq;

    #[test]
    fn test_simplify_path_dots() {
        assert_eq!(simplify_path("a/./b"), "a/b");
        assert_eq!(simplify_path("./a"), "a");
        assert_eq!(simplify_path("a/b/../c"), "a/c");
        assert_eq!(simplify_path("a/.."), ".");
        assert_eq!(simplify_path("../a"), "../a");
        assert_eq!(simplify_path("../../a"), "../../a");
    }

    #[test]
    fn test_simplify_path_slashes() {
        assert_eq!(simplify_path("a//b"), "a/b");
        assert_eq!(simplify_path("/usr//include"), "/usr/include");
        assert_eq!(simplify_path("a\\b\\c"), "a/b/c");
    }

    #[test]
    fn test_simplify_path_unc() {
        // A single leading double slash is preserved, longer runs collapse.
        assert_eq!(simplify_path("//server/share"), "//server/share");
        assert_eq!(simplify_path("///server/share"), "/server/share");
    }

    #[test]
    fn test_simplify_path_idempotent() {
        for path in [
            "a/./b",
            "a/b/../c",
            "//server/share",
            "///x//y/./..",
            "..\\a\\..\\b",
        ] {
            let once = simplify_path(path);
            assert_eq!(simplify_path(&once), once);
        }
    }

    #[test]
    fn test_convert_cygwin_path() {
        assert_eq!(
            convert_cygwin_to_windows_path("/cygdrive/c/dir/file.h"),
            "C:\\dir\\file.h"
        );
        assert_eq!(convert_cygwin_to_windows_path("a/b"), "a\\b");
    }
}
