// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use crate::location::Location;

/// A diagnostic produced while preprocessing. Diagnostics are collected in
/// an [`OutputList`] in emission order and surfaced to the caller; nothing
/// is ever thrown across the public boundary.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct Output {
    pub kind: OutputKind,
    pub location: Location,
    pub message: String,
}

impl Output {
    pub fn new(kind: OutputKind, location: Location, message: impl Into<String>) -> Self {
        Self {
            kind,
            location,
            message: message.into(),
        }
    }
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum OutputKind {
    /// A `#error` directive was reached. Fatal: the token output is cleared.
    Error,

    /// A `#warning` directive was reached.
    Warning,

    /// An `#include` target was found neither in the cache nor on the
    /// search paths.
    MissingHeader,

    /// Include nesting exceeded the hard limit. Fatal.
    IncludeNestedTooDeeply,

    /// A lexer, directive, or macro-expansion failure.
    SyntaxError,

    /// A backslash followed by whitespace before the line break;
    /// the line is still spliced.
    PortabilityBackslash,

    /// A byte above 127 outside of a string or character literal.
    UnhandledCharError,

    /// A file named in the caller's forced-include list is missing.
    ExplicitIncludeNotFound,
}

impl OutputKind {
    /// The label used when printing diagnostics, e.g. `main.c:3: error: ...`.
    pub fn label(&self) -> &'static str {
        match self {
            OutputKind::Error => "error",
            OutputKind::Warning => "warning",
            OutputKind::MissingHeader => "missing header",
            OutputKind::IncludeNestedTooDeeply => "include nested too deeply",
            OutputKind::SyntaxError => "syntax error",
            OutputKind::PortabilityBackslash => "portability backslash",
            OutputKind::UnhandledCharError => "unhandled char error",
            OutputKind::ExplicitIncludeNotFound => "explicit include not found",
        }
    }
}

pub type OutputList = Vec<Output>;

/// One record per macro expansion, reported when the caller asks for it.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct MacroUsage {
    pub macro_name: String,
    pub define_location: Location,
    pub use_location: Location,
}

/// One record per evaluated `#if`/`#elif` condition.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct IfCond {
    pub location: Location,
    /// The condition as written, before `defined` substitution and
    /// macro expansion.
    pub condition: String,
    pub result: i64,
}
