// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::fmt::Display;

use crate::{
    location::Location,
    output::{Output, OutputKind},
};

/// The internal failure value of the core. It carries the same payload as a
/// diagnostic record, so the driver can lift any failure into its output
/// list and keep going; callers never see this type cross the public
/// boundary as a panic.
#[derive(Debug, PartialEq, Eq, Clone)]
pub struct PreprocessError {
    pub kind: OutputKind,
    pub location: Location,
    pub message: String,
}

impl PreprocessError {
    pub fn new(kind: OutputKind, location: Location, message: impl Into<String>) -> Self {
        Self {
            kind,
            location,
            message: message.into(),
        }
    }

    pub fn syntax(location: Location, message: impl Into<String>) -> Self {
        Self::new(OutputKind::SyntaxError, location, message)
    }

    pub fn into_output(self) -> Output {
        Output::new(self.kind, self.location, self.message)
    }
}

impl Display for PreprocessError {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        write!(
            f,
            "{} at line {}, column {}: {}",
            self.kind.label(),
            self.location.line,
            self.location.col,
            self.message
        )
    }
}

impl std::error::Error for PreprocessError {}
