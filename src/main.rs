// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::io::Read;
use std::process::exit;

use clap::Parser;

use precpp::{
    Dui, FileDataCache, NativeFileProvider, OutputKind, TokenList, lexer::lex_file, preprocess,
};

/// Preprocesses a C/C++ source file and prints the resulting token stream.
#[derive(clap::Parser)]
#[command(version)]
struct Args {
    /// Macro definition, NAME or NAME=VALUE.
    #[arg(short = 'D', value_name = "NAME[=VALUE]")]
    defines: Vec<String>,

    /// Name that may never be defined.
    #[arg(short = 'U', value_name = "NAME")]
    undefines: Vec<String>,

    /// Include search path.
    #[arg(short = 'I', value_name = "PATH")]
    include_paths: Vec<String>,

    /// File to include before the main input.
    #[arg(long = "include", value_name = "FILE")]
    includes: Vec<String>,

    /// Language standard, e.g. c99, c11, c++14.
    #[arg(long = "std", value_name = "STD", default_value = "")]
    std: String,

    /// Print nothing.
    #[arg(short = 'q', long = "quiet")]
    quiet: bool,

    /// Print diagnostics only, suppressing the token output.
    #[arg(short = 'e', long = "errors-only")]
    errors_only: bool,

    /// Exit nonzero when any diagnostic is produced.
    #[arg(short = 'f', long = "fail-on-diagnostic")]
    fail_on_diagnostic: bool,

    /// Emit #line markers at file transitions.
    #[arg(short = 'l', long = "line-markers")]
    line_markers: bool,

    /// Read the input from stdin instead of opening the file by path.
    #[arg(long = "is", alias = "input-stream")]
    input_stream: bool,

    /// The source file to preprocess.
    filename: String,
}

fn main() {
    env_logger::init();

    let args = Args::parse();

    let data = if args.input_stream {
        let mut buffer = vec![];
        if let Err(error) = std::io::stdin().read_to_end(&mut buffer) {
            eprintln!("{}: {}", args.filename, error);
            exit(1);
        }
        buffer
    } else {
        match std::fs::read(&args.filename) {
            Ok(data) => data,
            Err(error) => {
                eprintln!("{}: {}", args.filename, error);
                exit(1);
            }
        }
    };

    let dui = Dui {
        defines: args.defines,
        undefined: args.undefines.into_iter().collect(),
        include_paths: args.include_paths,
        includes: args.includes,
        std: args.std,
        remove_comments: true,
    };

    let mut files = vec![];
    let mut outputs = vec![];

    let rawtokens = match lex_file(&data, &args.filename, &mut files, &mut outputs) {
        Ok(tokens) => tokens,
        Err(error) => {
            outputs.push(error.into_output());
            TokenList::new()
        }
    };

    let provider = NativeFileProvider::new();
    let mut cache = FileDataCache::new(&provider);
    let mut output = TokenList::new();

    preprocess(
        &mut output,
        &rawtokens,
        &mut files,
        &mut cache,
        &dui,
        &mut outputs,
        None,
        None,
    );

    if !args.quiet && !args.errors_only {
        println!("{}", output.stringify(&files, args.line_markers));
    }

    if !args.quiet {
        for diagnostic in &outputs {
            eprintln!(
                "{}:{}: {}: {}",
                files
                    .get(diagnostic.location.file_index as usize)
                    .map(|f| f.as_str())
                    .unwrap_or(&args.filename),
                diagnostic.location.line,
                diagnostic.kind.label(),
                diagnostic.message
            );
        }
    }

    if args.fail_on_diagnostic && !outputs.is_empty() {
        exit(1);
    }

    let fatal = outputs.iter().any(|o| {
        matches!(
            o.kind,
            OutputKind::Error | OutputKind::IncludeNestedTooDeeply
        )
    });
    if fatal {
        exit(1);
    }
}
