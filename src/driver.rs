// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::path::Path;

use chrono::Local;
use log::debug;

use crate::{
    dui::{Dui, has_include_available, standard_version_macro},
    error::PreprocessError,
    expression::evaluate,
    file_cache::FileDataCache,
    lexer::lex,
    location::Location,
    macros::{Builtins, ExpandState, Macro, MacroMap, expand_tokens, is_builtin},
    output::{IfCond, MacroUsage, Output, OutputKind, OutputList},
    path::simplify_path,
    token::Token,
    token_list::{TokenId, TokenList},
};

/// The hard limit on include nesting.
const MAX_INCLUDE_DEPTH: usize = 400;

/// The per-nesting-level conditional state. A directive body is only
/// emitted while every level of the stack is `True`; pushing `AlwaysFalse`
/// for conditionals inside an inactive branch keeps a top-of-stack check
/// sufficient.
#[derive(Debug, PartialEq, Eq, Clone, Copy)]
enum IfState {
    True,
    ElseIsTrue,
    AlwaysFalse,
}

/// The sentinel for failures that abort the whole run; the diagnostic has
/// already been appended to the output list when this is raised.
struct Fatal;

/// Runs the preprocessor over an already-lexed translation unit.
///
/// - `output` receives the processed token stream; it is cleared when a
///   `#error` or another fatal failure is reached.
/// - `files` is the shared filename list; new names are appended on first
///   sight.
/// - `cache` serves `#include` targets and is populated through its file
///   provider.
/// - `outputs` receives diagnostics in emission order.
/// - `macro_usage` and `if_conds` are optional report sinks: one entry per
///   macro expansion, and one per evaluated `#if`/`#elif` condition.
#[allow(clippy::too_many_arguments)]
pub fn preprocess(
    output: &mut TokenList,
    rawtokens: &TokenList,
    files: &mut Vec<String>,
    cache: &mut FileDataCache,
    dui: &Dui,
    outputs: &mut OutputList,
    macro_usage: Option<&mut Vec<MacroUsage>>,
    if_conds: Option<&mut Vec<IfCond>>,
) {
    let now = Local::now();
    let mut driver = Driver {
        files,
        cache,
        dui,
        outputs,
        macros: MacroMap::new(),
        builtins: Builtins {
            // "Mmm dd yyyy" with a space-padded day, and "HH:MM:SS",
            // both fixed at driver invocation.
            date: now.format("%b %e %Y").to_string(),
            time: now.format("%H:%M:%S").to_string(),
            counter: 0,
        },
        usage: vec![],
        if_conds: vec![],
        if_stack: vec![IfState::True],
        include_depth: 0,
        output: TokenList::new(),
    };

    driver.add_predefines();
    let result = driver.run(rawtokens);

    if let Some(sink) = macro_usage {
        sink.extend(driver.usage);
    }
    if let Some(sink) = if_conds {
        sink.extend(driver.if_conds);
    }

    match result {
        Ok(()) => *output = driver.output,
        Err(Fatal) => output.clear(),
    }
}

struct Driver<'a, 'p> {
    files: &'a mut Vec<String>,
    cache: &'a mut FileDataCache<'p>,
    dui: &'a Dui,
    outputs: &'a mut OutputList,

    macros: MacroMap,
    builtins: Builtins,
    usage: Vec<MacroUsage>,
    if_conds: Vec<IfCond>,

    if_stack: Vec<IfState>,
    include_depth: usize,

    output: TokenList,
}

impl Driver<'_, '_> {
    /// Installs the caller's `-D` style definitions and the macro implied
    /// by the language standard.
    fn add_predefines(&mut self) {
        if let Some((name, value)) = standard_version_macro(&self.dui.std) {
            self.define_from_string(&format!("{}={}", name, value));
        }

        let defines = self.dui.defines.clone();
        for define in &defines {
            self.define_from_string(define);
        }
    }

    /// Parses a `NAME`, `NAME=VALUE`, or `NAME(params)=body` definition
    /// string, the same shape a `-D` command line option carries.
    fn define_from_string(&mut self, definition: &str) {
        let text = match definition.split_once('=') {
            Some((name, value)) => format!("{} {}", name, value),
            None => definition.to_owned(),
        };

        let parsed = lex(&text, 0, self.files, self.outputs).and_then(|list| {
            let tokens: Vec<Token> = list.iter().cloned().collect();
            let references: Vec<&Token> = tokens.iter().collect();
            Macro::parse_define(&references, Location::default())
        });

        match parsed {
            Ok(mac) => {
                if !self.dui.undefined.contains(&mac.name) {
                    self.macros.insert(mac);
                }
            }
            Err(error) => self.outputs.push(error.into_output()),
        }
    }

    fn run(&mut self, rawtokens: &TokenList) -> Result<(), Fatal> {
        // Forced includes come before the main input.
        let includes = self.dui.includes.clone();
        for include in &includes {
            let path = simplify_path(include);
            match self.fetch_list(&path) {
                Some(list) => {
                    self.include_depth += 1;
                    self.process_list(&list)?;
                    self.include_depth -= 1;
                }
                None => {
                    self.outputs.push(Output::new(
                        OutputKind::ExplicitIncludeNotFound,
                        Location::default(),
                        format!(
                            "Can not open include file '{}' that is explicitly included.",
                            include
                        ),
                    ));
                }
            }
        }

        self.process_list(rawtokens)
    }

    fn fetch_list(&mut self, path: &str) -> Option<TokenList> {
        self.cache.fetch(path, self.files, self.outputs).cloned()
    }

    fn active(&self) -> bool {
        *self.if_stack.last().unwrap() == IfState::True
    }

    fn process_list(&mut self, list: &TokenList) -> Result<(), Fatal> {
        let mut cursor = list.front();

        while let Some(id) = cursor {
            let token = list.get(id);

            if token.op == '#' && line_start(list, id) {
                cursor = self.handle_directive(list, id)?;
            } else if self.active() {
                cursor = self.emit_code(list, id)?;
            } else {
                cursor = skip_line(list, id);
            }
        }

        Ok(())
    }

    /// Emits one non-directive token, expanding it when it invokes a macro
    /// or a builtin. Returns the continuation cursor.
    fn emit_code(&mut self, list: &TokenList, id: TokenId) -> Result<Option<TokenId>, Fatal> {
        let token = list.get(id);

        if token.name {
            if let Some(mac) = self.macros.get(token.str()) {
                let mut extent_end = id;

                if mac.function_like {
                    // The invocation requires an argument list; a comment
                    // may sit between the name and the parenthesis.
                    let mut probe = list.next_of(id);
                    while probe.is_some_and(|p| list.get(p).comment) {
                        probe = list.next_of(probe.unwrap());
                    }

                    match probe.filter(|&p| list.get(p).op == '(') {
                        Some(open) => {
                            let mut depth = 0;
                            let mut scan = list.next_of(open);
                            let mut close = None;
                            while let Some(c) = scan {
                                match list.get(c).op {
                                    '(' => depth += 1,
                                    ')' if depth == 0 => {
                                        close = Some(c);
                                        break;
                                    }
                                    ')' => depth -= 1,
                                    _ => {}
                                }
                                scan = list.next_of(c);
                            }

                            match close {
                                Some(c) => extent_end = c,
                                None => {
                                    self.outputs.push(Output::new(
                                        OutputKind::SyntaxError,
                                        token.location,
                                        format!(
                                            "failed to expand '{}', missing ')'",
                                            token.str()
                                        ),
                                    ));
                                    return Ok(None);
                                }
                            }
                        }
                        None => {
                            // Not an invocation; the name passes through.
                            self.push_output(token.clone());
                            return Ok(list.next_of(id));
                        }
                    }
                }

                let invocation = materialize(list, id, extent_end);
                match self.expand(&invocation) {
                    Ok(expanded) => {
                        for produced in expanded {
                            self.push_output(produced);
                        }
                    }
                    Err(error) => self.outputs.push(error.into_output()),
                }
                return Ok(list.next_of(extent_end));
            }

            if is_builtin(token.str()) {
                let invocation = vec![token.clone()];
                match self.expand(&invocation) {
                    Ok(expanded) => {
                        for produced in expanded {
                            self.push_output(produced);
                        }
                    }
                    Err(error) => self.outputs.push(error.into_output()),
                }
                return Ok(list.next_of(id));
            }
        }

        self.push_output(token.clone());
        Ok(list.next_of(id))
    }

    fn push_output(&mut self, token: Token) {
        if token.comment && self.dui.remove_comments {
            return;
        }
        self.output.push_back(token);
    }

    fn expand(&mut self, tokens: &[Token]) -> Result<Vec<Token>, PreprocessError> {
        let mut state = ExpandState {
            macros: &self.macros,
            builtins: &mut self.builtins,
            usage: &mut self.usage,
        };
        expand_tokens(&mut state, self.files, tokens)
    }

    /// Handles one directive line. Returns the cursor at the first token
    /// of the following line.
    fn handle_directive(
        &mut self,
        list: &TokenList,
        hash_id: TokenId,
    ) -> Result<Option<TokenId>, Fatal> {
        let hash_location = list.get(hash_id).location;

        // Collect the directive line.
        let mut line_ids = vec![hash_id];
        let mut cursor = list.next_of(hash_id);
        while let Some(id) = cursor {
            let token = list.get(id);
            if token.location.file_index != hash_location.file_index
                || token.location.line != hash_location.line
            {
                break;
            }
            line_ids.push(id);
            cursor = list.next_of(id);
        }
        let next = cursor;

        // Comments take no part in directive interpretation.
        let meaningful: Vec<TokenId> = line_ids
            .iter()
            .copied()
            .filter(|&id| !list.get(id).comment)
            .collect();

        let directive = match meaningful.get(1) {
            Some(&id) => list.get(id).str().to_owned(),
            // `#` alone (or followed only by a comment) is a null
            // directive.
            None => return Ok(next),
        };

        match directive.as_str() {
            "define" if self.active() => {
                let tokens: Vec<&Token> = meaningful[2..].iter().map(|&id| list.get(id)).collect();
                match Macro::parse_define(&tokens, hash_location) {
                    Ok(mac) => {
                        if !self.dui.undefined.contains(&mac.name) {
                            self.macros.insert(mac);
                        }
                    }
                    Err(error) => self.outputs.push(error.into_output()),
                }
            }
            "undef" if self.active() => {
                match meaningful.get(2).map(|&id| list.get(id)).filter(|t| t.name) {
                    Some(token) => {
                        self.macros.remove(token.str());
                    }
                    None => self.outputs.push(Output::new(
                        OutputKind::SyntaxError,
                        hash_location,
                        "Failed to parse #undef",
                    )),
                }
            }
            "ifdef" | "ifndef" => {
                if !self.active() {
                    self.if_stack.push(IfState::AlwaysFalse);
                } else {
                    match meaningful.get(2).map(|&id| list.get(id)).filter(|t| t.name) {
                        Some(token) => {
                            let defined = self.is_defined(token.str());
                            let condition = if directive == "ifdef" { defined } else { !defined };
                            self.if_stack.push(if condition {
                                IfState::True
                            } else {
                                IfState::ElseIsTrue
                            });
                        }
                        None => {
                            self.outputs.push(Output::new(
                                OutputKind::SyntaxError,
                                hash_location,
                                format!("Syntax error in #{}", directive),
                            ));
                            self.if_stack.push(IfState::AlwaysFalse);
                        }
                    }
                }
            }
            "if" => {
                if !self.active() {
                    self.if_stack.push(IfState::AlwaysFalse);
                } else {
                    let value = self.eval_condition(list, &meaningful[2..], hash_location)?;
                    self.if_stack.push(if value != 0 {
                        IfState::True
                    } else {
                        IfState::ElseIsTrue
                    });
                }
            }
            "elif" => {
                if self.if_stack.len() == 1 {
                    self.outputs.push(Output::new(
                        OutputKind::SyntaxError,
                        hash_location,
                        "#elif without #if",
                    ));
                } else {
                    match *self.if_stack.last().unwrap() {
                        // The branch before this one was taken.
                        IfState::True => *self.if_stack.last_mut().unwrap() = IfState::AlwaysFalse,
                        IfState::AlwaysFalse => {}
                        IfState::ElseIsTrue => {
                            let value =
                                self.eval_condition(list, &meaningful[2..], hash_location)?;
                            if value != 0 {
                                *self.if_stack.last_mut().unwrap() = IfState::True;
                            }
                        }
                    }
                }
            }
            "else" => {
                if self.if_stack.len() == 1 {
                    self.outputs.push(Output::new(
                        OutputKind::SyntaxError,
                        hash_location,
                        "#else without #if",
                    ));
                } else {
                    let top = self.if_stack.last_mut().unwrap();
                    *top = match *top {
                        IfState::ElseIsTrue => IfState::True,
                        _ => IfState::AlwaysFalse,
                    };
                }
            }
            "endif" => {
                if self.if_stack.len() == 1 {
                    self.outputs.push(Output::new(
                        OutputKind::SyntaxError,
                        hash_location,
                        "#endif without #if",
                    ));
                } else {
                    self.if_stack.pop();
                }
            }
            "error" if self.active() => {
                let rest = directive_text(list, &meaningful[2..]);
                self.outputs.push(Output::new(
                    OutputKind::Error,
                    hash_location,
                    format!("#error {}", rest),
                ));
                return Err(Fatal);
            }
            "warning" if self.active() => {
                let rest = directive_text(list, &meaningful[2..]);
                self.outputs.push(Output::new(
                    OutputKind::Warning,
                    hash_location,
                    format!("#warning {}", rest),
                ));
            }
            "include" if self.active() => {
                self.directive_include(list, &meaningful[2..], hash_location)?;
            }
            "line" => {
                // The lexer already re-aimed the locations of the tokens
                // that follow; the directive itself is not emitted.
            }
            _ if self.active() => {
                // `#pragma` and unknown directives pass through verbatim.
                for &id in &line_ids {
                    self.push_output(list.get(id).clone());
                }
            }
            _ => {}
        }

        Ok(next)
    }

    fn is_defined(&self, name: &str) -> bool {
        self.macros.contains(name)
            || is_builtin(name)
            || (name == "__has_include" && has_include_available(&self.dui.std))
    }

    /// Substitutes `defined` and `__has_include`, macro-expands the rest,
    /// and folds the condition to a value. An evaluation failure is fatal:
    /// the branch state would be unknowable.
    fn eval_condition(
        &mut self,
        list: &TokenList,
        operand_ids: &[TokenId],
        hash_location: Location,
    ) -> Result<i64, Fatal> {
        let source: Vec<Token> = operand_ids.iter().map(|&id| list.get(id).clone()).collect();
        let written = source
            .iter()
            .map(|t| t.str())
            .collect::<Vec<_>>()
            .join(" ");

        let fail = |outputs: &mut OutputList, detail: &str| {
            outputs.push(Output::new(
                OutputKind::SyntaxError,
                hash_location,
                format!("failed to evaluate #if condition, {}", detail),
            ));
            Fatal
        };

        // `defined X`, `defined(X)`, and `__has_include(...)` are
        // substituted before macro expansion.
        let mut condition: Vec<Token> = vec![];
        let mut index = 0;
        while index < source.len() {
            let token = &source[index];

            if token.str() == "defined" {
                let mut at = index + 1;
                let parenthesized = source.get(at).is_some_and(|t| t.op == '(');
                if parenthesized {
                    at += 1;
                }

                let name = match source.get(at).filter(|t| t.name) {
                    Some(t) => t.str(),
                    None => {
                        return Err(fail(self.outputs, "invalid 'defined' expression"));
                    }
                };
                let value = if self.is_defined(name) { "1" } else { "0" };
                condition.push(Token::new(value, token.location));

                at += 1;
                if parenthesized {
                    if !source.get(at).is_some_and(|t| t.op == ')') {
                        return Err(fail(self.outputs, "invalid 'defined' expression"));
                    }
                    at += 1;
                }
                index = at;
                continue;
            }

            if token.str() == "__has_include" && has_include_available(&self.dui.std) {
                if !source.get(index + 1).is_some_and(|t| t.op == '(') {
                    return Err(fail(self.outputs, "invalid '__has_include' expression"));
                }

                let mut at = index + 2;
                let mut operand = vec![];
                loop {
                    match source.get(at) {
                        Some(t) if t.op == ')' => break,
                        Some(t) => {
                            operand.push(t.clone());
                            at += 1;
                        }
                        None => {
                            return Err(fail(
                                self.outputs,
                                "invalid '__has_include' expression",
                            ));
                        }
                    }
                }

                let found = match classify_header(&operand) {
                    Some((header, system)) => self
                        .resolve_header(&header, system, hash_location.file_index)
                        .is_some(),
                    None => false,
                };
                condition.push(Token::new(if found { "1" } else { "0" }, token.location));
                index = at + 1;
                continue;
            }

            condition.push(token.clone());
            index += 1;
        }

        let expanded = match self.expand(&condition) {
            Ok(tokens) => tokens,
            Err(error) => {
                let detail = error.message;
                return Err(fail(self.outputs, &detail));
            }
        };

        let value = match evaluate(expanded.into_iter().collect()) {
            Ok(value) => value,
            Err(error) => {
                let detail = error.message;
                return Err(fail(self.outputs, &detail));
            }
        };

        self.if_conds.push(IfCond {
            location: hash_location,
            condition: written,
            result: value,
        });

        Ok(value)
    }

    fn directive_include(
        &mut self,
        list: &TokenList,
        operand_ids: &[TokenId],
        hash_location: Location,
    ) -> Result<(), Fatal> {
        let operand: Vec<Token> = operand_ids.iter().map(|&id| list.get(id).clone()).collect();

        // `"..."`, `<...>`, or a macro invocation producing one of the two.
        let classified = classify_header(&operand).or_else(|| {
            self.expand(&operand)
                .ok()
                .and_then(|expanded| classify_header(&expanded))
        });

        let Some((header, system)) = classified else {
            self.outputs.push(Output::new(
                OutputKind::SyntaxError,
                hash_location,
                "No header in #include",
            ));
            return Ok(());
        };

        match self.resolve_header(&header, system, hash_location.file_index) {
            Some(path) => {
                if self.include_depth >= MAX_INCLUDE_DEPTH {
                    self.outputs.push(Output::new(
                        OutputKind::IncludeNestedTooDeeply,
                        hash_location,
                        "#include nested too deeply",
                    ));
                    return Err(Fatal);
                }

                debug!("including '{}'", path);
                match self.fetch_list(&path) {
                    Some(included) => {
                        self.include_depth += 1;
                        self.process_list(&included)?;
                        self.include_depth -= 1;
                    }
                    None => {
                        self.outputs.push(Output::new(
                            OutputKind::MissingHeader,
                            hash_location,
                            format!("Header not found: {}", spell_header(&header, system)),
                        ));
                    }
                }
            }
            None => {
                self.outputs.push(Output::new(
                    OutputKind::MissingHeader,
                    hash_location,
                    format!("Header not found: {}", spell_header(&header, system)),
                ));
            }
        }

        Ok(())
    }

    /// Resolves a header name against the search order: quoted includes
    /// look next to the including file first, then on the include paths;
    /// bracketed includes use the include paths only.
    fn resolve_header(
        &mut self,
        header: &str,
        system: bool,
        current_file_index: u32,
    ) -> Option<String> {
        let mut candidates = vec![];

        if header.starts_with('/') {
            candidates.push(header.to_owned());
        }

        if !system {
            let current = &self.files[current_file_index as usize];
            match Path::new(current).parent() {
                Some(parent) if !parent.as_os_str().is_empty() => {
                    candidates.push(format!("{}/{}", parent.to_string_lossy(), header));
                }
                _ => candidates.push(header.to_owned()),
            }
        }

        for root in &self.dui.include_paths {
            candidates.push(format!("{}/{}", root, header));
        }

        for candidate in candidates {
            let simplified = simplify_path(&candidate);
            if self.cache.exists(&simplified) {
                return Some(simplified);
            }
        }

        None
    }
}

/// True when the token opens its line, i.e. a `#` here starts a directive.
fn line_start(list: &TokenList, id: TokenId) -> bool {
    match list.prev_of(id) {
        Some(prev) => {
            let a = list.get(prev).location;
            let b = list.get(id).location;
            a.file_index != b.file_index || a.line != b.line
        }
        None => true,
    }
}

/// Advances past every token on the line of `id`.
fn skip_line(list: &TokenList, id: TokenId) -> Option<TokenId> {
    let line = list.get(id).location;
    let mut cursor = list.next_of(id);
    while let Some(next) = cursor {
        let location = list.get(next).location;
        if location.file_index != line.file_index || location.line != line.line {
            break;
        }
        cursor = list.next_of(next);
    }
    cursor
}

fn materialize(list: &TokenList, first: TokenId, last: TokenId) -> Vec<Token> {
    let mut tokens = vec![];
    let mut cursor = Some(first);
    while let Some(id) = cursor {
        tokens.push(list.get(id).clone());
        if id == last {
            break;
        }
        cursor = list.next_of(id);
    }
    tokens
}

fn directive_text(list: &TokenList, ids: &[TokenId]) -> String {
    ids.iter()
        .map(|&id| list.get(id).str())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Reads an include operand: a quoted header (user search) or a bracketed
/// one (system search).
fn classify_header(tokens: &[Token]) -> Option<(String, bool)> {
    let first = tokens.first()?;

    if first.str().starts_with('"') && first.str().len() >= 2 {
        let inner = &first.str()[1..first.str().len() - 1];
        return Some((inner.to_owned(), false));
    }

    if first.op == '<' {
        let mut name = String::new();
        for token in &tokens[1..] {
            if token.op == '>' {
                return Some((name, true));
            }
            name.push_str(token.str());
        }
    }

    None
}

fn spell_header(header: &str, system: bool) -> String {
    if system {
        format!("<{}>", header)
    } else {
        format!("\"{}\"", header)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        driver::preprocess,
        dui::Dui,
        file_cache::FileDataCache,
        file_provider::MemoryFileProvider,
        lexer::lex_file,
        output::{IfCond, MacroUsage, OutputKind, OutputList},
        token_list::TokenList,
    };
    use pretty_assertions::assert_eq;

    struct Run {
        text: String,
        outputs: OutputList,
        usage: Vec<MacroUsage>,
        if_conds: Vec<IfCond>,
    }

    fn run_with(source: &str, dui: &Dui, provider: &MemoryFileProvider) -> Run {
        let mut files = vec![];
        let mut outputs = vec![];
        let rawtokens = lex_file(source.as_bytes(), "test.c", &mut files, &mut outputs).unwrap();

        let mut cache = FileDataCache::new(provider);
        let mut output = TokenList::new();
        let mut usage = vec![];
        let mut if_conds = vec![];

        preprocess(
            &mut output,
            &rawtokens,
            &mut files,
            &mut cache,
            dui,
            &mut outputs,
            Some(&mut usage),
            Some(&mut if_conds),
        );

        assert!(output.validate());
        Run {
            text: output.stringify(&files, false),
            outputs,
            usage,
            if_conds,
        }
    }

    fn run(source: &str) -> Run {
        run_with(source, &Dui::default(), &MemoryFileProvider::new())
    }

    #[test]
    fn test_empty_input() {
        let result = run("");
        assert_eq!(result.text, "");
        assert!(result.outputs.is_empty());
    }

    #[test]
    fn test_plain_passthrough() {
        let result = run("int x = 1;");
        assert_eq!(result.text, "int x = 1 ;");
    }

    #[test]
    fn test_define_and_expand() {
        let result = run("#define A 1+2\na=A+3;");
        assert_eq!(result.text, "\na = 1 + 2 + 3 ;");
    }

    #[test]
    fn test_define_function_like() {
        let result = run("#define ADD(A,B) A+B\nADD(1+2,3);");
        assert_eq!(result.text, "\n1 + 2 + 3 ;");
    }

    #[test]
    fn test_define_empty_body() {
        let result = run("#define NOTHING\na NOTHING b");
        assert_eq!(result.text, "\na b");
    }

    #[test]
    fn test_undef() {
        let result = run("#define A 1\n#undef A\nA");
        assert_eq!(result.text, "\n\nA");
    }

    #[test]
    fn test_redefine_replaces() {
        let result = run("#define A 1\n#define A 2\nA");
        assert_eq!(result.text, "\n\n2");
    }

    #[test]
    fn test_ifdef() {
        let result = run("#define A\n#ifdef A\nx\n#endif\n#ifdef B\ny\n#endif");
        assert_eq!(result.text, "\n\nx");
    }

    #[test]
    fn test_ifndef() {
        let result = run("#ifndef A\nx\n#endif");
        assert_eq!(result.text, "\nx");
    }

    #[test]
    fn test_if_else() {
        let result = run("#if 0\na\n#else\nb\n#endif");
        assert_eq!(result.text, "\n\n\nb");
    }

    #[test]
    fn test_if_elif() {
        let result = run("#if 0\na\n#elif 1\nb\n#elif 1\nc\n#else\nd\n#endif");
        assert_eq!(result.text, "\n\n\nb");
    }

    #[test]
    fn test_if_defined_or() {
        let mut dui = Dui::default();
        dui.defines.push("A=1".to_owned());
        let result = run_with(
            "#if defined(A)||defined(B)\nX\n#endif",
            &dui,
            &MemoryFileProvider::new(),
        );
        assert_eq!(result.text, "\nX");
    }

    #[test]
    fn test_nested_false_branch() {
        let result = run("#if 0\n#if 1\na\n#endif\nb\n#endif\nc");
        assert_eq!(result.text, "\n\n\n\n\n\nc");
    }

    #[test]
    fn test_error_directive_clears_output() {
        let result = run("x\n#error boom\ny");
        assert_eq!(result.text, "");
        assert_eq!(result.outputs.len(), 1);
        assert_eq!(result.outputs[0].kind, OutputKind::Error);
        assert_eq!(result.outputs[0].message, "#error boom");
    }

    #[test]
    fn test_error_in_false_branch_is_silent() {
        let result = run("#if 0\n#error boom\n#endif\nx");
        assert_eq!(result.text, "\n\n\nx");
        assert!(result.outputs.is_empty());
    }

    #[test]
    fn test_warning_directive() {
        let result = run("#warning careful\nx");
        assert_eq!(result.text, "\nx");
        assert_eq!(result.outputs[0].kind, OutputKind::Warning);
    }

    #[test]
    fn test_endif_without_if() {
        let result = run("#endif\nx");
        assert_eq!(result.outputs[0].kind, OutputKind::SyntaxError);
        assert_eq!(result.outputs[0].message, "#endif without #if");
        assert_eq!(result.text, "\nx");
    }

    #[test]
    fn test_if_evaluation_failure_is_fatal() {
        let result = run("#if 3>sizeof\nx\n#endif");
        assert_eq!(result.text, "");
        assert_eq!(result.outputs.len(), 1);
        assert_eq!(result.outputs[0].kind, OutputKind::SyntaxError);
        assert_eq!(
            result.outputs[0].message,
            "failed to evaluate #if condition, missing sizeof argument"
        );
    }

    #[test]
    fn test_include_user_header() {
        let mut provider = MemoryFileProvider::new();
        provider.add_file("inc/a.h", "int a;");

        let mut dui = Dui::default();
        dui.include_paths.push("inc".to_owned());

        let result = run_with("#include \"a.h\"\na=1;", &dui, &provider);
        assert_eq!(result.text, "int a ;\na = 1 ;");
    }

    #[test]
    fn test_include_missing_header() {
        let result = run("#include \"missing.h\"\nx");
        assert_eq!(result.outputs[0].kind, OutputKind::MissingHeader);
        assert_eq!(result.outputs[0].message, "Header not found: \"missing.h\"");
        assert_eq!(result.text, "\nx");
    }

    #[test]
    fn test_include_computed_by_macro() {
        let mut provider = MemoryFileProvider::new();
        provider.add_file("inc/a.h", "int a;");

        let mut dui = Dui::default();
        dui.include_paths.push("inc".to_owned());

        let result = run_with("#define HDR \"a.h\"\n#include HDR", &dui, &provider);
        assert!(result.text.contains("int a ;"));
        assert!(result.outputs.is_empty());
    }

    #[test]
    fn test_include_recursion_hits_depth_limit() {
        let mut provider = MemoryFileProvider::new();
        provider.add_file("self.h", "#include \"self.h\"");

        let mut dui = Dui::default();
        dui.include_paths.push(".".to_owned());

        let result = run_with("#include \"self.h\"", &dui, &provider);
        assert!(
            result
                .outputs
                .iter()
                .any(|o| o.kind == OutputKind::IncludeNestedTooDeeply)
        );
        assert_eq!(result.text, "");
    }

    #[test]
    fn test_forced_include() {
        let mut provider = MemoryFileProvider::new();
        provider.add_file("pre.h", "#define FROM_PRE 1");

        let mut dui = Dui::default();
        dui.includes.push("pre.h".to_owned());

        let result = run_with("FROM_PRE", &dui, &provider);
        assert_eq!(result.text, "1");
    }

    #[test]
    fn test_forced_include_missing() {
        let mut dui = Dui::default();
        dui.includes.push("pre.h".to_owned());

        let result = run_with("x", &dui, &MemoryFileProvider::new());
        assert_eq!(result.outputs[0].kind, OutputKind::ExplicitIncludeNotFound);
        assert_eq!(result.text, "x");
    }

    #[test]
    fn test_has_include() {
        let mut provider = MemoryFileProvider::new();
        provider.add_file("inc/yes.h", "");

        let mut dui = Dui::default();
        dui.include_paths.push("inc".to_owned());

        let result = run_with(
            "#if __has_include(\"yes.h\")\na\n#endif\n#if __has_include(\"no.h\")\nb\n#endif",
            &dui,
            &provider,
        );
        assert_eq!(result.text, "\na");
    }

    #[test]
    fn test_pragma_passes_through() {
        let result = run("#pragma once\nx");
        assert_eq!(result.text, "# pragma once\nx");
    }

    #[test]
    fn test_null_directive() {
        let result = run("#\nx");
        assert_eq!(result.text, "\nx");
    }

    #[test]
    fn test_counter_is_monotonic_per_invocation() {
        let result = run("__COUNTER__ __COUNTER__\n__COUNTER__");
        assert_eq!(result.text, "0 1\n2");

        // A fresh driver invocation starts over.
        let again = run("__COUNTER__");
        assert_eq!(again.text, "0");
    }

    #[test]
    fn test_predefined_std_macro() {
        let mut dui = Dui::default();
        dui.std = "c11".to_owned();
        let result = run_with(
            "#if __STDC_VERSION__ >= 201112L\nmodern\n#endif",
            &dui,
            &MemoryFileProvider::new(),
        );
        assert_eq!(result.text, "\nmodern");
    }

    #[test]
    fn test_undefined_name_blocks_define() {
        let mut dui = Dui::default();
        dui.undefined.insert("A".to_owned());
        let result = run_with("#define A 1\nA", &dui, &MemoryFileProvider::new());
        assert_eq!(result.text, "\nA");
    }

    #[test]
    fn test_remove_comments() {
        let mut dui = Dui::default();
        dui.remove_comments = true;
        let result = run_with("x // tail\ny /* b */ z", &dui, &MemoryFileProvider::new());
        assert_eq!(result.text, "x\ny z");
    }

    #[test]
    fn test_comments_preserved_by_default() {
        let result = run("x // tail");
        assert_eq!(result.text, "x // tail");
    }

    #[test]
    fn test_macro_usage_reporting() {
        let result = run("#define ONE 1\n#define TWO ONE+ONE\nTWO");
        let names: Vec<&str> = result.usage.iter().map(|u| u.macro_name.as_str()).collect();
        assert_eq!(names, vec!["TWO", "ONE", "ONE"]);
        assert_eq!(result.usage[0].use_location.line, 3);
        assert_eq!(result.usage[0].define_location.line, 2);
    }

    #[test]
    fn test_if_cond_reporting() {
        let result = run("#if 1+1\nx\n#endif");
        assert_eq!(result.if_conds.len(), 1);
        assert_eq!(result.if_conds[0].condition, "1 + 1");
        assert_eq!(result.if_conds[0].result, 2);
    }

    #[test]
    fn test_wrong_parameter_count_reported() {
        let result = run("#define ADD(a,b) a+b\nADD(1)");
        assert_eq!(result.outputs.len(), 1);
        assert_eq!(result.outputs[0].kind, OutputKind::SyntaxError);
        assert_eq!(
            result.outputs[0].message,
            "failed to expand 'ADD', wrong number of parameters"
        );
    }

    #[test]
    fn test_malformed_define_reported() {
        let result = run("#define\nx");
        assert_eq!(result.outputs[0].kind, OutputKind::SyntaxError);
        assert_eq!(result.outputs[0].message, "Failed to parse #define");
        assert_eq!(result.text, "\nx");
    }
}
