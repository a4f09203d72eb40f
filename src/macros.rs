// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use std::collections::{HashMap, HashSet};

use log::debug;

use crate::{
    error::PreprocessError,
    lexer::lex,
    location::Location,
    output::MacroUsage,
    token::Token,
};

/// A macro definition parsed from a `#define` directive.
///
/// See: https://en.cppreference.com/w/c/preprocessor/replace.html
#[derive(Debug, Clone)]
pub struct Macro {
    pub name: String,
    pub function_like: bool,

    /// The named parameters, without the variadic marker.
    pub parameters: Vec<String>,

    /// True when the parameter list ends with `...` or `name...`.
    pub variadic: bool,

    /// The name the body uses for the variadic arguments:
    /// `__VA_ARGS__` for an anonymous `...`, the given name otherwise.
    pub variadic_name: String,

    /// The replacement tokens.
    pub body: Vec<Token>,

    pub define_location: Location,
}

impl Macro {
    /// Parses the tokens following `# define` on a directive line.
    ///
    /// The macro is function-like only when the `(` directly follows the
    /// name with no whitespace in between; `#define A (x)` is an
    /// object-like macro whose body starts with `(`.
    pub fn parse_define(
        tokens: &[&Token],
        directive_location: Location,
    ) -> Result<Macro, PreprocessError> {
        let failed = || PreprocessError::syntax(directive_location, "Failed to parse #define");

        let name_token = *tokens.first().ok_or_else(failed)?;
        if !name_token.name {
            return Err(failed());
        }

        let adjacent_paren = tokens.get(1).is_some_and(|t| {
            t.op == '('
                && t.location.line == name_token.location.line
                && t.location.col == name_token.location.col + name_token.str().len() as u32
        });

        let mut parameters = vec![];
        let mut variadic = false;
        let mut variadic_name = String::new();
        let mut body_start = 1;

        if adjacent_paren {
            let mut index = 2;
            loop {
                let token = *tokens.get(index).ok_or_else(failed)?;

                if token.op == ')' {
                    index += 1;
                    break;
                }

                if variadic {
                    // Nothing may follow the variadic marker.
                    return Err(failed());
                }

                if token.str() == "..." {
                    variadic = true;
                    variadic_name = "__VA_ARGS__".to_owned();
                    index += 1;
                } else if token.name {
                    if tokens.get(index + 1).is_some_and(|t| t.str() == "...") {
                        // A named variadic parameter, `name...`.
                        variadic = true;
                        variadic_name = token.str().to_owned();
                        index += 2;
                    } else {
                        parameters.push(token.str().to_owned());
                        index += 1;
                    }
                } else {
                    return Err(failed());
                }

                // A comma continues the list; the closing parenthesis
                // ends it.
                match tokens.get(index) {
                    Some(t) if t.op == ',' => index += 1,
                    Some(t) if t.op == ')' => {}
                    _ => return Err(failed()),
                }
            }
            body_start = index;
        }

        let body = tokens[body_start..]
            .iter()
            .map(|t| (*t).clone())
            .collect::<Vec<_>>();

        Ok(Macro {
            name: name_token.str().to_owned(),
            function_like: adjacent_paren,
            parameters,
            variadic,
            variadic_name,
            body,
            define_location: name_token.location,
        })
    }
}

/// The macro table. Redefinition replaces the previous entry; `#undef`
/// removes it.
#[derive(Default)]
pub struct MacroMap {
    macros: HashMap<String, Macro>,
}

impl MacroMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, definition: Macro) {
        debug!("define macro '{}'", definition.name);
        self.macros.insert(definition.name.clone(), definition);
    }

    pub fn remove(&mut self, name: &str) -> bool {
        debug!("undefine macro '{}'", name);
        self.macros.remove(name).is_some()
    }

    pub fn get(&self, name: &str) -> Option<&Macro> {
        self.macros.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.macros.contains_key(name)
    }
}

/// The values of the builtin macros that carry driver state. The counter
/// lives here, never in a process-wide variable, so independent driver
/// invocations stay isolated.
pub struct Builtins {
    pub date: String,
    pub time: String,
    pub counter: u64,
}

/// True for the macros that are always defined and computed on the fly.
pub fn is_builtin(name: &str) -> bool {
    matches!(
        name,
        "__FILE__" | "__LINE__" | "__COUNTER__" | "__DATE__" | "__TIME__"
    )
}

/// Shared state threaded through an expansion.
pub struct ExpandState<'a> {
    pub macros: &'a MacroMap,
    pub builtins: &'a mut Builtins,
    pub usage: &'a mut Vec<MacroUsage>,
}

/// Expands every macro in `tokens`, reading function-like invocation
/// arguments from the same sequence. Non-macro tokens keep their own
/// locations; expanded tokens are produced at their call-site location and
/// stamped with the outermost macro name.
pub fn expand_tokens(
    state: &mut ExpandState,
    files: &[String],
    tokens: &[Token],
) -> Result<Vec<Token>, PreprocessError> {
    let mut cursor = Cursor::new(tokens);
    let mut output = vec![];
    expand_sequence(
        state,
        files,
        &mut cursor,
        &HashSet::new(),
        &WalkMode {
            fixed_location: None,
            raw_stamp: None,
            macro_stamp: None,
        },
        &mut output,
    )?;
    Ok(output)
}

struct Cursor<'t> {
    tokens: &'t [Token],
    pos: usize,
}

impl<'t> Cursor<'t> {
    fn new(tokens: &'t [Token]) -> Self {
        Self { tokens, pos: 0 }
    }

    fn next(&mut self) -> Option<&'t Token> {
        let token = self.tokens.get(self.pos);
        if token.is_some() {
            self.pos += 1;
        }
        token
    }

    fn peek(&self, offset: usize) -> Option<&'t Token> {
        self.tokens.get(self.pos + offset)
    }

    /// True when the next non-comment token is `(`; consumes the comments
    /// and the parenthesis when it is.
    fn consume_open_paren(&mut self) -> bool {
        let mut offset = 0;
        while self.peek(offset).is_some_and(|t| t.comment) {
            offset += 1;
        }
        if self.peek(offset).is_some_and(|t| t.op == '(') {
            self.pos += offset + 1;
            true
        } else {
            false
        }
    }
}

/// How copied tokens are located and attributed during a walk.
struct WalkMode<'a> {
    /// `Some` inside an expansion: every produced token is placed at the
    /// call site. `None` for raw streams, which keep token locations.
    fixed_location: Option<Location>,

    /// The macro name stamped on verbatim-copied tokens. `None` keeps the
    /// token's own attribution (raw source stays raw).
    raw_stamp: Option<&'a str>,

    /// The outermost macro name, forced onto everything nested expansions
    /// produce. `None` at the top level, where each expansion stamps its
    /// own name.
    macro_stamp: Option<&'a str>,
}

/// Walks a token sequence, expanding macro invocations and builtins and
/// copying everything else.
fn expand_sequence(
    state: &mut ExpandState,
    files: &[String],
    cursor: &mut Cursor,
    expanded: &HashSet<String>,
    mode: &WalkMode,
    output: &mut Vec<Token>,
) -> Result<(), PreprocessError> {
    while let Some(token) = cursor.next() {
        if token.name && !expanded.contains(token.str()) {
            if let Some(mac) = state.macros.get(token.str()) {
                let location = mode.fixed_location.unwrap_or(token.location);

                if mac.function_like {
                    if cursor.consume_open_paren() {
                        expand_call(
                            state,
                            files,
                            mac,
                            cursor,
                            location,
                            expanded,
                            mode.macro_stamp,
                            output,
                        )?;
                        continue;
                    }
                    // A function-like macro name without an argument list
                    // is not an invocation.
                } else {
                    expand_call(
                        state,
                        files,
                        mac,
                        cursor,
                        location,
                        expanded,
                        mode.macro_stamp,
                        output,
                    )?;
                    continue;
                }
            } else if is_builtin(token.str()) {
                let location = mode.fixed_location.unwrap_or(token.location);
                output.push(builtin_value(state, files, token.str(), location));
                continue;
            }
        }

        let mut copy = token.clone();
        if let Some(location) = mode.fixed_location {
            copy.location = location;
        }
        if let Some(stamp) = mode.raw_stamp {
            copy.macro_name = stamp.to_owned();
        }
        output.push(copy);
    }

    Ok(())
}

fn builtin_value(state: &mut ExpandState, files: &[String], name: &str, location: Location) -> Token {
    let lexeme = match name {
        "__FILE__" => format!("\"{}\"", files[location.file_index as usize]),
        "__LINE__" => location.line.to_string(),
        "__COUNTER__" => {
            let value = state.builtins.counter;
            state.builtins.counter += 1;
            value.to_string()
        }
        "__DATE__" => format!("\"{}\"", state.builtins.date),
        "__TIME__" => format!("\"{}\"", state.builtins.time),
        _ => unreachable!(),
    };

    let mut token = Token::new(lexeme, location);
    token.macro_name = name.to_owned();
    token
}

/// The collected invocation arguments of one function-like expansion.
struct Arguments<'a> {
    parameters: &'a [String],
    variadic_name: &'a str,
    values: Vec<Vec<Token>>,
}

impl Arguments<'_> {
    fn empty() -> Arguments<'static> {
        Arguments {
            parameters: &[],
            variadic_name: "",
            values: vec![],
        }
    }

    fn is_parameter(&self, name: &str) -> bool {
        self.parameters.iter().any(|p| p == name)
            || (!self.variadic_name.is_empty() && name == self.variadic_name)
    }

    /// The raw (unexpanded) tokens bound to a parameter. The variadic name
    /// yields the remaining arguments joined with comma tokens.
    fn raw_tokens(&self, name: &str, location: Location) -> Vec<Token> {
        if let Some(position) = self.parameters.iter().position(|p| p == name) {
            return self.values.get(position).cloned().unwrap_or_default();
        }

        let mut joined = vec![];
        for (index, value) in self.values[self.parameters.len().min(self.values.len())..]
            .iter()
            .enumerate()
        {
            if index > 0 {
                joined.push(Token::new(",", location));
            }
            joined.extend(value.iter().cloned());
        }
        joined
    }

    fn varargs_empty(&self) -> bool {
        self.values[self.parameters.len().min(self.values.len())..]
            .iter()
            .all(|value| value.is_empty())
    }
}

/// Expands one macro whose name has already been consumed; for a
/// function-like macro the cursor stands right after the opening
/// parenthesis.
#[allow(clippy::too_many_arguments)]
fn expand_call(
    state: &mut ExpandState,
    files: &[String],
    mac: &Macro,
    cursor: &mut Cursor,
    location: Location,
    expanded: &HashSet<String>,
    stamp: Option<&str>,
    output: &mut Vec<Token>,
) -> Result<(), PreprocessError> {
    state.usage.push(MacroUsage {
        macro_name: mac.name.clone(),
        define_location: mac.define_location,
        use_location: location,
    });

    let values = if mac.function_like {
        collect_arguments(cursor, &mac.name, location)?
    } else {
        vec![]
    };

    if mac.function_like {
        let count_matches = if mac.variadic {
            values.len() >= mac.parameters.len()
        } else {
            values.len() == mac.parameters.len()
                || (mac.parameters.is_empty() && values.len() == 1 && values[0].is_empty())
        };

        if !count_matches {
            return Err(PreprocessError::syntax(
                location,
                format!("failed to expand '{}', wrong number of parameters", mac.name),
            ));
        }
    }

    let arguments = if mac.function_like {
        Arguments {
            parameters: &mac.parameters,
            variadic_name: if mac.variadic { &mac.variadic_name } else { "" },
            values,
        }
    } else {
        Arguments::empty()
    };

    let mut painted = expanded.clone();
    painted.insert(mac.name.clone());

    expand_body(
        state,
        files,
        mac,
        &arguments,
        location,
        expanded,
        &painted,
        stamp.unwrap_or(&mac.name),
        stamp.is_none(),
        output,
    )
}

/// Reads the invocation arguments up to the matching `)`. Top-level commas
/// separate arguments; nested parentheses are respected.
fn collect_arguments(
    cursor: &mut Cursor,
    name: &str,
    location: Location,
) -> Result<Vec<Vec<Token>>, PreprocessError> {
    let mut values: Vec<Vec<Token>> = vec![vec![]];
    let mut depth = 0;

    loop {
        let token = cursor.next().ok_or_else(|| {
            PreprocessError::syntax(
                location,
                format!("failed to expand '{}', missing ')'", name),
            )
        })?;

        match token.op {
            '(' => {
                depth += 1;
                values.last_mut().unwrap().push(token.clone());
            }
            ')' if depth == 0 => break,
            ')' => {
                depth -= 1;
                values.last_mut().unwrap().push(token.clone());
            }
            ',' if depth == 0 => values.push(vec![]),
            _ => values.last_mut().unwrap().push(token.clone()),
        }
    }

    Ok(values)
}

/// Walks the replacement tokens of one expansion frame, handling
/// stringification, pasting, and parameter substitution.
#[allow(clippy::too_many_arguments)]
fn expand_body(
    state: &mut ExpandState,
    files: &[String],
    mac: &Macro,
    arguments: &Arguments,
    location: Location,
    outer_expanded: &HashSet<String>,
    painted: &HashSet<String>,
    stamp: &str,
    top_level: bool,
    output: &mut Vec<Token>,
) -> Result<(), PreprocessError> {
    let body_start = output.len();
    let mut cursor = Cursor::new(&mac.body);

    while let Some(token) = cursor.next() {
        // Stringification: `#` followed by a parameter name, in
        // function-like macros only.
        if token.op == '#'
            && mac.function_like
            && cursor
                .peek(0)
                .is_some_and(|t| t.name && arguments.is_parameter(t.str()))
        {
            let parameter = cursor.next().unwrap();
            let raw = arguments.raw_tokens(parameter.str(), location);
            let mut lexeme = stringify_tokens(&raw);
            lexeme.insert(0, '"');
            lexeme.push('"');

            let mut produced = Token::new(lexeme, location);
            produced.macro_name = stamp.to_owned();
            output.push(produced);
            continue;
        }

        // Token pasting. The left operand is whatever the walk emitted
        // last; the right operand is taken before expansion.
        if token.str() == "##" {
            if output.len() == body_start {
                return Err(PreprocessError::syntax(
                    location,
                    format!(
                        "Invalid ## usage when expanding '{}': the ## operator is at the beginning",
                        mac.name
                    ),
                ));
            }

            let right = cursor.next().ok_or_else(|| {
                PreprocessError::syntax(
                    location,
                    format!(
                        "Invalid ## usage when expanding '{}': the ## operator is at the end",
                        mac.name
                    ),
                )
            })?;

            let right_tokens = if right.name && arguments.is_parameter(right.str()) {
                let raw = arguments.raw_tokens(right.str(), location);

                // GCC extension: `, ## __VA_ARGS__` drops the comma when
                // the variadic arguments are empty, and degrades to a
                // plain substitution otherwise.
                if !arguments.variadic_name.is_empty()
                    && right.str() == arguments.variadic_name
                    && output.last().is_some_and(|t| t.op == ',')
                {
                    if arguments.varargs_empty() {
                        output.pop();
                    } else {
                        for token in raw {
                            let mut copy = token;
                            copy.location = location;
                            copy.macro_name = stamp.to_owned();
                            output.push(copy);
                        }
                    }
                    continue;
                }

                if raw.is_empty() {
                    // Pasting with an empty argument leaves the left
                    // operand unchanged.
                    continue;
                }
                raw
            } else {
                vec![right.clone()]
            };

            let left = output.last_mut().unwrap();
            let combined = format!("{}{}", left.str(), right_tokens[0].str());
            if !paste_forms_single_token(&combined) {
                return Err(PreprocessError::syntax(
                    location,
                    format!(
                        "Invalid ## usage when expanding '{}': combining '{}' and '{}' does not form a valid token",
                        mac.name,
                        left.str(),
                        right_tokens[0].str()
                    ),
                ));
            }
            left.set_str(combined);

            for extra in &right_tokens[1..] {
                let mut copy = extra.clone();
                copy.location = location;
                copy.macro_name = stamp.to_owned();
                output.push(copy);
            }
            continue;
        }

        // An operand of an upcoming `##` is emitted before expansion.
        if cursor.peek(0).is_some_and(|t| t.str() == "##") {
            if token.name && arguments.is_parameter(token.str()) {
                for raw in arguments.raw_tokens(token.str(), location) {
                    let mut copy = raw;
                    copy.location = location;
                    copy.macro_name = stamp.to_owned();
                    output.push(copy);
                }
            } else {
                let mut copy = token.clone();
                copy.location = location;
                copy.macro_name = stamp.to_owned();
                output.push(copy);
            }
            continue;
        }

        // Parameter substitution, with full macro expansion of the
        // argument. The argument came from the caller's context, so the
        // outer painted set applies, not this frame's.
        if token.name && arguments.is_parameter(token.str()) {
            let raw = arguments.raw_tokens(token.str(), location);
            let mut argument_cursor = Cursor::new(&raw);
            expand_sequence(
                state,
                files,
                &mut argument_cursor,
                outer_expanded,
                &WalkMode {
                    fixed_location: Some(location),
                    raw_stamp: if top_level { None } else { Some(stamp) },
                    macro_stamp: Some(stamp),
                },
                output,
            )?;
            continue;
        }

        // A macro invocation inside the body.
        if token.name && !painted.contains(token.str()) {
            if let Some(nested) = state.macros.get(token.str()) {
                if nested.function_like {
                    if cursor.consume_open_paren() {
                        expand_call(
                            state,
                            files,
                            nested,
                            &mut cursor,
                            location,
                            painted,
                            Some(stamp),
                            output,
                        )?;
                        continue;
                    }
                } else {
                    expand_call(
                        state,
                        files,
                        nested,
                        &mut cursor,
                        location,
                        painted,
                        Some(stamp),
                        output,
                    )?;
                    continue;
                }
            } else if is_builtin(token.str()) {
                let mut produced = builtin_value(state, files, token.str(), location);
                produced.macro_name = stamp.to_owned();
                output.push(produced);
                continue;
            }
        }

        let mut copy = token.clone();
        copy.location = location;
        copy.macro_name = stamp.to_owned();
        output.push(copy);
    }

    Ok(())
}

/// Joins argument tokens for stringification: a single space is inserted
/// only where the source had whitespace, and `"` and `\` are escaped.
fn stringify_tokens(tokens: &[Token]) -> String {
    let mut text = String::new();

    for (index, token) in tokens.iter().enumerate() {
        if index > 0 {
            let previous = &tokens[index - 1];
            let adjacent = token.location.file_index == previous.location.file_index
                && token.location.line == previous.location.line
                && token.location.col == previous.location.col + previous.str().len() as u32;
            if !adjacent {
                text.push(' ');
            }
        }

        for c in token.str().chars() {
            if c == '"' || c == '\\' {
                text.push('\\');
            }
            text.push(c);
        }
    }

    text
}

/// A pasted lexeme is valid only when it lexes back to exactly one token.
fn paste_forms_single_token(lexeme: &str) -> bool {
    let mut files = vec![];
    let mut outputs = vec![];
    match lex(lexeme, 0, &mut files, &mut outputs) {
        Ok(list) => list.len() == 1 && outputs.is_empty(),
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        lexer::lex,
        location::Location,
        macros::{Builtins, ExpandState, Macro, MacroMap, expand_tokens},
        output::MacroUsage,
        token::Token,
    };
    use pretty_assertions::assert_eq;

    fn lex_tokens(source: &str) -> Vec<Token> {
        let mut files = vec!["test.c".to_owned()];
        let mut outputs = vec![];
        let list = lex(source, 0, &mut files, &mut outputs).unwrap();
        list.iter().cloned().collect()
    }

    fn parse(definition: &str) -> Macro {
        let tokens = lex_tokens(definition);
        let references: Vec<&Token> = tokens.iter().collect();
        Macro::parse_define(&references, Location::default()).unwrap()
    }

    fn expand(definitions: &[&str], source: &str) -> String {
        expand_with_usage(definitions, source).0
    }

    fn expand_with_usage(definitions: &[&str], source: &str) -> (String, Vec<MacroUsage>) {
        let mut macros = MacroMap::new();
        for definition in definitions {
            macros.insert(parse(definition));
        }

        let mut builtins = Builtins {
            date: "Jan  1 2026".to_owned(),
            time: "00:00:00".to_owned(),
            counter: 0,
        };
        let mut usage = vec![];
        let mut state = ExpandState {
            macros: &macros,
            builtins: &mut builtins,
            usage: &mut usage,
        };

        let files = vec!["test.c".to_owned()];
        let tokens = lex_tokens(source);
        let output = expand_tokens(&mut state, &files, &tokens).unwrap();
        let text = output
            .iter()
            .map(|t| t.str().to_owned())
            .collect::<Vec<_>>()
            .join(" ");
        (text, usage)
    }

    fn expand_error(definitions: &[&str], source: &str) -> String {
        let mut macros = MacroMap::new();
        for definition in definitions {
            macros.insert(parse(definition));
        }

        let mut builtins = Builtins {
            date: String::new(),
            time: String::new(),
            counter: 0,
        };
        let mut usage = vec![];
        let mut state = ExpandState {
            macros: &macros,
            builtins: &mut builtins,
            usage: &mut usage,
        };

        let files = vec!["test.c".to_owned()];
        let tokens = lex_tokens(source);
        expand_tokens(&mut state, &files, &tokens)
            .unwrap_err()
            .message
    }

    #[test]
    fn test_parse_define_object_like() {
        let mac = parse("A 1+2");
        assert_eq!(mac.name, "A");
        assert!(!mac.function_like);
        assert_eq!(
            mac.body.iter().map(|t| t.str()).collect::<Vec<_>>(),
            vec!["1", "+", "2"]
        );
    }

    #[test]
    fn test_parse_define_empty_body() {
        let mac = parse("EMPTY");
        assert!(mac.body.is_empty());
    }

    #[test]
    fn test_parse_define_function_like() {
        let mac = parse("ADD(A,B) A+B");
        assert!(mac.function_like);
        assert_eq!(mac.parameters, vec!["A", "B"]);
        assert!(!mac.variadic);
    }

    #[test]
    fn test_parse_define_space_before_paren_is_object_like() {
        let mac = parse("A (x)");
        assert!(!mac.function_like);
        assert_eq!(
            mac.body.iter().map(|t| t.str()).collect::<Vec<_>>(),
            vec!["(", "x", ")"]
        );
    }

    #[test]
    fn test_parse_define_variadic() {
        let mac = parse("LOG(fmt, ...) printf(fmt, __VA_ARGS__)");
        assert!(mac.variadic);
        assert_eq!(mac.parameters, vec!["fmt"]);
        assert_eq!(mac.variadic_name, "__VA_ARGS__");

        let named = parse("LOG(fmt, args...) printf(fmt, args)");
        assert!(named.variadic);
        assert_eq!(named.variadic_name, "args");
    }

    #[test]
    fn test_parse_define_malformed() {
        let tokens = lex_tokens("1BAD x");
        let references: Vec<&Token> = tokens.iter().collect();
        assert!(Macro::parse_define(&references, Location::default()).is_err());
    }

    #[test]
    fn test_expand_object_like() {
        assert_eq!(expand(&["A 1+2"], "a=A+3;"), "a = 1 + 2 + 3 ;");
    }

    #[test]
    fn test_expand_function_like() {
        assert_eq!(expand(&["ADD(A,B) A+B"], "ADD(1+2,3);"), "1 + 2 + 3 ;");
    }

    #[test]
    fn test_expand_nested_invocation() {
        assert_eq!(expand(&["add(x,y) x+y"], "add(add(1,2),3)"), "1 + 2 + 3");
    }

    #[test]
    fn test_expand_macro_in_body() {
        assert_eq!(expand(&["ONE 1", "TWO ONE+ONE"], "TWO"), "1 + 1");
    }

    #[test]
    fn test_expand_zero_parameters() {
        assert_eq!(expand(&["F() 42"], "F()"), "42");
    }

    #[test]
    fn test_expand_empty_body() {
        assert_eq!(expand(&["NOTHING"], "a NOTHING b"), "a b");
    }

    #[test]
    fn test_expand_function_like_without_parens() {
        // Without an argument list the name is not an invocation.
        assert_eq!(expand(&["F(x) x"], "F;"), "F ;");
    }

    #[test]
    fn test_expand_self_reference() {
        // A macro name is not re-expanded inside its own expansion.
        assert_eq!(expand(&["a a"], "a"), "a");
        assert_eq!(expand(&["x y", "y x"], "x"), "x");
        assert_eq!(expand(&["f(x) f(x)"], "f(1)"), "f ( 1 )");
    }

    #[test]
    fn test_expand_stringify() {
        assert_eq!(expand(&["a(x) #x"], "a(1)"), "\"1\"");

        // Spacing follows the source: adjacent tokens stay adjacent.
        assert_eq!(expand(&["a(x) #x"], "a(2+3)"), "\"2+3\"");
        assert_eq!(expand(&["a(x) #x"], "a(2 + 3)"), "\"2 + 3\"");

        // Quotes and backslashes are escaped.
        assert_eq!(expand(&["a(x) #x"], "a(\"hi\")"), "\"\\\"hi\\\"\"");
    }

    #[test]
    fn test_expand_paste() {
        assert_eq!(
            expand(
                &["MACRO(A,B,C) class A##B##C##Creator {};"],
                "MACRO( B , U , G )"
            ),
            "class BUGCreator { } ;"
        );
        assert_eq!(expand(&["CAT(a,b) a##b"], "CAT(1,2)"), "12");
    }

    #[test]
    fn test_expand_paste_object_like() {
        assert_eq!(expand(&["AB x##y"], "AB"), "xy");
    }

    #[test]
    fn test_expand_paste_hash_hash_hash() {
        // `# ## #` produces a literal `##` token.
        assert_eq!(expand(&["HASH_HASH # ## #"], "HASH_HASH"), "##");
    }

    #[test]
    fn test_expand_paste_invalid() {
        let message = expand_error(&["BAD(x) +##x"], "BAD(y)");
        assert!(
            message.starts_with("Invalid ## usage when expanding 'BAD':"),
            "{}",
            message
        );

        let message = expand_error(&["BAD2(x) ## x"], "BAD2(y)");
        assert!(
            message.starts_with("Invalid ## usage when expanding 'BAD2':"),
            "{}",
            message
        );
    }

    #[test]
    fn test_expand_paste_operand_not_expanded() {
        // The paste operates on pre-expansion tokens.
        assert_eq!(
            expand(&["ONE 1", "CAT(a,b) a##b"], "CAT(ONE,2)"),
            "ONE2"
        );
    }

    #[test]
    fn test_expand_variadic() {
        assert_eq!(
            expand(&["P(fmt, ...) f(fmt, __VA_ARGS__)"], "P(\"x\", 1, 2)"),
            "f ( \"x\" , 1 , 2 )"
        );
    }

    #[test]
    fn test_expand_variadic_named() {
        assert_eq!(
            expand(&["P(fmt, args...) f(fmt, args)"], "P(\"x\", 1, 2)"),
            "f ( \"x\" , 1 , 2 )"
        );
    }

    #[test]
    fn test_expand_variadic_comma_elision() {
        // `, ## __VA_ARGS__` drops the comma when no variadic arguments
        // are given.
        let definitions = &["P(fmt, ...) f(fmt, ##__VA_ARGS__)"];
        assert_eq!(expand(definitions, "P(\"x\")"), "f ( \"x\" )");
        assert_eq!(expand(definitions, "P(\"x\", 1)"), "f ( \"x\" , 1 )");
    }

    #[test]
    fn test_expand_wrong_parameter_count() {
        let message = expand_error(&["ADD(a,b) a+b"], "ADD(1)");
        assert_eq!(message, "failed to expand 'ADD', wrong number of parameters");
    }

    #[test]
    fn test_expand_missing_closing_paren() {
        let message = expand_error(&["F(x) x"], "F(1");
        assert_eq!(message, "failed to expand 'F', missing ')'");
    }

    #[test]
    fn test_expand_builtin_counter() {
        assert_eq!(
            expand(&[], "__COUNTER__ __COUNTER__ __COUNTER__"),
            "0 1 2"
        );
    }

    #[test]
    fn test_expand_builtin_line() {
        assert_eq!(expand(&[], "a\nb __LINE__"), "a b 2");
    }

    #[test]
    fn test_expand_builtin_file() {
        assert_eq!(expand(&[], "__FILE__"), "\"test.c\"");
    }

    #[test]
    fn test_expand_macro_stamp() {
        let mut macros = MacroMap::new();
        macros.insert(parse("A B+1"));
        macros.insert(parse("B 2"));

        let mut builtins = Builtins {
            date: String::new(),
            time: String::new(),
            counter: 0,
        };
        let mut usage = vec![];
        let mut state = ExpandState {
            macros: &macros,
            builtins: &mut builtins,
            usage: &mut usage,
        };

        let files = vec!["test.c".to_owned()];
        let tokens = lex_tokens("x=A;");
        let output = expand_tokens(&mut state, &files, &tokens).unwrap();

        // Tokens produced by the expansion carry the outermost macro name;
        // raw tokens stay unattributed.
        let stamps: Vec<&str> = output.iter().map(|t| t.macro_name.as_str()).collect();
        assert_eq!(stamps, vec!["", "", "A", "A", "A", ""]);
    }

    #[test]
    fn test_expand_usage_reporting() {
        let (_, usage) = expand_with_usage(&["ONE 1", "TWO ONE+ONE"], "TWO");
        let names: Vec<&str> = usage.iter().map(|u| u.macro_name.as_str()).collect();
        assert_eq!(names, vec!["TWO", "ONE", "ONE"]);
    }
}
