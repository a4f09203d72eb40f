// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use crate::{
    decoder::decode,
    error::PreprocessError,
    location::{Location, intern_file},
    output::{Output, OutputKind, OutputList},
    token::Token,
    token_list::{TokenId, TokenList},
};

/// Decodes `data` (see [`crate::decoder::decode`]), interns `filename`,
/// and lexes the content into a token list.
pub fn lex_file(
    data: &[u8],
    filename: &str,
    files: &mut Vec<String>,
    outputs: &mut OutputList,
) -> Result<TokenList, PreprocessError> {
    let text = decode(data)?;
    let file_index = intern_file(files, filename);
    lex(&text, file_index, files, outputs)
}

/// Turns source text into a token list.
///
/// Non-fatal findings (portability backslashes, stray high-bit bytes) are
/// appended to `outputs`; a fatal failure (unterminated literal or block
/// comment, malformed sentinel) discards the partial token list and is
/// returned as an error for the caller to report.
pub fn lex(
    text: &str,
    file_index: u32,
    files: &mut Vec<String>,
    outputs: &mut OutputList,
) -> Result<TokenList, PreprocessError> {
    let chars = splice_lines(text, file_index, outputs);
    let mut lexer = Lexer::new(chars, file_index, files, outputs);
    lexer.lex()
}

/// A character together with its physical source location.
#[derive(Debug, PartialEq, Clone, Copy)]
struct CharWithLocation {
    character: char,
    location: Location,
}

/// Splices continued lines.
///
/// A backslash immediately before a line break removes both; a backslash
/// followed by whitespace and then a line break is reported as a
/// portability problem but still spliced. Spliced text continues on the
/// line (and at the column) where the logical line started; the line
/// number catches up at the next real line break, so tokens after the
/// logical line align with the source again. `\r\n` and a lone `\r` are
/// normalized to `\n` here so the lexer only ever sees `\n`.
fn splice_lines(text: &str, file_index: u32, outputs: &mut OutputList) -> Vec<CharWithLocation> {
    let mut output = vec![];

    let mut location = Location::new(file_index, 1, 0);
    // Line breaks swallowed by splicing on the current logical line.
    let mut spliced_breaks: u32 = 0;
    let mut chars = text.chars().peekable();

    while let Some(character) = chars.next() {
        let char_location = Location::new(file_index, location.line, location.col + 1);

        match character {
            '\\' => {
                // Look past any whitespace between the backslash and a
                // possible line break.
                let mut pending = vec![CharWithLocation {
                    character,
                    location: char_location,
                }];
                location.col += 1;

                let mut has_gap = false;
                while let Some(&next) = chars.peek() {
                    if next == ' ' || next == '\t' {
                        has_gap = true;
                        pending.push(CharWithLocation {
                            character: next,
                            location: Location::new(file_index, location.line, location.col + 1),
                        });
                        location.col += next.len_utf8() as u32;
                        chars.next();
                    } else {
                        break;
                    }
                }

                let splice = matches!(chars.peek(), Some('\n') | Some('\r'));
                if splice {
                    if has_gap {
                        outputs.push(Output::new(
                            OutputKind::PortabilityBackslash,
                            pending[0].location,
                            "Combination 'backslash space newline' is not portable.",
                        ));
                    }

                    // Consume the line break; the logical line continues
                    // at the column after the removed backslash.
                    if chars.next() == Some('\r') && chars.peek() == Some(&'\n') {
                        chars.next();
                    }
                    spliced_breaks += 1;
                } else {
                    output.extend(pending);
                }
            }
            '\r' | '\n' => {
                if character == '\r' && chars.peek() == Some(&'\n') {
                    chars.next();
                }
                output.push(CharWithLocation {
                    character: '\n',
                    location: char_location,
                });
                location.line += spliced_breaks + 1;
                location.col = 0;
                spliced_breaks = 0;
            }
            _ => {
                output.push(CharWithLocation {
                    character,
                    location: char_location,
                });
                location.col += character.len_utf8() as u32;
            }
        }
    }

    output
}

struct Lexer<'a> {
    chars: Vec<CharWithLocation>,
    pos: usize,

    files: &'a mut Vec<String>,
    outputs: &'a mut OutputList,

    // The virtual location mapping. `# file`/`# endfile`/`#line` sentinels
    // re-aim the file index and line numbers of subsequent tokens without
    // touching the physical positions the characters carry.
    virtual_file: u32,
    line_base: i64,
    file_stack: Vec<(u32, i64)>,

    output: TokenList,

    // Handles of the tokens emitted on the current physical line,
    // inspected for sentinels when the line closes.
    current_line: Vec<TokenId>,
}

impl<'a> Lexer<'a> {
    fn new(
        chars: Vec<CharWithLocation>,
        file_index: u32,
        files: &'a mut Vec<String>,
        outputs: &'a mut OutputList,
    ) -> Self {
        Self {
            chars,
            pos: 0,
            files,
            outputs,
            virtual_file: file_index,
            line_base: 0,
            file_stack: vec![],
            output: TokenList::new(),
            current_line: vec![],
        }
    }

    fn peek(&self, offset: usize) -> Option<char> {
        self.chars.get(self.pos + offset).map(|c| c.character)
    }

    fn peek_location(&self) -> Option<Location> {
        self.chars.get(self.pos).map(|c| c.location)
    }

    fn next_char(&mut self) -> Option<CharWithLocation> {
        let item = self.chars.get(self.pos).copied();
        if item.is_some() {
            self.pos += 1;
        }
        item
    }

    /// Translates a physical location through the current sentinel mapping.
    fn virtual_location(&self, physical: Location) -> Location {
        Location::new(
            self.virtual_file,
            (physical.line as i64 + self.line_base) as u32,
            physical.col,
        )
    }

    fn emit(&mut self, lexeme: String, physical: Location) {
        let location = self.virtual_location(physical);
        let id = self.output.push_back(Token::new(lexeme, location));
        self.current_line.push(id);
    }

    fn lex(&mut self) -> Result<TokenList, PreprocessError> {
        while let Some(current) = self.peek(0) {
            match current {
                ' ' | '\t' | '\u{0b}' | '\u{0c}' => {
                    self.next_char();
                }
                '\n' => {
                    let newline = self.next_char().unwrap();
                    self.close_line(newline.location.line)?;
                }
                '/' if self.peek(1) == Some('/') => {
                    self.lex_line_comment();
                }
                '/' if self.peek(1) == Some('*') => {
                    self.lex_block_comment()?;
                }
                '"' | '\'' => {
                    self.lex_literal(String::new())?;
                }
                'R' if self.peek(1) == Some('"') => {
                    self.lex_raw_string(String::new())?;
                }
                c if c.is_ascii_alphabetic() || c == '_' => {
                    self.lex_identifier()?;
                }
                c if c.is_ascii_digit() => {
                    self.lex_number();
                }
                '.' if self.peek(1).is_some_and(|c| c.is_ascii_digit()) => {
                    self.lex_number();
                }
                c if (c as u32) > 127 => {
                    // A high-bit byte outside of any literal.
                    let item = self.next_char().unwrap();
                    self.outputs.push(Output::new(
                        OutputKind::UnhandledCharError,
                        self.virtual_location(item.location),
                        format!("The code contains unhandled character {:?}.", c),
                    ));
                }
                _ => {
                    self.lex_operator();
                }
            }
        }

        // The input may end without a trailing newline.
        self.close_line(u32::MAX)?;

        Ok(std::mem::take(&mut self.output))
    }

    fn lex_line_comment(&mut self) {
        let start = self.next_char().unwrap(); // Consume '/'
        let mut lexeme = String::from("/");

        // The terminating newline is not part of the comment token.
        while let Some(c) = self.peek(0) {
            if c == '\n' {
                break;
            }
            lexeme.push(c);
            self.next_char();
        }

        self.emit(lexeme, start.location);
    }

    fn lex_block_comment(&mut self) -> Result<(), PreprocessError> {
        let start = self.next_char().unwrap(); // Consume '/'
        self.next_char(); // Consume '*'
        let mut lexeme = String::from("/*");

        loop {
            match self.next_char() {
                Some(item) if item.character == '*' && self.peek(0) == Some('/') => {
                    self.next_char(); // Consume '/'
                    lexeme.push_str("*/");
                    break;
                }
                Some(item) => {
                    lexeme.push(item.character);
                }
                None => {
                    return Err(PreprocessError::syntax(
                        self.virtual_location(start.location),
                        "Unterminated block comment.",
                    ));
                }
            }
        }

        self.emit(lexeme, start.location);
        Ok(())
    }

    fn lex_identifier(&mut self) -> Result<(), PreprocessError> {
        let start = self.peek_location().unwrap();
        let mut lexeme = String::new();

        while let Some(c) = self.peek(0) {
            if c.is_ascii_alphanumeric() || c == '_' {
                lexeme.push(c);
                self.next_char();
            } else {
                break;
            }
        }

        // A string or character literal directly adjacent to a known
        // encoding prefix merges into one token; `u8 "a"` stays two tokens.
        match self.peek(0) {
            Some('"') | Some('\'') if matches!(lexeme.as_str(), "L" | "u" | "U" | "u8") => {
                self.lex_literal_from(lexeme, start)?;
            }
            Some('"') if matches!(lexeme.as_str(), "LR" | "uR" | "UR" | "u8R") => {
                // The raw-string `R` is dropped during normalization;
                // the encoding prefix is kept.
                let prefix = lexeme[..lexeme.len() - 1].to_owned();
                self.lex_raw_string_from(prefix, start)?;
            }
            _ => {
                self.emit(lexeme, start);
            }
        }

        Ok(())
    }

    fn lex_number(&mut self) {
        let start = self.peek_location().unwrap();
        let mut lexeme = String::new();

        loop {
            let Some(c) = self.peek(0) else { break };

            if c.is_ascii_alphanumeric() || c == '.' || c == '_' {
                lexeme.push(c);
                self.next_char();
            } else if (c == '+' || c == '-')
                && matches!(lexeme.chars().last(), Some('e' | 'E' | 'p' | 'P'))
            {
                // A sign is part of the number only after an exponent
                // letter, e.g. `1E-7` and `0x1p+3`.
                lexeme.push(c);
                self.next_char();
            } else if c == '\''
                && lexeme.chars().last().is_some_and(|p| p.is_ascii_digit())
                && self.peek(1).is_some_and(|n| n.is_ascii_digit())
            {
                // A digit separator between two digits is dropped from
                // the lexeme.
                self.next_char();
            } else {
                break;
            }
        }

        self.emit(lexeme, start);
    }

    /// Lexes a string or character literal. `prefix` is the already-consumed
    /// encoding prefix (may be empty); the quotes become part of the lexeme.
    fn lex_literal(&mut self, prefix: String) -> Result<(), PreprocessError> {
        let start = self.peek_location().unwrap();
        self.lex_literal_from(prefix, start)
    }

    fn lex_literal_from(&mut self, prefix: String, start: Location) -> Result<(), PreprocessError> {
        let quote = self.next_char().unwrap().character;
        let mut lexeme = prefix;
        lexeme.push(quote);

        loop {
            match self.next_char() {
                Some(item) if item.character == '\\' => {
                    // An escape consumes the backslash and the next
                    // character verbatim.
                    lexeme.push('\\');
                    match self.next_char() {
                        Some(escaped) => lexeme.push(escaped.character),
                        None => {
                            return Err(PreprocessError::syntax(
                                self.virtual_location(start),
                                "No pair for character '\\'.",
                            ));
                        }
                    }
                }
                Some(item) if item.character == '\n' => {
                    return Err(PreprocessError::syntax(
                        self.virtual_location(start),
                        format!("Invalid newline in {} literal.", literal_kind(quote)),
                    ));
                }
                Some(item) if item.character == quote => {
                    lexeme.push(quote);
                    break;
                }
                Some(item) => {
                    lexeme.push(item.character);
                }
                None => {
                    return Err(PreprocessError::syntax(
                        self.virtual_location(start),
                        format!("Unterminated {} literal.", literal_kind(quote)),
                    ));
                }
            }
        }

        self.emit(lexeme, start);
        Ok(())
    }

    /// Lexes `R"delim(...)delim"` and normalizes the lexeme to a plain
    /// quoted string containing the raw body literally.
    fn lex_raw_string(&mut self, prefix: String) -> Result<(), PreprocessError> {
        let start = self.peek_location().unwrap();
        self.next_char(); // Consume 'R'
        self.lex_raw_string_from(prefix, start)
    }

    /// The cursor stands at the opening quote; any `R` has already been
    /// consumed.
    fn lex_raw_string_from(
        &mut self,
        prefix: String,
        start: Location,
    ) -> Result<(), PreprocessError> {
        self.next_char(); // Consume '"'

        // The delimiter is everything up to the opening parenthesis,
        // at most 16 characters.
        let mut delimiter = String::new();
        loop {
            match self.next_char() {
                Some(item) if item.character == '(' => break,
                Some(item) if delimiter.len() < 16 && item.character != '"' => {
                    delimiter.push(item.character);
                }
                _ => {
                    return Err(PreprocessError::syntax(
                        self.virtual_location(start),
                        "Invalid raw string delimiter.",
                    ));
                }
            }
        }

        let closing = format!("){}\"", delimiter);
        let mut body = String::new();
        loop {
            if self.starts_with(&closing) {
                for _ in 0..closing.chars().count() {
                    self.next_char();
                }
                break;
            }
            match self.next_char() {
                Some(item) => body.push(item.character),
                None => {
                    return Err(PreprocessError::syntax(
                        self.virtual_location(start),
                        "Unterminated raw string literal.",
                    ));
                }
            }
        }

        self.emit(format!("{}\"{}\"", prefix, body), start);
        Ok(())
    }

    fn starts_with(&self, pattern: &str) -> bool {
        pattern
            .chars()
            .enumerate()
            .all(|(offset, c)| self.peek(offset) == Some(c))
    }

    fn lex_operator(&mut self) {
        let start = self.peek_location().unwrap();
        let first = self.next_char().unwrap().character;

        // Adjacent one-byte operators combine into their canonical
        // multi-byte forms. The characters are adjacent by construction:
        // whitespace and line breaks end the scan above.
        let two = |lexer: &Self, c: char| lexer.peek(0) == Some(c);

        let lexeme = match first {
            '<' if two(self, '<') => {
                self.next_char();
                if two(self, '=') {
                    self.next_char();
                    "<<=".to_owned()
                } else {
                    "<<".to_owned()
                }
            }
            '<' if two(self, '=') => {
                self.next_char();
                "<=".to_owned()
            }
            '>' if two(self, '>') => {
                self.next_char();
                if two(self, '=') {
                    self.next_char();
                    ">>=".to_owned()
                } else {
                    ">>".to_owned()
                }
            }
            '>' if two(self, '=') => {
                self.next_char();
                ">=".to_owned()
            }
            '=' | '!' | '*' | '/' | '%' | '^' if two(self, '=') => {
                self.next_char();
                format!("{}=", first)
            }
            '&' | '|' | '+' | ':' | '#' if two(self, first) => {
                self.next_char();
                format!("{0}{0}", first)
            }
            '&' | '|' | '+' if two(self, '=') => {
                self.next_char();
                format!("{}=", first)
            }
            '-' if two(self, '-') => {
                self.next_char();
                "--".to_owned()
            }
            '-' if two(self, '=') => {
                self.next_char();
                "-=".to_owned()
            }
            '-' if two(self, '>') => {
                self.next_char();
                "->".to_owned()
            }
            '.' if two(self, '.') && self.peek(1) == Some('.') => {
                self.next_char();
                self.next_char();
                "...".to_owned()
            }
            _ => first.to_string(),
        };

        self.emit(lexeme, start);
    }

    /// Runs the sentinel inspection for the physical line that just closed.
    ///
    /// `# file "X"` pushes the current mapping and switches to file X at
    /// line 1; `# endfile` pops. Both are lexer-private and removed from
    /// the stream. `#line N ["F"]` re-aims subsequent locations but stays
    /// in the stream for the directive driver.
    fn close_line(&mut self, physical_line: u32) -> Result<(), PreprocessError> {
        let line = std::mem::take(&mut self.current_line);

        let lexeme = |lexer: &Self, id: TokenId| lexer.output.get(id).str().to_owned();

        if line.len() == 3
            && lexeme(self, line[0]) == "#"
            && lexeme(self, line[1]) == "file"
            && lexeme(self, line[2]).starts_with('"')
        {
            let quoted = lexeme(self, line[2]);
            let filename = quoted[1..quoted.len() - 1].to_owned();

            for id in line {
                self.output.delete(id);
            }

            self.file_stack.push((self.virtual_file, self.line_base));
            self.virtual_file = intern_file(self.files, &filename);
            // The next physical line maps to line 1 of the named file.
            self.line_base = -(physical_line as i64);
        } else if line.len() == 2
            && lexeme(self, line[0]) == "#"
            && lexeme(self, line[1]) == "endfile"
        {
            for id in line {
                self.output.delete(id);
            }

            if let Some((file, base)) = self.file_stack.pop() {
                self.virtual_file = file;
                self.line_base = base;
            }
        } else if (line.len() == 3 || line.len() == 4)
            && lexeme(self, line[0]) == "#"
            && lexeme(self, line[1]) == "line"
            && self.output.get(line[2]).number
        {
            let target: i64 = lexeme(self, line[2]).parse().map_err(|_| {
                PreprocessError::syntax(
                    self.output.get(line[2]).location,
                    "Invalid line number in #line directive.",
                )
            })?;

            if line.len() == 4 {
                let quoted = lexeme(self, line[3]);
                if !quoted.starts_with('"') {
                    return Err(PreprocessError::syntax(
                        self.output.get(line[3]).location,
                        "Invalid file name in #line directive.",
                    ));
                }
                let filename = quoted[1..quoted.len() - 1].to_owned();
                self.virtual_file = intern_file(self.files, &filename);
            }

            // The next physical line maps to the requested line number.
            self.line_base = target - (physical_line as i64) - 1;
        }

        Ok(())
    }
}

fn literal_kind(quote: char) -> &'static str {
    if quote == '"' { "string" } else { "char" }
}

/// Reduces a character-literal token to its integer value, following the
/// C rules: a multi-character constant combines its bytes big-endian; the
/// `u`, `U`, and `L` prefixes yield UTF-16, UTF-32, and wide code points;
/// `u8` is restricted to ASCII.
pub fn character_literal_value(lexeme: &str, location: Location) -> Result<i64, PreprocessError> {
    let (prefix, rest) = if let Some(rest) = lexeme.strip_prefix("u8") {
        ("u8", rest)
    } else if let Some(rest) = lexeme.strip_prefix('u') {
        ("u", rest)
    } else if let Some(rest) = lexeme.strip_prefix('U') {
        ("U", rest)
    } else if let Some(rest) = lexeme.strip_prefix('L') {
        ("L", rest)
    } else {
        ("", lexeme)
    };

    let malformed = || PreprocessError::syntax(location, format!("Invalid char constant {}.", lexeme));

    let content = rest
        .strip_prefix('\'')
        .and_then(|s| s.strip_suffix('\''))
        .ok_or_else(malformed)?;

    if content.is_empty() {
        return Err(PreprocessError::syntax(
            location,
            format!("Empty char constant {}.", lexeme),
        ));
    }

    // Each unit is either a literal character or one escape sequence.
    let mut units: Vec<u32> = vec![];
    let mut chars = content.chars().peekable();
    while let Some(c) = chars.next() {
        if c != '\\' {
            units.push(c as u32);
            continue;
        }

        let escaped = chars.next().ok_or_else(malformed)?;
        let value = match escaped {
            'a' => 0x07,
            'b' => 0x08,
            'f' => 0x0c,
            'n' => 0x0a,
            'r' => 0x0d,
            't' => 0x09,
            'v' => 0x0b,
            'e' | 'E' => 0x1b,
            '\\' => '\\' as u32,
            '\'' => '\'' as u32,
            '"' => '"' as u32,
            '?' => '?' as u32,
            'x' => {
                let mut value: u32 = 0;
                let mut digits = 0;
                while let Some(&d) = chars.peek() {
                    match d.to_digit(16) {
                        Some(v) => {
                            value = value.wrapping_mul(16).wrapping_add(v);
                            digits += 1;
                            chars.next();
                        }
                        None => break,
                    }
                }
                if digits == 0 {
                    return Err(malformed());
                }
                value
            }
            'u' | 'U' => {
                let count = if escaped == 'u' { 4 } else { 8 };
                let mut value: u32 = 0;
                for _ in 0..count {
                    let d = chars.next().and_then(|d| d.to_digit(16)).ok_or_else(malformed)?;
                    value = value.wrapping_mul(16).wrapping_add(d);
                }
                value
            }
            d @ '0'..='7' => {
                let mut value = d.to_digit(8).unwrap();
                let mut digits = 1;
                while digits < 3 {
                    match chars.peek().and_then(|d| d.to_digit(8)) {
                        Some(v) => {
                            value = value * 8 + v;
                            digits += 1;
                            chars.next();
                        }
                        None => break,
                    }
                }
                value
            }
            _ => return Err(malformed()),
        };
        units.push(value);
    }

    match prefix {
        "" => {
            // Multi-byte constants combine big-endian into an int. A unit
            // above 255 (from a universal character name) contributes its
            // full value.
            let mut value: i64 = 0;
            for unit in units {
                if unit > 0xff {
                    value = unit as i64;
                } else {
                    value = (value << 8) | unit as i64;
                }
            }
            Ok(value)
        }
        "u8" => {
            if units.len() != 1 || units[0] > 0x7f {
                Err(PreprocessError::syntax(
                    location,
                    format!("Invalid utf8 char constant {}.", lexeme),
                ))
            } else {
                Ok(units[0] as i64)
            }
        }
        "u" => {
            if units.len() != 1 || units[0] > 0xffff {
                Err(PreprocessError::syntax(
                    location,
                    format!("Invalid utf16 char constant {}.", lexeme),
                ))
            } else {
                Ok(units[0] as i64)
            }
        }
        // 'U' and 'L' both yield the full code point on this platform.
        _ => {
            if units.len() != 1 {
                Err(PreprocessError::syntax(
                    location,
                    format!("Invalid wide char constant {}.", lexeme),
                ))
            } else {
                Ok(units[0] as i64)
            }
        }
    }
}
