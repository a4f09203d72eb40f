// Copyright (c) 2025 Hemashushu <hippospark@gmail.com>, All rights reserved.
//
// This Source Code Form is subject to the terms of
// the Mozilla Public License version 2.0 and additional exceptions.
// For more details, see the LICENSE, LICENSE.additional, and CONTRIBUTING files.

use crate::{
    error::PreprocessError,
    lexer::character_literal_value,
    location::Location,
    token_list::{TokenId, TokenList},
};

/// Evaluates an `#if` condition to a signed 64-bit integer.
///
/// The token list must already be macro-expanded and `defined`-substituted.
/// Identifiers that survived expansion evaluate to 0, arithmetic wraps in
/// two's complement, and division or modulus by zero yields 0.
///
/// The list is folded in place: the innermost parenthesis group is located
/// and reduced with one pass per precedence level, then the parentheses are
/// removed, until a single token remains.
pub fn evaluate(mut expr: TokenList) -> Result<i64, PreprocessError> {
    let location = match expr.front() {
        Some(id) => expr.get(id).location,
        None => {
            return Err(PreprocessError::syntax(
                Location::default(),
                "empty condition",
            ));
        }
    };

    replace_alternative_spellings(&mut expr);
    fold_sizeof(&mut expr)?;
    normalize_operands(&mut expr)?;

    loop {
        // The rightmost `(` opens an innermost group.
        let mut open = None;
        for id in expr.ids() {
            if expr.get(id).op == '(' {
                open = Some(id);
            }
        }

        match open {
            None => {
                fold_range(&mut expr, None, None)?;
                break;
            }
            Some(open_id) => {
                let mut close = None;
                let mut cursor = expr.next_of(open_id);
                while let Some(id) = cursor {
                    if expr.get(id).op == ')' {
                        close = Some(id);
                        break;
                    }
                    cursor = expr.next_of(id);
                }

                let close_id = close.ok_or_else(|| {
                    PreprocessError::syntax(expr.get(open_id).location, "missing ')'")
                })?;

                fold_range(&mut expr, Some(open_id), Some(close_id))?;

                // The group must have been reduced to one value.
                let inner = expr.next_of(open_id);
                if inner == Some(close_id)
                    || inner.is_none()
                    || expr.next_of(inner.unwrap()) != Some(close_id)
                {
                    return Err(PreprocessError::syntax(
                        expr.get(open_id).location,
                        "the expression is not constant",
                    ));
                }

                expr.delete(open_id);
                expr.delete(close_id);
            }
        }
    }

    match expr.front() {
        Some(id) if expr.len() == 1 && expr.get(id).number => parse_value(expr.get(id).str())
            .ok_or_else(|| {
                PreprocessError::syntax(expr.get(id).location, "the expression is not constant")
            }),
        _ => Err(PreprocessError::syntax(
            location,
            "the expression is not constant",
        )),
    }
}

/// `and`, `or`, `not`, `bitand`, `bitor`, `xor`, and `compl` are accepted
/// as synonyms for the corresponding operators.
fn replace_alternative_spellings(expr: &mut TokenList) {
    for id in expr.ids() {
        let replacement = match expr.get(id).str() {
            "and" => "&&",
            "or" => "||",
            "not" => "!",
            "bitand" => "&",
            "bitor" => "|",
            "xor" => "^",
            "compl" => "~",
            _ => continue,
        };
        expr.get_mut(id).set_str(replacement);
    }
}

/// Replaces `sizeof T` and `sizeof(T)` with the host size of the named
/// primitive type. This mirrors a compiler cross-checking against itself;
/// the target ABI is intentionally not consulted.
fn fold_sizeof(expr: &mut TokenList) -> Result<(), PreprocessError> {
    for id in expr.ids() {
        // A previous fold removed its argument tokens from the walk.
        if !expr.contains(id) || expr.get(id).str() != "sizeof" {
            continue;
        }

        let location = expr.get(id).location;
        let missing = || PreprocessError::syntax(location, "missing sizeof argument");

        let first = expr.next_of(id).ok_or_else(missing)?;

        // Collect the argument tokens: everything inside the parentheses,
        // or the single following token.
        let mut arguments = vec![];
        if expr.get(first).op == '(' {
            let mut cursor = expr.next_of(first);
            loop {
                match cursor {
                    Some(c) if expr.get(c).op == ')' => {
                        arguments.push(c);
                        break;
                    }
                    Some(c) => {
                        arguments.push(c);
                        cursor = expr.next_of(c);
                    }
                    None => return Err(missing()),
                }
            }
            arguments.insert(0, first);
        } else {
            arguments.push(first);
        }

        let mut size: usize = 0;
        for &argument in &arguments {
            size = match expr.get(argument).str() {
                "char" => size_of::<std::ffi::c_char>(),
                "short" => size_of::<std::ffi::c_short>(),
                "int" => size_of::<std::ffi::c_int>(),
                "long" => size_of::<std::ffi::c_long>(),
                "float" => size_of::<std::ffi::c_float>(),
                "double" => size_of::<std::ffi::c_double>(),
                _ => size,
            };
        }

        expr.get_mut(id).set_str(size.to_string());
        for argument in arguments {
            expr.delete(argument);
        }
    }

    Ok(())
}

/// Converts every operand to a canonical decimal token: character literals
/// through their integer value, numeric literals through radix parsing with
/// `u`/`l` suffixes stripped, and identifiers that survived macro expansion
/// to 0 (undefined identifiers are zero in `#if`).
fn normalize_operands(expr: &mut TokenList) -> Result<(), PreprocessError> {
    for id in expr.ids() {
        let token = expr.get(id);
        let lexeme = token.str().to_owned();
        let location = token.location;

        if is_char_literal(&lexeme) {
            let value = character_literal_value(&lexeme, location)?;
            expr.get_mut(id).set_str(value.to_string());
        } else if token.number {
            let value = parse_number(&lexeme).ok_or_else(|| {
                PreprocessError::syntax(location, format!("invalid number '{}'", lexeme))
            })?;
            expr.get_mut(id).set_str(value.to_string());
        } else if token.name {
            expr.get_mut(id).set_str("0");
        }
    }

    Ok(())
}

fn is_char_literal(lexeme: &str) -> bool {
    let rest = lexeme
        .strip_prefix("u8")
        .or_else(|| lexeme.strip_prefix('u'))
        .or_else(|| lexeme.strip_prefix('U'))
        .or_else(|| lexeme.strip_prefix('L'))
        .unwrap_or(lexeme);
    rest.starts_with('\'')
}

/// Parses a C integer literal: decimal, octal (`0...`), or hexadecimal
/// (`0x...`), with any combination of `u`/`l` suffixes. The value wraps
/// into the signed 64-bit range.
fn parse_number(lexeme: &str) -> Option<i64> {
    let trimmed = lexeme.trim_end_matches(['u', 'U', 'l', 'L']);

    let (digits, radix) = if let Some(hex) = trimmed.strip_prefix("0x").or_else(|| trimmed.strip_prefix("0X")) {
        (hex, 16)
    } else if trimmed.len() > 1 && trimmed.starts_with('0') {
        (&trimmed[1..], 8)
    } else {
        (trimmed, 10)
    };

    u64::from_str_radix(digits, radix).ok().map(|v| v as i64)
}

/// Parses a canonical (possibly negative) decimal token produced by an
/// earlier folding or normalization step.
fn parse_value(lexeme: &str) -> Option<i64> {
    lexeme.parse::<i64>().ok()
}

/// Applies all folding passes, in precedence order, to the tokens strictly
/// between `lo` and `hi` (`None` meaning the list boundary).
fn fold_range(
    expr: &mut TokenList,
    lo: Option<TokenId>,
    hi: Option<TokenId>,
) -> Result<(), PreprocessError> {
    while fold_unary(expr, lo, hi)? {}

    fold_binary(expr, lo, hi, &["*", "/", "%"])?;
    fold_binary(expr, lo, hi, &["+", "-"])?;
    fold_binary(expr, lo, hi, &["<", ">", "<=", ">=", "==", "!="])?;
    fold_binary(expr, lo, hi, &["&"])?;
    fold_binary(expr, lo, hi, &["^"])?;
    fold_binary(expr, lo, hi, &["|"])?;
    fold_binary(expr, lo, hi, &["&&"])?;
    fold_binary(expr, lo, hi, &["||"])?;
    fold_ternary(expr, lo, hi)?;

    Ok(())
}

fn first_in_range(expr: &TokenList, lo: Option<TokenId>) -> Option<TokenId> {
    match lo {
        Some(id) => expr.next_of(id),
        None => expr.front(),
    }
}

/// Folds unary `!`, `+`, `-`, and `~`. Returns true when something was
/// folded, so stacked operators like `- - 1` reduce over repeated passes.
fn fold_unary(
    expr: &mut TokenList,
    lo: Option<TokenId>,
    hi: Option<TokenId>,
) -> Result<bool, PreprocessError> {
    let mut changed = false;

    let mut cursor = first_in_range(expr, lo);
    while cursor != hi {
        let id = cursor.unwrap();
        let op = expr.get(id).op;

        if matches!(op, '!' | '+' | '-' | '~') {
            // Unary position: nothing before the operator, or another
            // operator (a preceding value would make it binary).
            let prev = expr.prev_of(id).filter(|&p| Some(p) != lo);
            let is_unary = match prev {
                Some(p) => !expr.get(p).number,
                None => true,
            };

            let next = expr.next_of(id).filter(|&n| Some(n) != hi);
            if is_unary
                && let Some(next_id) = next
                && expr.get(next_id).number
            {
                let value = parse_value(expr.get(next_id).str()).ok_or_else(|| {
                    PreprocessError::syntax(
                        expr.get(next_id).location,
                        "the expression is not constant",
                    )
                })?;

                let folded = match op {
                    '!' => (value == 0) as i64,
                    '-' => value.wrapping_neg(),
                    '~' => !value,
                    _ => value, // unary '+'
                };

                expr.get_mut(id).set_str(folded.to_string());
                cursor = expr.next_of(next_id);
                expr.delete(next_id);
                changed = true;
                continue;
            }
        }

        cursor = expr.next_of(id);
    }

    Ok(changed)
}

/// One left-to-right pass folding `value op value` for the given operator
/// group.
fn fold_binary(
    expr: &mut TokenList,
    lo: Option<TokenId>,
    hi: Option<TokenId>,
    operators: &[&str],
) -> Result<(), PreprocessError> {
    let mut cursor = first_in_range(expr, lo);
    while cursor != hi {
        let id = cursor.unwrap();

        if operators.contains(&expr.get(id).str()) {
            let prev = expr.prev_of(id).filter(|&p| Some(p) != lo);
            let next = expr.next_of(id).filter(|&n| Some(n) != hi);

            if let (Some(prev_id), Some(next_id)) = (prev, next)
                && expr.get(prev_id).number
                && expr.get(next_id).number
            {
                let error = |at: TokenId| {
                    PreprocessError::syntax(expr.get(at).location, "the expression is not constant")
                };
                let left = parse_value(expr.get(prev_id).str()).ok_or_else(|| error(prev_id))?;
                let right = parse_value(expr.get(next_id).str()).ok_or_else(|| error(next_id))?;

                let value = apply_binary(expr.get(id).str(), left, right);

                expr.get_mut(id).set_str(value.to_string());
                expr.delete(prev_id);
                cursor = expr.next_of(next_id);
                expr.delete(next_id);
                continue;
            }
        }

        cursor = expr.next_of(id);
    }

    Ok(())
}

fn apply_binary(operator: &str, left: i64, right: i64) -> i64 {
    match operator {
        "*" => left.wrapping_mul(right),
        // Division and modulus by zero yield 0, matching the tolerance of
        // a typical preprocessor.
        "/" => {
            if right == 0 {
                0
            } else {
                left.wrapping_div(right)
            }
        }
        "%" => {
            if right == 0 {
                0
            } else {
                left.wrapping_rem(right)
            }
        }
        "+" => left.wrapping_add(right),
        "-" => left.wrapping_sub(right),
        "<" => (left < right) as i64,
        ">" => (left > right) as i64,
        "<=" => (left <= right) as i64,
        ">=" => (left >= right) as i64,
        "==" => (left == right) as i64,
        "!=" => (left != right) as i64,
        "&" => left & right,
        "^" => left ^ right,
        "|" => left | right,
        "&&" => (left != 0 && right != 0) as i64,
        "||" => (left != 0 || right != 0) as i64,
        _ => unreachable!(),
    }
}

/// Folds `cond ? a : b`, scanning right to left so that nested conditionals
/// associate to the right.
fn fold_ternary(
    expr: &mut TokenList,
    lo: Option<TokenId>,
    hi: Option<TokenId>,
) -> Result<(), PreprocessError> {
    // Collect the range once; deletions only remove tokens that the scan
    // has already moved past.
    let mut range = vec![];
    let mut cursor = first_in_range(expr, lo);
    while cursor != hi {
        let id = cursor.unwrap();
        range.push(id);
        cursor = expr.next_of(id);
    }

    for &id in range.iter().rev() {
        // A fold below removes tokens the reverse scan has not reached yet.
        if !expr.contains(id) || expr.get(id).op != '?' {
            continue;
        }

        let prev = expr.prev_of(id).filter(|&p| Some(p) != lo);
        let then_id = expr.next_of(id).filter(|&n| Some(n) != hi);

        let (Some(cond_id), Some(then_id)) = (prev, then_id) else {
            continue;
        };
        let Some(colon_id) = expr.next_of(then_id).filter(|&c| Some(c) != hi) else {
            continue;
        };
        let Some(else_id) = expr.next_of(colon_id).filter(|&c| Some(c) != hi) else {
            continue;
        };

        if !expr.get(cond_id).number
            || !expr.get(then_id).number
            || expr.get(colon_id).op != ':'
            || !expr.get(else_id).number
        {
            continue;
        }

        let error = |at: TokenId| {
            PreprocessError::syntax(expr.get(at).location, "the expression is not constant")
        };
        let cond = parse_value(expr.get(cond_id).str()).ok_or_else(|| error(cond_id))?;
        let then_value = parse_value(expr.get(then_id).str()).ok_or_else(|| error(then_id))?;
        let else_value = parse_value(expr.get(else_id).str()).ok_or_else(|| error(else_id))?;

        let value = if cond != 0 { then_value } else { else_value };

        expr.get_mut(id).set_str(value.to_string());
        expr.delete(cond_id);
        expr.delete(then_id);
        expr.delete(colon_id);
        expr.delete(else_id);
    }

    Ok(())
}
