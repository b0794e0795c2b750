//! Row-reference rewriting for formulas after a row insertion.
//!
//! The rewrite is lexical: string literals, structured/external `[...]` segments and
//! sheet-qualified references (`Other!A1`, `'Other sheet'!A1:B2`) are copied through.
//! Every unqualified A1 cell reference and whole-row range (`5:7`) whose row is at or
//! below the insertion point moves down by the inserted count. Range ends shift
//! independently, so a range straddling the insertion point grows. A reference pushed
//! past the last sheet row becomes `#REF!`.

use crate::cell::{EXCEL_MAX_COLS, EXCEL_MAX_ROWS};

const REF_ERROR: &str = "#REF!";

fn shift_row(row: u32, at: u32, count: u32) -> Option<u32> {
    if row < at {
        return Some(row);
    }
    row.checked_add(count).filter(|r| *r <= EXCEL_MAX_ROWS)
}

fn is_ident(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'_' || b == b'.' || b == b'\\'
}

/// Index just past a quoted segment starting at `start` (`""` / `''` escape the quote).
fn skip_quoted(bytes: &[u8], start: usize, quote: u8) -> usize {
    let mut i = start + 1;
    while i < bytes.len() {
        if bytes[i] == quote {
            if bytes.get(i + 1) == Some(&quote) {
                i += 2;
                continue;
            }
            return i + 1;
        }
        i += 1;
    }
    bytes.len()
}

fn skip_bracketed(bytes: &[u8], start: usize) -> usize {
    let mut depth = 0usize;
    for (offset, b) in bytes[start..].iter().enumerate() {
        match b {
            b'[' => depth += 1,
            b']' => {
                depth -= 1;
                if depth == 0 {
                    return start + offset + 1;
                }
            }
            _ => {}
        }
    }
    bytes.len()
}

/// The reference following a sheet qualifier's `!`.
fn skip_qualified(bytes: &[u8], start: usize) -> usize {
    let len = bytes[start..]
        .iter()
        .take_while(|b| b.is_ascii_alphanumeric() || **b == b'$' || **b == b':')
        .count();
    start + len
}

fn digits(bytes: &[u8], start: usize) -> usize {
    bytes[start..].iter().take_while(|b| b.is_ascii_digit()).count()
}

fn dollar(bytes: &[u8], i: usize) -> usize {
    usize::from(bytes.get(i) == Some(&b'$'))
}

/// `$?[A-Z]{1,3}$?[0-9]+` at `start`, as `(end, row digits start, row)`.
fn cell_ref(bytes: &[u8], start: usize) -> Option<(usize, usize, u32)> {
    let mut i = start + dollar(bytes, start);
    let letters = bytes[i..].iter().take_while(|b| b.is_ascii_alphabetic()).count();
    if !(1..=3).contains(&letters) {
        return None;
    }
    let col = bytes[i..i + letters]
        .iter()
        .fold(0u32, |acc, b| acc * 26 + u32::from(b.to_ascii_uppercase() - b'A' + 1));
    if col > EXCEL_MAX_COLS {
        return None;
    }
    i += letters;
    i += dollar(bytes, i);
    let row_start = i;
    let n = digits(bytes, i);
    if n == 0 {
        return None;
    }
    let row: u32 = std::str::from_utf8(&bytes[i..i + n]).ok()?.parse().ok()?;
    if row == 0 {
        return None;
    }
    Some((i + n, row_start, row))
}

/// `$?[0-9]+:$?[0-9]+` at `start`, as `(end, [(digits start, digits end, row); 2])`.
fn row_range(bytes: &[u8], start: usize) -> Option<(usize, [(usize, usize, u32); 2])> {
    let mut parts = [(0, 0, 0); 2];
    let mut i = start;
    for (n, part) in parts.iter_mut().enumerate() {
        if n == 1 {
            if bytes.get(i) != Some(&b':') {
                return None;
            }
            i += 1;
        }
        i += dollar(bytes, i);
        let len = digits(bytes, i);
        if len == 0 {
            return None;
        }
        let row: u32 = std::str::from_utf8(&bytes[i..i + len]).ok()?.parse().ok()?;
        if row == 0 {
            return None;
        }
        *part = (i, i + len, row);
        i += len;
    }
    Some((i, parts))
}

fn ends_reference(bytes: &[u8], end: usize) -> bool {
    match bytes.get(end) {
        None => true,
        Some(b) => !is_ident(*b) && *b != b'(' && *b != b'!',
    }
}

/// Rewrite `formula` for `count` rows inserted so the first new row is `at`.
///
/// Works on formula bodies and on `ref` ranges such as `B12:B13`. Returns the input
/// unchanged when nothing moves.
pub fn shift_formula_rows(formula: &str, at: u32, count: u32) -> String {
    if count == 0 {
        return formula.to_string();
    }
    let bytes = formula.as_bytes();
    let mut out = String::with_capacity(formula.len() + 4);
    let mut copied = 0;
    let mut i = 0;

    while i < bytes.len() {
        match bytes[i] {
            b'"' => {
                i = skip_quoted(bytes, i, b'"');
                continue;
            }
            b'\'' => {
                i = skip_quoted(bytes, i, b'\'');
                if bytes.get(i) == Some(&b'!') {
                    i = skip_qualified(bytes, i + 1);
                }
                continue;
            }
            b'[' => {
                i = skip_bracketed(bytes, i);
                continue;
            }
            b'!' => {
                i = skip_qualified(bytes, i + 1);
                continue;
            }
            _ => {}
        }
        if i > 0 && is_ident(bytes[i - 1]) {
            i += 1;
            continue;
        }

        if let Some((end, row_start, row)) = cell_ref(bytes, i).filter(|(end, ..)| ends_reference(bytes, *end)) {
            out.push_str(&formula[copied..i]);
            match shift_row(row, at, count) {
                Some(new_row) => {
                    out.push_str(&formula[i..row_start]);
                    out.push_str(&new_row.to_string());
                }
                None => out.push_str(REF_ERROR),
            }
            copied = end;
            i = end;
            continue;
        }

        if let Some((end, parts)) = row_range(bytes, i).filter(|(end, _)| ends_reference(bytes, *end)) {
            out.push_str(&formula[copied..i]);
            let shifted: Option<Vec<u32>> = parts.iter().map(|(.., row)| shift_row(*row, at, count)).collect();
            match shifted {
                Some(rows) => {
                    let mut cursor = i;
                    for ((digits_start, digits_end, _), new_row) in parts.iter().zip(rows) {
                        out.push_str(&formula[cursor..*digits_start]);
                        out.push_str(&new_row.to_string());
                        cursor = *digits_end;
                    }
                }
                None => out.push_str(REF_ERROR),
            }
            copied = end;
            i = end;
            continue;
        }

        i += 1;
    }

    out.push_str(&formula[copied..]);
    out
}
