//! Module `parse` turns interactive transaction strings into actions.
//!
//! The notation is the one used by the Bus Pirate terminal: `[` or `{`
//! starts a transaction, `]` or `}` ends it, a number writes a byte, `r`
//! reads one, and any token may carry a `:n` repeat suffix.
//!
//! ```rust
//! use pyrate::action::Action;
//!
//! let actions = pyrate::parse::parse("[0xA0 0x00 r:2]");
//! assert_eq!(actions[3], Action::Read { repeat: 2 });
//! ```

use crate::action::Action;
use alloc::string::String;
use alloc::vec::Vec;

/// `parse` converts `text` into a sequence of actions.
///
/// Parsing fails closed: if any token is malformed the result is empty, so
/// that a typo never executes half of a transaction.
pub fn parse(text: &str) -> Vec<Action> {
    match parse_actions(text) {
        Some(actions) => actions,
        None => {
            log::debug!("rejected bus sequence {:?}", text);
            Vec::new()
        }
    }
}

/// `parse_int` parses an unsigned integer, choosing the base from its
/// prefix: `0x` hexadecimal, `0b` binary, `0o` or a bare leading zero octal,
/// and decimal otherwise.
pub fn parse_int(text: &str) -> Option<u32> {
    let (digits, radix) = if let Some(rest) = strip_prefix_ci(text, "0x") {
        (rest, 16)
    } else if let Some(rest) = strip_prefix_ci(text, "0b") {
        (rest, 2)
    } else if let Some(rest) = strip_prefix_ci(text, "0o") {
        (rest, 8)
    } else if text.len() > 1 && text.starts_with('0') {
        (&text[1..], 8)
    } else {
        (text, 10)
    };
    if digits.is_empty() || !digits.chars().all(|c| c.is_digit(radix)) {
        return None;
    }
    u32::from_str_radix(digits, radix).ok()
}

fn strip_prefix_ci<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    if text.len() >= prefix.len() && text[..prefix.len()].eq_ignore_ascii_case(prefix) {
        Some(&text[prefix.len()..])
    } else {
        None
    }
}

fn parse_actions(text: &str) -> Option<Vec<Action>> {
    let mut actions = Vec::new();
    let mut pending = String::new();
    let mut digit_run = true;

    for c in text.chars() {
        let separator = c.is_whitespace() || c == ',';
        let repeat_mark = c == ':' || c == ';';
        let digit = is_digit_class(c);

        if !pending.is_empty()
            && (separator || symbol(c).is_some() || (!repeat_mark && digit != digit_run))
        {
            actions.push(resolve(&pending)?);
            pending.clear();
            digit_run = true;
        }

        if !separator {
            digit_run = digit || repeat_mark;
            pending.push(c);
        }
    }

    if !pending.is_empty() {
        actions.push(resolve(&pending)?);
    }
    Some(actions)
}

fn is_digit_class(c: char) -> bool {
    c.is_ascii_hexdigit() || c == 'x' || c == 'X'
}

enum Symbol {
    Marker(Action),
    Repeatable(fn(u16) -> Action),
}

fn symbol(c: char) -> Option<Symbol> {
    let symbol = match c {
        '{' | '[' => Symbol::Marker(Action::Start),
        '}' | ']' => Symbol::Marker(Action::Stop),
        '/' => Symbol::Marker(Action::ClockHigh),
        '\\' => Symbol::Marker(Action::ClockLow),
        '-' => Symbol::Marker(Action::DataHigh),
        '_' => Symbol::Marker(Action::DataLow),
        '.' => Symbol::Marker(Action::ReadPin),
        'r' => Symbol::Repeatable(|repeat| Action::Read { repeat }),
        '^' => Symbol::Repeatable(|repeat| Action::ClockTick { repeat }),
        '!' => Symbol::Repeatable(|repeat| Action::BitRead { repeat }),
        _ => return None,
    };
    Some(symbol)
}

fn resolve(token: &str) -> Option<Action> {
    // The `;` partial-width form is reserved and has no meaning yet.
    if token.contains(';') {
        return None;
    }

    let (body, repeat) = match token.find(':') {
        Some(i) => {
            let repeat = parse_int(&token[i + 1..])?;
            if repeat == 0 || repeat > u32::from(u16::MAX) {
                return None;
            }
            (&token[..i], repeat as u16)
        }
        None => (token, 1),
    };

    let mut chars = body.chars();
    let first = chars.next()?;
    if let Some(symbol) = symbol(first) {
        if chars.next().is_some() {
            return None;
        }
        return match symbol {
            Symbol::Marker(action) if repeat == 1 => Some(action),
            Symbol::Marker(_) => None,
            Symbol::Repeatable(build) => Some(build(repeat)),
        };
    }

    let value = parse_int(body)?;
    if value > 0xFF {
        return None;
    }
    Some(Action::Write {
        value: value as u8,
        repeat,
    })
}
