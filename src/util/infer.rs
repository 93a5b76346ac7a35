//! Lexical type inference for text tokens.

use super::Type;

/// Lexical class of a token.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Lexeme {
    Integer,
    Float,
    Other,
}

/// Single pass over `sign? digits* ('.' digits*)? ([eE] sign? digits+)?`,
/// requiring at least one mantissa digit.
fn classify(text: &str) -> Lexeme {
    let bytes = text.as_bytes();
    let mut i = 0;
    let n = bytes.len();

    if i < n && (bytes[i] == b'+' || bytes[i] == b'-') {
        i += 1;
    }

    let mut digits = 0;
    while i < n && bytes[i].is_ascii_digit() {
        i += 1;
        digits += 1;
    }

    let mut is_float = false;
    if i < n && bytes[i] == b'.' {
        is_float = true;
        i += 1;
        while i < n && bytes[i].is_ascii_digit() {
            i += 1;
            digits += 1;
        }
    }

    if digits == 0 {
        return Lexeme::Other;
    }

    if i < n && (bytes[i] == b'e' || bytes[i] == b'E') {
        is_float = true;
        i += 1;
        if i < n && (bytes[i] == b'+' || bytes[i] == b'-') {
            i += 1;
        }
        let start = i;
        while i < n && bytes[i].is_ascii_digit() {
            i += 1;
        }
        if i == start {
            return Lexeme::Other;
        }
    }

    match (i == n, is_float) {
        (false, _) => Lexeme::Other,
        (true, true) => Lexeme::Float,
        (true, false) => Lexeme::Integer,
    }
}

/// Rank used by [`Type::widen`]; unrelated kinds rank as string.
fn rank(ty: Type) -> u8 {
    if ty == Type::INT32 {
        0
    } else if ty == Type::INT64 {
        1
    } else if ty == Type::DOUBLE {
        2
    } else {
        3
    }
}

impl Type {
    /// Infer the natural type of a text token.
    ///
    /// Integers map to `int32` (or `int64` when out of 32-bit range), other
    /// numbers to `double`, and everything else, including tokens with
    /// embedded whitespace, to `string`.
    pub fn infer_from_str(text: &str) -> Type {
        match classify(text) {
            Lexeme::Integer => match text.parse::<i64>() {
                Ok(v) if i32::try_from(v).is_ok() => Type::INT32,
                Ok(_) => Type::INT64,
                // Too large even for i64, keep it numeric.
                Err(_) => Type::DOUBLE,
            },
            Lexeme::Float => Type::DOUBLE,
            Lexeme::Other => Type::STRING,
        }
    }

    /// Common type of two inferred types: int32 < int64 < double < string.
    /// Null is the identity.
    pub fn widen(a: Type, b: Type) -> Type {
        if a.is_null() {
            return b;
        }
        if b.is_null() {
            return a;
        }
        match rank(a).max(rank(b)) {
            0 => Type::INT32,
            1 => Type::INT64,
            2 => Type::DOUBLE,
            _ => Type::STRING,
        }
    }
}
