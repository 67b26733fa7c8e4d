use crate::error::ParseError;

/// A lexical token of the supported SQL dialect.
///
/// Keywords are not distinguished here; the parser matches [Token::Word]
/// values case-insensitively so that non-reserved words stay usable as
/// identifiers.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Token {
    /// Identifier or keyword. `quoted` marks a `"..."` identifier, which is
    /// never treated as a keyword.
    Word { value: String, quoted: bool },
    Number(String),
    /// String literal contents with `''` escapes already collapsed.
    String(String),
    /// Named parameter `:name`, without the colon.
    Param(String),
    Comma,
    Dot,
    LParen,
    RParen,
    Star,
    Plus,
    Minus,
    Slash,
    Percent,
    Eq,
    Neq,
    Lt,
    LtEq,
    Gt,
    GtEq,
    /// `::`, the cast operator.
    DoubleColon,
    /// `||`, string concatenation.
    Concat,
    Semicolon,
    Eof,
}

#[derive(Debug, Clone)]
pub(crate) struct SpannedToken {
    pub token: Token,
    pub start: usize,
}

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_ident_part(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$'
}

/// Tokenizes `sql`, skipping whitespace and both comment forms.
///
/// Named parameters are recognized here so that `:name` inside a string
/// literal or a comment can never produce a parameter, and `::` always lexes
/// as a cast.
pub(crate) fn tokenize(sql: &str) -> Result<Vec<SpannedToken>, ParseError> {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut tokens = Vec::with_capacity(len / 4 + 4);
    let mut i = 0;

    macro_rules! push {
        ($token:expr, $start:expr, $width:expr) => {{
            tokens.push(SpannedToken {
                token: $token,
                start: $start,
            });
            i = $start + $width;
            continue;
        }};
    }

    while i < len {
        let c = bytes[i];

        if c.is_ascii_whitespace() {
            i += 1;
            continue;
        }

        // -- line comment
        if c == b'-' && bytes.get(i + 1) == Some(&b'-') {
            i += 2;
            while i < len && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        // /* block comment */
        if c == b'/' && bytes.get(i + 1) == Some(&b'*') {
            let start = i;
            i += 2;
            loop {
                if i + 1 >= len {
                    return Err(ParseError::at_offset(sql, start, "unterminated block comment"));
                }
                if bytes[i] == b'*' && bytes[i + 1] == b'/' {
                    i += 2;
                    break;
                }
                i += 1;
            }
            continue;
        }

        // String literal with '' escapes.
        if c == b'\'' {
            let start = i;
            i += 1;
            let mut value = String::new();
            loop {
                if i >= len {
                    return Err(ParseError::at_offset(sql, start, "unterminated string literal"));
                }
                if bytes[i] == b'\'' {
                    if bytes.get(i + 1) == Some(&b'\'') {
                        value.push('\'');
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                // Copy the full UTF-8 sequence; only ASCII bytes are inspected.
                value.push(sql[i..].chars().next().ok_or_else(|| {
                    ParseError::at_offset(sql, i, "invalid UTF-8 in string literal")
                })?);
                i += sql[i..].chars().next().map_or(1, char::len_utf8);
            }
            tokens.push(SpannedToken {
                token: Token::String(value),
                start,
            });
            continue;
        }

        // Quoted identifier.
        if c == b'"' {
            let start = i;
            i += 1;
            let ident_start = i;
            while i < len && bytes[i] != b'"' {
                i += 1;
            }
            if i >= len {
                return Err(ParseError::at_offset(sql, start, "unterminated quoted identifier"));
            }
            tokens.push(SpannedToken {
                token: Token::Word {
                    value: sql[ident_start..i].to_string(),
                    quoted: true,
                },
                start,
            });
            i += 1;
            continue;
        }

        // Named parameter or cast.
        if c == b':' {
            if bytes.get(i + 1) == Some(&b':') {
                push!(Token::DoubleColon, i, 2);
            }
            if bytes.get(i + 1).copied().is_some_and(is_ident_start) {
                let start = i;
                i += 1;
                let name_start = i;
                while i < len && is_ident_part(bytes[i]) {
                    i += 1;
                }
                tokens.push(SpannedToken {
                    token: Token::Param(sql[name_start..i].to_string()),
                    start,
                });
                continue;
            }
            return Err(ParseError::at_offset(sql, i, "expected parameter name after ':'"));
        }

        if c == b'|' && bytes.get(i + 1) == Some(&b'|') {
            push!(Token::Concat, i, 2);
        }

        // Entity reference: `#` followed by a relative path. Consumed as one
        // word so `#../shared/lookup` survives as a single table name.
        if c == b'#' {
            let start = i;
            i += 1;
            while i < len
                && (is_ident_part(bytes[i]) || matches!(bytes[i], b'.' | b'/' | b'-'))
            {
                i += 1;
            }
            tokens.push(SpannedToken {
                token: Token::Word {
                    value: sql[start..i].to_string(),
                    quoted: false,
                },
                start,
            });
            continue;
        }

        match c {
            b'<' if bytes.get(i + 1) == Some(&b'=') => push!(Token::LtEq, i, 2),
            b'<' if bytes.get(i + 1) == Some(&b'>') => push!(Token::Neq, i, 2),
            b'>' if bytes.get(i + 1) == Some(&b'=') => push!(Token::GtEq, i, 2),
            b'!' if bytes.get(i + 1) == Some(&b'=') => push!(Token::Neq, i, 2),
            b'<' => push!(Token::Lt, i, 1),
            b'>' => push!(Token::Gt, i, 1),
            b'=' => push!(Token::Eq, i, 1),
            b',' => push!(Token::Comma, i, 1),
            b'.' => push!(Token::Dot, i, 1),
            b'(' => push!(Token::LParen, i, 1),
            b')' => push!(Token::RParen, i, 1),
            b'*' => push!(Token::Star, i, 1),
            b'+' => push!(Token::Plus, i, 1),
            b'-' => push!(Token::Minus, i, 1),
            b'/' => push!(Token::Slash, i, 1),
            b'%' => push!(Token::Percent, i, 1),
            b';' => push!(Token::Semicolon, i, 1),
            _ => {}
        }

        if c.is_ascii_digit() {
            let start = i;
            while i < len && (bytes[i].is_ascii_digit() || bytes[i] == b'.') {
                i += 1;
            }
            // Exponent suffix.
            if i < len && (bytes[i] == b'e' || bytes[i] == b'E') {
                let mut j = i + 1;
                if j < len && (bytes[j] == b'+' || bytes[j] == b'-') {
                    j += 1;
                }
                if j < len && bytes[j].is_ascii_digit() {
                    i = j;
                    while i < len && bytes[i].is_ascii_digit() {
                        i += 1;
                    }
                }
            }
            tokens.push(SpannedToken {
                token: Token::Number(sql[start..i].to_string()),
                start,
            });
            continue;
        }

        if is_ident_start(c) {
            let start = i;
            i += 1;
            while i < len && is_ident_part(bytes[i]) {
                i += 1;
            }
            tokens.push(SpannedToken {
                token: Token::Word {
                    value: sql[start..i].to_string(),
                    quoted: false,
                },
                start,
            });
            continue;
        }

        return Err(ParseError::at_offset(
            sql,
            i,
            format!("unexpected character '{}'", &sql[i..].chars().next().unwrap_or('?')),
        ));
    }

    tokens.push(SpannedToken {
        token: Token::Eof,
        start: len,
    });
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kinds(sql: &str) -> Vec<Token> {
        tokenize(sql).unwrap().into_iter().map(|t| t.token).collect()
    }

    #[test]
    fn comments_and_whitespace_are_skipped() {
        let tokens = kinds("select -- trailing :not_a_param\n /* block :also_not */ a");
        assert_eq!(
            tokens,
            vec![
                Token::Word { value: "select".into(), quoted: false },
                Token::Word { value: "a".into(), quoted: false },
                Token::Eof,
            ]
        );
    }

    #[test]
    fn params_are_not_found_in_strings_or_casts() {
        let tokens = kinds("':inside' x::long :real");
        assert_eq!(
            tokens,
            vec![
                Token::String(":inside".into()),
                Token::Word { value: "x".into(), quoted: false },
                Token::DoubleColon,
                Token::Word { value: "long".into(), quoted: false },
                Token::Param("real".into()),
                Token::Eof,
            ]
        );
    }

    #[test]
    fn string_escapes_collapse() {
        assert_eq!(kinds("'it''s'")[0], Token::String("it's".into()));
    }

    #[test]
    fn entity_references_lex_as_single_words() {
        assert_eq!(
            kinds("#orders/summary")[0],
            Token::Word { value: "#orders/summary".into(), quoted: false }
        );
        assert_eq!(
            kinds("#../shared/lookup x")[0],
            Token::Word { value: "#../shared/lookup".into(), quoted: false }
        );
    }

    #[test]
    fn unterminated_string_is_an_error() {
        let error = tokenize("select 'oops").unwrap_err();
        assert!(error.message.contains("unterminated"));
    }
}
