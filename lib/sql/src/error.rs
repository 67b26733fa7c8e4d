/// The statement text does not conform to the supported grammar.
///
/// Positions are 1-based and computed from the byte offset where the lexer
/// or parser gave up.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message} at line {line}, column {column}")]
pub struct ParseError {
    pub message: String,
    pub line: usize,
    pub column: usize,
}

impl ParseError {
    pub(crate) fn at_offset(text: &str, offset: usize, message: impl Into<String>) -> Self {
        let mut line = 1;
        let mut column = 1;
        for byte in text.as_bytes().iter().take(offset) {
            if *byte == b'\n' {
                line += 1;
                column = 1;
            } else {
                column += 1;
            }
        }
        ParseError {
            message: message.into(),
            line,
            column,
        }
    }
}
