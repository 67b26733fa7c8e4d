/// A `:name` occurrence found by the textual scanner.
///
/// `start..end` is the byte span of the whole occurrence including the
/// colon, so a caller can splice replacements without touching surrounding
/// text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamOccurrence {
    pub name: String,
    pub start: usize,
    pub end: usize,
}

fn is_ident_start(byte: u8) -> bool {
    byte.is_ascii_alphabetic() || byte == b'_'
}

fn is_ident_part(byte: u8) -> bool {
    byte.is_ascii_alphanumeric() || byte == b'_' || byte == b'$'
}

/// Finds every named parameter in `sql`, in textual order.
///
/// The passes nest in a fixed order — block comments, line comments, string
/// literals, then parameter syntax — so `:name` inside any of the skipped
/// regions is never reported, and `::` casts never produce a parameter.
/// Works on raw statement text; used both for opaque commands and for the
/// positional-placeholder rewrite.
pub fn scan_named_parameters(sql: &str) -> Vec<ParamOccurrence> {
    let bytes = sql.as_bytes();
    let len = bytes.len();
    let mut occurrences = Vec::new();
    let mut i = 0;

    while i < len {
        let c = bytes[i];

        // 1. Block comments.
        if c == b'/' && bytes.get(i + 1) == Some(&b'*') {
            i += 2;
            while i + 1 < len && !(bytes[i] == b'*' && bytes[i + 1] == b'/') {
                i += 1;
            }
            i = (i + 2).min(len);
            continue;
        }

        // 2. Line comments.
        if c == b'-' && bytes.get(i + 1) == Some(&b'-') {
            while i < len && bytes[i] != b'\n' {
                i += 1;
            }
            continue;
        }

        // 3. String literals, with '' escapes.
        if c == b'\'' {
            i += 1;
            while i < len {
                if bytes[i] == b'\'' {
                    if bytes.get(i + 1) == Some(&b'\'') {
                        i += 2;
                        continue;
                    }
                    i += 1;
                    break;
                }
                i += 1;
            }
            continue;
        }

        // 4. Parameter syntax.
        if c == b':' {
            if bytes.get(i + 1) == Some(&b':') {
                i += 2;
                // Also skip the cast's type name so `x::interval` cannot
                // re-trigger on a following colon.
                while i < len && is_ident_part(bytes[i]) {
                    i += 1;
                }
                continue;
            }
            if bytes.get(i + 1).copied().is_some_and(is_ident_start) {
                let start = i;
                i += 1;
                let name_start = i;
                while i < len && is_ident_part(bytes[i]) {
                    i += 1;
                }
                occurrences.push(ParamOccurrence {
                    name: sql[name_start..i].to_string(),
                    start,
                    end: i,
                });
                continue;
            }
        }

        i += 1;
    }

    occurrences
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(sql: &str) -> Vec<String> {
        scan_named_parameters(sql)
            .into_iter()
            .map(|p| p.name)
            .collect()
    }

    #[test]
    fn finds_parameters_in_textual_order() {
        assert_eq!(
            names("select * from t where t.x > :p1 and t.y = :p2 or t.x < :p1"),
            vec!["p1", "p2", "p1"]
        );
    }

    #[test]
    fn skips_comments_strings_and_casts() {
        let sql = "select ':a' /* :b */ -- :c\n, x::long from t where y = :d";
        assert_eq!(names(sql), vec!["d"]);
    }

    #[test]
    fn reports_spans_including_the_colon() {
        let occurrences = scan_named_parameters("where x = :p");
        assert_eq!(occurrences.len(), 1);
        assert_eq!(&"where x = :p"[occurrences[0].start..occurrences[0].end], ":p");
    }
}
