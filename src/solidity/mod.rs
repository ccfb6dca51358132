pub mod constructor_args;
pub mod signature;
pub mod standard_json;

/// Per-byte mask over the source, `true` where the byte belongs to plain
/// code (outside comments and string literals). Both the import scanner
/// and the signature parser work on top of it so that keywords inside
/// comments or strings are never picked up.
pub(crate) fn code_mask(source: &str) -> Vec<bool> {
    enum State {
        Code,
        LineComment,
        BlockComment,
        Str(char),
    }

    let mut mask = vec![false; source.len()];
    let mut state = State::Code;
    let mut chars = source.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        match state {
            State::Code => match c {
                '/' if matches!(chars.peek(), Some((_, '/'))) => {
                    chars.next();
                    state = State::LineComment;
                }
                '/' if matches!(chars.peek(), Some((_, '*'))) => {
                    chars.next();
                    state = State::BlockComment;
                }
                '"' | '\'' => state = State::Str(c),
                _ => mask[i..i + c.len_utf8()].iter_mut().for_each(|b| *b = true),
            },
            State::LineComment => {
                if c == '\n' {
                    state = State::Code;
                }
            }
            State::BlockComment => {
                if c == '*' && matches!(chars.peek(), Some((_, '/'))) {
                    chars.next();
                    state = State::Code;
                }
            }
            State::Str(quote) => match c {
                '\\' => {
                    chars.next();
                }
                c if c == quote => state = State::Code,
                _ => {}
            },
        }
    }

    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    fn code_of(source: &str) -> String {
        let mask = code_mask(source);
        source
            .char_indices()
            .filter(|(i, _)| mask[*i])
            .map(|(_, c)| c)
            .collect()
    }

    #[test]
    fn masks_comments_and_strings() {
        assert_eq!(code_of("a // b\nc"), "a c");
        assert_eq!(code_of("a /* b */ c"), "a  c");
        assert_eq!(code_of(r#"f("import \"x\";")"#), "f()");
        assert_eq!(code_of("x = 1 / 2;"), "x = 1 / 2;");
    }
}
