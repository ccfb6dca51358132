//! A small scanner over Solidity source yielding the bits the pipeline
//! needs: the deployable contract name and the typed constructor
//! parameter list. Works on the code mask from [`super::code_mask`], so
//! keywords inside comments or string literals are ignored.

use super::code_mask;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConstructorParam {
    /// Declared type text, e.g. `uint256`, `string[]`, `address payable`.
    pub type_text: String,
    pub name: Option<String>,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ParseError {
    #[error("unbalanced parentheses in constructor declaration")]
    UnbalancedConstructor,
    #[error("malformed constructor parameter `{0}`")]
    MalformedParameter(String),
}

/// Data-location keywords that are part of a parameter declaration but
/// not of its ABI type.
const LOCATION_KEYWORDS: [&str; 3] = ["memory", "calldata", "storage"];

#[derive(Debug)]
struct Token<'a> {
    text: &'a str,
}

fn is_ident_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_' || c == '$'
}

fn is_ident_start(c: char) -> bool {
    c.is_ascii_alphabetic() || c == '_' || c == '$'
}

fn code_tokens(source: &str) -> Vec<Token<'_>> {
    let mask = code_mask(source);
    let mut tokens = Vec::new();
    let mut chars = source.char_indices().peekable();

    while let Some((i, c)) = chars.next() {
        if !mask[i] || c.is_whitespace() {
            continue;
        }
        if is_ident_char(c) {
            let mut end = i + c.len_utf8();
            while let Some((j, next)) = chars.peek().copied() {
                if mask[j] && is_ident_char(next) {
                    end = j + next.len_utf8();
                    chars.next();
                } else {
                    break;
                }
            }
            tokens.push(Token {
                text: &source[i..end],
            });
        } else {
            tokens.push(Token {
                text: &source[i..i + c.len_utf8()],
            });
        }
    }

    tokens
}

/// First deployable (non-abstract) contract declared in the source.
pub fn contract_name(source: &str) -> Option<String> {
    let tokens = code_tokens(source);
    for (idx, token) in tokens.iter().enumerate() {
        if token.text != "contract" {
            continue;
        }
        if idx > 0 && tokens[idx - 1].text == "abstract" {
            continue;
        }
        if let Some(next) = tokens.get(idx + 1) {
            if next.text.chars().next().map(is_ident_start) == Some(true) {
                return Some(next.text.to_string());
            }
        }
    }
    None
}

/// Typed constructor parameter list, in declared order. A contract
/// without a constructor yields an empty list.
pub fn constructor_params(source: &str) -> Result<Vec<ConstructorParam>, ParseError> {
    let tokens = code_tokens(source);
    let Some(ctor) = tokens.iter().position(|t| t.text == "constructor") else {
        return Ok(vec![]);
    };

    let mut iter = tokens[ctor + 1..].iter();
    match iter.next() {
        Some(t) if t.text == "(" => {}
        _ => return Err(ParseError::UnbalancedConstructor),
    }

    let mut depth = 1usize;
    let mut groups: Vec<Vec<&str>> = vec![vec![]];
    for token in iter {
        match token.text {
            "(" | "[" => depth += 1,
            ")" | "]" => {
                depth -= 1;
                if depth == 0 {
                    break;
                }
            }
            "," if depth == 1 => {
                groups.push(vec![]);
                continue;
            }
            _ => {}
        }
        groups.last_mut().expect("groups is never empty").push(token.text);
    }
    if depth != 0 {
        return Err(ParseError::UnbalancedConstructor);
    }

    if groups.len() == 1 && groups[0].is_empty() {
        return Ok(vec![]);
    }

    groups.into_iter().map(parse_param).collect()
}

fn parse_param(tokens: Vec<&str>) -> Result<ConstructorParam, ParseError> {
    let filtered: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|t| !LOCATION_KEYWORDS.contains(t))
        .collect();

    if filtered.is_empty() {
        return Err(ParseError::MalformedParameter(tokens.join(" ")));
    }

    let has_name = filtered.len() >= 2
        && filtered
            .last()
            .and_then(|t| t.chars().next())
            .map(is_ident_start)
            == Some(true)
        && !matches!(filtered[filtered.len() - 2], "[");

    let (type_tokens, name) = if has_name {
        (
            &filtered[..filtered.len() - 1],
            Some(filtered[filtered.len() - 1].to_string()),
        )
    } else {
        (&filtered[..], None)
    };

    let type_text = join_type(type_tokens);
    if type_text.is_empty() {
        return Err(ParseError::MalformedParameter(tokens.join(" ")));
    }

    Ok(ConstructorParam { type_text, name })
}

// `uint256 [ 3 ]` -> `uint256[3]`, `address payable` stays spaced.
fn join_type(tokens: &[&str]) -> String {
    let mut out = String::new();
    for token in tokens {
        if *token == "[" || *token == "]" || out.ends_with('[') {
            out.push_str(token);
        } else {
            if !out.is_empty() {
                out.push(' ');
            }
            out.push_str(token);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const ERC20_SOURCE: &str = r#"
        // SPDX-License-Identifier: MIT
        pragma solidity ^0.8.25;

        /* The word contract appears in this comment. */
        abstract contract Context {}

        contract MyToken is Context {
            string private _name;

            // constructor docs mentioning constructor(uint256 fake)
            constructor(string memory name_, string memory symbol_) {
                _name = name_;
            }
        }
    "#;

    #[test]
    fn finds_first_deployable_contract() {
        assert_eq!(contract_name(ERC20_SOURCE), Some("MyToken".to_string()));
        assert_eq!(contract_name("library Math {}"), None);
    }

    #[test]
    fn parses_constructor_parameters() {
        let params = constructor_params(ERC20_SOURCE).unwrap();
        assert_eq!(
            params,
            vec![
                ConstructorParam {
                    type_text: "string".to_string(),
                    name: Some("name_".to_string()),
                },
                ConstructorParam {
                    type_text: "string".to_string(),
                    name: Some("symbol_".to_string()),
                },
            ]
        );
    }

    #[test]
    fn parses_arrays_and_locations() {
        let params =
            constructor_params("contract C { constructor(uint256[] memory values, address payable owner, bool) {} }")
                .unwrap();
        assert_eq!(params[0].type_text, "uint256[]");
        assert_eq!(params[0].name, Some("values".to_string()));
        assert_eq!(params[1].type_text, "address payable");
        assert_eq!(params[1].name, Some("owner".to_string()));
        assert_eq!(params[2].type_text, "bool");
        assert_eq!(params[2].name, None);
    }

    #[test]
    fn no_constructor_means_no_parameters() {
        assert_eq!(constructor_params("contract C {}").unwrap(), vec![]);
    }

    #[test]
    fn ignores_constructor_keyword_in_comments() {
        let source = "contract C { /* constructor(uint256 x) */ }";
        assert_eq!(constructor_params(source).unwrap(), vec![]);
    }

    #[test]
    fn rejects_unbalanced_declaration() {
        let source = "contract C { constructor(uint256 x {} }";
        assert_eq!(
            constructor_params(source),
            Err(ParseError::UnbalancedConstructor)
        );
    }
}
