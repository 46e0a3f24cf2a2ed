//! Splits raw arguments into option and value tokens.

/// One token of the argument vector.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    /// `--name`, `--name=value` or `--name:value`.
    LongOption {
        name: String,
        value: Option<String>,
    },
    /// `-a`, a group such as `-abc`, or `-a=value` / `-a:value`.
    ///
    /// `-p8080` is a group too; the matcher decides whether the trailing
    /// characters are more options or the value of the first one.
    ShortOptions {
        names: Vec<char>,
        value: Option<String>,
    },
    /// A plain value, including negative numbers and a lone `-`.
    Value(String),
}

/// Tokens up to `--`, and everything after it verbatim.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokenized {
    pub tokens: Vec<Token>,
    pub remaining: Vec<String>,
}

/// Tokenizes `args`.
///
/// # Examples
///
/// ```
/// use command_bind::{Token, tokenize};
///
/// let args: Vec<String> = ["--port=80", "-vq", "-5", "--", "--raw"].iter().map(|s| s.to_string()).collect();
/// let tokenized = tokenize(&args);
/// assert_eq!(tokenized.tokens, vec![
///     Token::LongOption { name: "port".into(), value: Some("80".into()) },
///     Token::ShortOptions { names: vec!['v', 'q'], value: None },
///     Token::Value("-5".into()),
/// ]);
/// assert_eq!(tokenized.remaining, vec!["--raw".to_string()]);
/// ```
pub fn tokenize(args: &[String]) -> Tokenized {
    let mut result = Tokenized::default();
    let mut iter = args.iter();
    while let Some(arg) = iter.next() {
        if arg == "--" {
            result.remaining.extend(iter.cloned());
            break;
        }
        result.tokens.push(tokenize_one(arg));
    }
    result
}

fn tokenize_one(arg: &str) -> Token {
    if let Some(body) = arg.strip_prefix("--") {
        let (name, value) = split_value(body);
        return Token::LongOption {
            name: name.to_string(),
            value,
        };
    }

    match arg.strip_prefix('-') {
        Some(body) if !body.is_empty() && !looks_numeric(body) => {
            let mut chars = body.chars();
            let first = chars.next();
            let rest = chars.as_str();
            match (first, rest.strip_prefix(['=', ':'])) {
                (Some(name), Some(value)) => Token::ShortOptions {
                    names: vec![name],
                    value: Some(value.to_string()),
                },
                _ => Token::ShortOptions {
                    names: body.chars().collect(),
                    value: None,
                },
            }
        }
        _ => Token::Value(arg.to_string()),
    }
}

/// Splits `name=value` or `name:value` at the first separator.
fn split_value(body: &str) -> (&str, Option<String>) {
    match body.find(['=', ':']) {
        Some(index) => (&body[..index], Some(body[index + 1..].to_string())),
        None => (body, None),
    }
}

fn looks_numeric(body: &str) -> bool {
    body.starts_with(|c: char| c.is_ascii_digit() || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_long_option_separators() {
        let tokenized = tokenize(&args(&["--name:alice", "--url=http://x", "--flag"]));
        assert_eq!(
            tokenized.tokens,
            vec![
                Token::LongOption {
                    name: "name".into(),
                    value: Some("alice".into()),
                },
                Token::LongOption {
                    name: "url".into(),
                    value: Some("http://x".into()),
                },
                Token::LongOption {
                    name: "flag".into(),
                    value: None,
                },
            ]
        );
    }

    #[test]
    fn test_short_option_forms() {
        let tokenized = tokenize(&args(&["-a=1", "-p8080", "-"]));
        assert_eq!(
            tokenized.tokens,
            vec![
                Token::ShortOptions {
                    names: vec!['a'],
                    value: Some("1".into()),
                },
                Token::ShortOptions {
                    names: vec!['p', '8', '0', '8', '0'],
                    value: None,
                },
                Token::Value("-".into()),
            ]
        );
    }

    #[test]
    fn test_negative_numbers_are_values() {
        let tokenized = tokenize(&args(&["-1", "-0.5", "-.5"]));
        assert!(tokenized
            .tokens
            .iter()
            .all(|token| matches!(token, Token::Value(_))));
    }

    #[test]
    fn test_double_dash_stops_tokenizing() {
        let tokenized = tokenize(&args(&["run", "--", "-x", "--", "y"]));
        assert_eq!(tokenized.tokens, vec![Token::Value("run".into())]);
        assert_eq!(tokenized.remaining, args(&["-x", "--", "y"]));
    }

    #[test]
    fn test_empty_long_name_is_kept_for_the_matcher() {
        let tokenized = tokenize(&args(&["--=x"]));
        assert_eq!(
            tokenized.tokens,
            vec![Token::LongOption {
                name: String::new(),
                value: Some("x".into()),
            }]
        );
    }
}
