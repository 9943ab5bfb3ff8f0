use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use toolwarden_core::error::GatewayError;

/// A program invocation ready to spawn; no shell is involved.
#[derive(Debug, Clone)]
pub struct RunnerCommand {
    pub program: String,
    pub args: Vec<String>,
    pub working_dir: PathBuf,
    pub env: HashMap<String, String>,
    pub timeout: Duration,
}

impl RunnerCommand {
    pub fn from_line(
        line: &str,
        working_dir: PathBuf,
        env: HashMap<String, String>,
        timeout: Duration,
    ) -> Result<Self, GatewayError> {
        let mut argv = split_argv(line)?.into_iter();
        let program = argv
            .next()
            .ok_or_else(|| GatewayError::InvalidRequest("Empty command".to_string()))?;
        Ok(Self {
            program,
            args: argv.collect(),
            working_dir,
            env,
            timeout,
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Quote {
    None,
    Single,
    Double,
}

/// POSIX-style word splitting: whitespace separates words, single quotes
/// are literal, double quotes allow `\"`, `\\`, `\$` and `` \` ``, and a
/// backslash outside quotes escapes the next character. Expansion and
/// operators are not interpreted.
pub fn split_argv(line: &str) -> Result<Vec<String>, GatewayError> {
    let mut words = Vec::new();
    let mut word = String::new();
    let mut in_word = false;
    let mut quote = Quote::None;
    let mut chars = line.chars();

    while let Some(c) = chars.next() {
        match quote {
            Quote::Single => {
                if c == '\'' {
                    quote = Quote::None;
                } else {
                    word.push(c);
                }
            }
            Quote::Double => match c {
                '"' => quote = Quote::None,
                '\\' => match chars.next() {
                    Some(next @ ('"' | '\\' | '$' | '`')) => word.push(next),
                    Some('\n') => {}
                    Some(next) => {
                        word.push('\\');
                        word.push(next);
                    }
                    None => return Err(unbalanced("trailing escape")),
                },
                _ => word.push(c),
            },
            Quote::None => match c {
                '\'' => {
                    quote = Quote::Single;
                    in_word = true;
                }
                '"' => {
                    quote = Quote::Double;
                    in_word = true;
                }
                '\\' => match chars.next() {
                    Some('\n') => {}
                    Some(next) => {
                        word.push(next);
                        in_word = true;
                    }
                    None => return Err(unbalanced("trailing escape")),
                },
                c if c.is_whitespace() => {
                    if in_word {
                        words.push(std::mem::take(&mut word));
                        in_word = false;
                    }
                }
                _ => {
                    word.push(c);
                    in_word = true;
                }
            },
        }
    }

    if quote != Quote::None {
        return Err(unbalanced("unterminated quote"));
    }
    if in_word {
        words.push(word);
    }
    Ok(words)
}

fn unbalanced(what: &str) -> GatewayError {
    GatewayError::InvalidRequest(format!("Invalid command syntax: {what}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn argv(line: &str) -> Vec<String> {
        split_argv(line).unwrap()
    }

    #[test]
    fn splits_on_whitespace() {
        assert_eq!(argv("  npm   run\tbuild "), vec!["npm", "run", "build"]);
        assert!(argv("   ").is_empty());
    }

    #[test]
    fn honours_quotes_and_escapes() {
        assert_eq!(argv(r#"echo "a b" 'c d'"#), vec!["echo", "a b", "c d"]);
        assert_eq!(argv(r#"echo "say \"hi\"" it\'s"#), vec!["echo", "say \"hi\"", "it's"]);
        assert_eq!(argv(r#"printf '%s\n' x"#), vec!["printf", "%s\\n", "x"]);
        assert_eq!(argv(r#"touch "" x"#), vec!["touch", "", "x"]);
        assert_eq!(argv(r#"openscad -o out.stl "my model.scad""#).len(), 4);
    }

    #[test]
    fn operators_are_plain_words() {
        assert_eq!(argv("ls && rm -rf x"), vec!["ls", "&&", "rm", "-rf", "x"]);
    }

    #[test]
    fn unbalanced_quotes_are_rejected() {
        for line in [r#"echo "abc"#, "echo 'abc", "echo abc\\"] {
            let err = split_argv(line).unwrap_err();
            assert_eq!(err.kind(), "InvalidRequest", "{line:?}");
        }
    }

    #[test]
    fn empty_line_has_no_program() {
        let err = RunnerCommand::from_line(
            "  ",
            PathBuf::from("/tmp"),
            HashMap::new(),
            Duration::from_secs(1),
        )
        .unwrap_err();
        assert_eq!(err.kind(), "InvalidRequest");
    }
}
