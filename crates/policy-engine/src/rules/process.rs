//! Command line screening.
//!
//! The line is cut into segments at shell control characters and the first
//! program of every segment is looked up in the denylist by basename. This is
//! a tokenizer, not a shell parser: quoting is ignored on purpose so that an
//! operator hidden inside quotes still starts a new segment. Over-blocking is
//! accepted; variable expansion and `eval` are not seen through.

use tracing::debug;

use crate::decision::CommandDecision;
use crate::denylist::Denylist;

const SEPARATORS: &[char] = &[';', '|', '&', '\n', '\r', '`', '(', ')'];

/// Grouping and negation words that may precede the program.
const PREFIX_WORDS: &[&str] = &["{", "}", "!", "!!", "then", "else", "do"];

/// Programs that run their argument as another program.
const WRAPPERS: &[&str] = &[
    "env", "exec", "nohup", "time", "command", "builtin", "nice", "timeout", "xargs", "stdbuf",
];

#[derive(Debug, Clone, Default)]
pub struct CommandAuthorizer {
    denylist: Denylist,
}

impl CommandAuthorizer {
    pub fn new(denylist: Denylist) -> Self {
        Self { denylist }
    }

    pub fn denylist(&self) -> &Denylist {
        &self.denylist
    }

    pub fn authorize(&self, command: &str) -> CommandDecision {
        let mut extracted_tokens = Vec::new();
        let mut matched_rule = None;

        'segments: for segment in split_segments(command) {
            for program in segment_programs(segment) {
                let rule = self
                    .denylist
                    .lookup(&program)
                    .or_else(|| self.denylist.lookup(&program.to_lowercase()))
                    .cloned();
                extracted_tokens.push(program);
                if rule.is_some() {
                    matched_rule = rule;
                    break 'segments;
                }
            }
        }

        debug!(
            tokens = extracted_tokens.len(),
            blocked = matched_rule.is_some(),
            "command evaluated"
        );

        CommandDecision {
            requested_command: command.to_string(),
            extracted_tokens,
            blocked: matched_rule.is_some(),
            matched_rule,
        }
    }
}

/// Non-empty segments between control characters. `&&`, `||` and `|&`
/// fall out of splitting on their single characters.
pub fn split_segments(command: &str) -> impl Iterator<Item = &str> {
    command
        .split(SEPARATORS)
        .map(str::trim)
        .filter(|segment| !segment.is_empty())
}

/// Basename of the program a segment runs, plus the program behind any
/// wrapper such as `env` or `nohup`.
fn segment_programs(segment: &str) -> Vec<String> {
    let mut programs = Vec::new();
    let mut after_wrapper = false;

    for word in segment.split_whitespace() {
        if PREFIX_WORDS.contains(&word) {
            continue;
        }
        if is_assignment(word) {
            continue;
        }
        if after_wrapper && (word.starts_with('-') || is_number(word)) {
            continue;
        }
        let Some(program) = candidate_program(word) else {
            continue;
        };
        let wraps = WRAPPERS.contains(&program.to_lowercase().as_str());
        programs.push(program);
        if !wraps {
            break;
        }
        after_wrapper = true;
    }

    programs
}

/// Strips quoting and grouping characters and any directory prefix.
pub fn candidate_program(word: &str) -> Option<String> {
    let trimmed = word.trim_matches(|c: char| matches!(c, '"' | '\'' | '{' | '}' | '\\' | '$'));
    let basename = trimmed.rsplit(['/', '\\']).next().unwrap_or(trimmed);
    let basename = basename.trim_matches(|c: char| matches!(c, '"' | '\''));
    if basename.is_empty() {
        None
    } else {
        Some(basename.to_string())
    }
}

fn is_number(word: &str) -> bool {
    word.chars().all(|c| c.is_ascii_digit() || c == '.')
}

fn is_assignment(word: &str) -> bool {
    match word.split_once('=') {
        Some((name, _)) => {
            !name.is_empty()
                && name
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_')
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use toolwarden_core::config::DenyRuleConfig;
    use toolwarden_core::types::DenyCategory;

    fn authorizer() -> CommandAuthorizer {
        CommandAuthorizer::default()
    }

    fn blocked_program(command: &str) -> Option<String> {
        authorizer()
            .authorize(command)
            .matched_rule
            .map(|rule| rule.program)
    }

    #[test]
    fn blocks_sudo_after_and() {
        let decision = authorizer().authorize("ls -la && sudo reboot");
        assert!(decision.blocked);
        assert_eq!(decision.extracted_tokens, vec!["ls", "sudo"]);
        let rule = decision.matched_rule.unwrap();
        assert_eq!(rule.program, "sudo");
        assert_eq!(rule.category, DenyCategory::PrivilegeEscalation);
    }

    #[test]
    fn allows_ordinary_build() {
        let decision = authorizer().authorize("npm run build");
        assert!(!decision.blocked);
        assert_eq!(decision.extracted_tokens, vec!["npm"]);
        assert!(decision.matched_rule.is_none());
    }

    #[test]
    fn every_operator_starts_a_segment() {
        for command in [
            "echo hi; sudo id",
            "cat file | sudo tee /etc/x",
            "false || sudo true",
            "sleep 1 & sudo id",
            "echo a\nsudo id",
            "echo a\r\nsudo id",
            "(sudo id)",
            "echo $(sudo id)",
            "echo `sudo id`",
            "{ sudo id; }",
            "! sudo id",
        ] {
            assert_eq!(blocked_program(command).as_deref(), Some("sudo"), "{command:?}");
        }
    }

    #[test]
    fn compares_by_basename_and_case() {
        assert_eq!(blocked_program("/usr/bin/sudo ls").as_deref(), Some("sudo"));
        assert_eq!(blocked_program("./bin/../chmod 777 x").as_deref(), Some("chmod"));
        assert_eq!(blocked_program("SUDO ls").as_deref(), Some("sudo"));
        assert_eq!(blocked_program("\"sudo\" ls").as_deref(), Some("sudo"));
        assert_eq!(blocked_program("'/sbin/reboot'").as_deref(), Some("reboot"));
    }

    #[test]
    fn sees_through_wrappers_and_assignments() {
        assert_eq!(blocked_program("env sudo id").as_deref(), Some("sudo"));
        assert_eq!(blocked_program("FOO=1 BAR=2 sudo id").as_deref(), Some("sudo"));
        assert_eq!(blocked_program("nohup systemctl stop x").as_deref(), Some("systemctl"));
        assert_eq!(blocked_program("timeout 5 mount /dev/sda1 /mnt").as_deref(), Some("mount"));
        assert_eq!(blocked_program("env -i PATH=/bin chown u f").as_deref(), Some("chown"));
    }

    #[test]
    fn arguments_are_not_programs() {
        for command in [
            "cat sudo.txt",
            "grep sudo /var/log/auth.log",
            "echo 'please do not run sudo'",
            "git commit -m reboot",
            "ls ./sudo",
        ] {
            let decision = authorizer().authorize(command);
            assert!(!decision.blocked, "{command:?}");
        }
    }

    #[test]
    fn empty_command_extracts_nothing() {
        for command in ["", "   ", ";;", "&& ||"] {
            let decision = authorizer().authorize(command);
            assert!(!decision.blocked);
            assert!(decision.extracted_tokens.is_empty(), "{command:?}");
        }
    }

    #[test]
    fn every_builtin_program_is_blocked() {
        let authorizer = authorizer();
        for (program, category) in crate::denylist::DEFAULT_DENYLIST {
            for command in [format!("{program} x"), format!("ls; /usr/bin/{program}")] {
                let decision = authorizer.authorize(&command);
                assert!(decision.blocked, "{command:?}");
                let rule = decision.matched_rule.unwrap();
                assert_eq!(rule.program, *program, "{command:?}");
                assert_eq!(rule.category, *category, "{command:?}");
            }
        }
    }

    #[test]
    fn first_match_wins() {
        let decision = authorizer().authorize("chmod +x a; sudo b");
        assert_eq!(decision.matched_rule.unwrap().program, "chmod");
        assert_eq!(decision.extracted_tokens, vec!["chmod"]);
    }

    #[test]
    fn configured_extras_are_enforced() {
        let authorizer = CommandAuthorizer::new(Denylist::with_extras(&[DenyRuleConfig {
            program: "nft".to_string(),
            category: DenyCategory::Firewall,
        }]));
        let decision = authorizer.authorize("ls && /usr/sbin/nft list ruleset");
        assert!(decision.blocked);
        assert_eq!(decision.matched_rule.unwrap().category, DenyCategory::Firewall);
    }

    #[test]
    fn candidate_program_strips_decoration() {
        assert_eq!(candidate_program("/usr/bin/sudo").as_deref(), Some("sudo"));
        assert_eq!(candidate_program("C:\\tools\\su").as_deref(), Some("su"));
        assert_eq!(candidate_program("'"), None);
        assert_eq!(candidate_program("/"), None);
    }
}
