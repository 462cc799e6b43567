//! Deterministic classification of shell command lines.
//!
//! The classifier is deliberately conservative: a line is read-only only when
//! every pipeline segment is recognized as read-only. Tokenization is
//! pragmatic (quote-aware segment splitting plus shell-word splitting) rather
//! than a full shell grammar.

use std::sync::LazyLock;

use regex::Regex;

use crate::core::command_sets::{
    GIT_READ_SUBCOMMANDS, INTERPRETERS, MUTATING_COMMANDS, NPM_READ_SUBCOMMANDS,
    PIP_READ_SUBCOMMANDS, READ_ONLY_COMMANDS, contains,
};
use crate::core::types::CommandKind;

static REDIRECTION: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(concat!(
        r"(?:^|\s)(?:>>?|<<?|<<<)\s",
        r"|(?:^|\s)\d*>&?\d*(?:\s|$)",
        r"|(?:^|\s)&>",
        r"|(?:^|\s)\d*>>?[^\s>&]",
    ))
    .expect("valid redirection pattern")
});

static AWK_FILE_OUTPUT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#">>?\s*["'].*["']"#).expect("valid awk output pattern")
});

/// Operator-tunable inputs to classification.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandPolicy {
    /// Extra command names treated as read-only.
    pub read_patterns: Vec<String>,
    /// Extra command names treated as mutating.
    pub write_patterns: Vec<String>,
    /// Treat unknown commands and unparsable segments as mutating.
    pub extrasafe: bool,
}

#[derive(Debug, Clone)]
pub struct CommandClassifier {
    policy: CommandPolicy,
}

impl CommandClassifier {
    pub fn new(policy: CommandPolicy) -> Self {
        Self { policy }
    }

    /// Classify a whole command line.
    pub fn classify(&self, command: &str) -> CommandKind {
        let line = command.trim();
        if line.is_empty() {
            return CommandKind::ReadOnly;
        }
        if REDIRECTION.is_match(line) {
            return CommandKind::Mutating;
        }

        let split = split_segments(line);
        if split.substitution && self.policy.extrasafe {
            return CommandKind::Mutating;
        }

        for segment in &split.segments {
            if self.classify_segment(segment) == CommandKind::Mutating {
                return CommandKind::Mutating;
            }
        }
        CommandKind::ReadOnly
    }

    /// Classify `command`, treating segments whose words satisfy `exempt` as
    /// read-only. Redirections and substitutions make the line mutating
    /// whatever the policy says.
    pub fn classify_exempting(
        &self,
        command: &str,
        exempt: impl Fn(&[String]) -> bool,
    ) -> CommandKind {
        let line = command.trim();
        if REDIRECTION.is_match(line) {
            return CommandKind::Mutating;
        }
        let split = split_segments(line);
        if split.substitution {
            return CommandKind::Mutating;
        }
        for segment in &split.segments {
            let exempted = shlex::split(segment).is_some_and(|words| exempt(&words));
            if !exempted && self.classify_segment(segment) == CommandKind::Mutating {
                return CommandKind::Mutating;
            }
        }
        CommandKind::ReadOnly
    }

    /// True when `command` references `file_name` and could rewrite it, either
    /// because it classifies as mutating or because it runs an interpreter.
    ///
    /// References include the bare stem (`sessions-state`) and shell globs
    /// whose last path component matches the file name.
    pub fn touches_protected_file(&self, command: &str, file_name: &str) -> bool {
        if file_name.is_empty() || !mentions_file(command, file_name) {
            return false;
        }
        if self.classify(command) == CommandKind::Mutating {
            return true;
        }
        split_segments(command.trim())
            .segments
            .iter()
            .filter_map(|segment| shlex::split(segment))
            .filter_map(|words| words.first().map(|word| word.to_lowercase()))
            .any(|name| contains(INTERPRETERS, &name))
    }

    fn classify_segment(&self, segment: &str) -> CommandKind {
        match shlex::split(segment) {
            Some(words) => self.classify_words(&words),
            None => self.unknown(),
        }
    }

    fn classify_words(&self, words: &[String]) -> CommandKind {
        let Some(first) = words.first() else {
            return CommandKind::ReadOnly;
        };
        let name = first.to_lowercase();
        let args = &words[1..];

        match name.as_str() {
            "cd" => return CommandKind::ReadOnly,
            "pip" | "pip3" => return by_subcommand(args, PIP_READ_SUBCOMMANDS),
            "npm" | "yarn" => return by_subcommand(args, NPM_READ_SUBCOMMANDS),
            "python" | "python3" => {
                return match args.first().map(String::as_str) {
                    Some("-c" | "-m") => CommandKind::ReadOnly,
                    _ => CommandKind::Mutating,
                };
            }
            "git" => return classify_git(args),
            _ => {}
        }

        if self.is_mutating_name(&name) || self.writes_through_arguments(&name, args) {
            return CommandKind::Mutating;
        }
        if self.is_read_only_name(&name) {
            return CommandKind::ReadOnly;
        }
        self.unknown()
    }

    fn writes_through_arguments(&self, name: &str, args: &[String]) -> bool {
        match name {
            "sed" | "gsed" => args.iter().any(|arg| is_in_place_flag(arg)),
            "awk" | "gawk" | "mawk" => awk_writes_files(args),
            "find" => self.find_writes(args),
            "xargs" => self.xargs_writes(args),
            "env" => self.env_writes(args),
            _ => false,
        }
    }

    fn find_writes(&self, args: &[String]) -> bool {
        let mut iter = args.iter().enumerate();
        while let Some((idx, arg)) = iter.next() {
            match arg.as_str() {
                "-delete" | "-fprint" | "-fprint0" | "-fprintf" | "-fls" => return true,
                "-exec" | "-execdir" | "-ok" | "-okdir" => {
                    let rest = &args[idx + 1..];
                    let end = rest
                        .iter()
                        .position(|word| word == ";" || word == "+")
                        .unwrap_or(rest.len());
                    if self.classify_words(&rest[..end]) == CommandKind::Mutating {
                        return true;
                    }
                    for _ in 0..end {
                        iter.next();
                    }
                }
                _ => {}
            }
        }
        false
    }

    fn xargs_writes(&self, args: &[String]) -> bool {
        if args.iter().any(|arg| self.is_mutating_name(&arg.to_lowercase())) {
            return true;
        }
        let command = skip_xargs_options(args);
        !command.is_empty() && self.classify_words(command) == CommandKind::Mutating
    }

    fn env_writes(&self, args: &[String]) -> bool {
        let start = args
            .iter()
            .position(|arg| !arg.starts_with('-') && !arg.contains('='))
            .unwrap_or(args.len());
        let command = &args[start..];
        !command.is_empty() && self.classify_words(command) == CommandKind::Mutating
    }

    fn is_mutating_name(&self, name: &str) -> bool {
        contains(MUTATING_COMMANDS, name)
            || self
                .policy
                .write_patterns
                .iter()
                .any(|pattern| pattern.eq_ignore_ascii_case(name))
    }

    fn is_read_only_name(&self, name: &str) -> bool {
        self.policy
            .read_patterns
            .iter()
            .any(|pattern| pattern.eq_ignore_ascii_case(name))
            || contains(READ_ONLY_COMMANDS, name)
    }

    fn unknown(&self) -> CommandKind {
        if self.policy.extrasafe {
            CommandKind::Mutating
        } else {
            CommandKind::ReadOnly
        }
    }
}

fn by_subcommand(args: &[String], read_only: &[&str]) -> CommandKind {
    match args.first() {
        Some(sub) if contains(read_only, &sub.to_lowercase()) => CommandKind::ReadOnly,
        _ => CommandKind::Mutating,
    }
}

fn classify_git(args: &[String]) -> CommandKind {
    // Skip global options; `-C <dir>` and `-c <key=value>` carry a value.
    let mut idx = 0;
    while let Some(arg) = args.get(idx) {
        if !arg.starts_with('-') {
            break;
        }
        idx += if matches!(arg.as_str(), "-C" | "-c") { 2 } else { 1 };
    }
    let Some(sub) = args.get(idx) else {
        return CommandKind::ReadOnly;
    };
    let rest = args.get(idx + 1..).unwrap_or_default();

    let read_only = match sub.as_str() {
        "branch" => git_branch_lists(rest),
        "remote" => !rest.iter().any(|arg| {
            matches!(
                arg.as_str(),
                "add" | "remove" | "rm" | "rename" | "set-url" | "set-head" | "set-branches"
                    | "prune" | "update"
            )
        }),
        other => contains(GIT_READ_SUBCOMMANDS, other),
    };
    if read_only {
        CommandKind::ReadOnly
    } else {
        CommandKind::Mutating
    }
}

fn git_branch_lists(args: &[String]) -> bool {
    const MUTATING_FLAGS: &[&str] = &[
        "-d", "-D", "-m", "-M", "-c", "-C", "-f", "-u", "--delete", "--move", "--copy",
        "--force", "--set-upstream-to", "--unset-upstream", "--edit-description", "--track",
    ];
    const PATTERN_FLAGS: &[&str] = &[
        "-l", "--list", "--contains", "--no-contains", "--merged", "--no-merged",
        "--points-at",
    ];
    if args
        .iter()
        .any(|arg| contains(MUTATING_FLAGS, arg) || arg.starts_with("--set-upstream-to="))
    {
        return false;
    }
    let has_positional = args.iter().any(|arg| !arg.starts_with('-'));
    !has_positional || args.iter().any(|arg| contains(PATTERN_FLAGS, arg))
}

fn is_in_place_flag(arg: &str) -> bool {
    if arg == "--in-place" || arg.starts_with("--in-place=") {
        return true;
    }
    // Short clusters such as `-i`, `-i.bak` or `-ni`; stop at options taking a value.
    match arg.strip_prefix('-') {
        Some(flags) if !flags.starts_with('-') => flags
            .chars()
            .take_while(|ch| !matches!(ch, 'e' | 'f' | 'l'))
            .any(|ch| ch == 'i'),
        _ => false,
    }
}

fn awk_writes_files(args: &[String]) -> bool {
    let script = args.join(" ");
    AWK_FILE_OUTPUT.is_match(&script)
        || ["print >", "print >>", "printf >", "printf >>"]
            .iter()
            .any(|needle| script.contains(needle))
}

fn skip_xargs_options(args: &[String]) -> &[String] {
    const WITH_VALUE: &[&str] = &["-I", "-n", "-P", "-L", "-s", "-d", "-E", "-a"];
    let mut idx = 0;
    while let Some(arg) = args.get(idx) {
        if !arg.starts_with('-') {
            break;
        }
        idx += if contains(WITH_VALUE, arg) { 2 } else { 1 };
    }
    args.get(idx..).unwrap_or_default()
}

fn mentions_file(command: &str, file_name: &str) -> bool {
    if command.contains(file_name) {
        return true;
    }
    let stem = file_name.split('.').next().unwrap_or(file_name);
    if !stem.is_empty() && command.contains(stem) {
        return true;
    }
    let words = shlex::split(command)
        .unwrap_or_else(|| command.split_whitespace().map(str::to_string).collect());
    words
        .iter()
        .filter_map(|word| word.rsplit('/').next())
        .filter(|base| base.contains(['*', '?', '[']))
        .filter_map(glob_pattern)
        .any(|pattern| pattern.is_match(file_name))
}

/// Anchored regex for one shell glob component. Bracket expressions match
/// any single character.
fn glob_pattern(glob: &str) -> Option<Regex> {
    let mut pattern = String::from("^");
    let mut chars = glob.chars();
    while let Some(ch) = chars.next() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            '[' => {
                for inner in chars.by_ref() {
                    if inner == ']' {
                        break;
                    }
                }
                pattern.push('.');
            }
            other => pattern.push_str(&regex::escape(other.encode_utf8(&mut [0; 4]))),
        }
    }
    pattern.push('$');
    Regex::new(&pattern).ok()
}

struct Segments {
    segments: Vec<String>,
    /// Command or process substitution seen outside single quotes.
    substitution: bool,
}

/// Split a line on `|`, `||`, `&&`, `&`, `;` and newlines, ignoring operators
/// inside quotes or escaped with a backslash.
fn split_segments(line: &str) -> Segments {
    let mut segments = Vec::new();
    let mut current = String::new();
    let mut substitution = false;
    let mut quote: Option<char> = None;
    let mut prev: Option<char> = None;
    let mut chars = line.chars().peekable();

    while let Some(ch) = chars.next() {
        match quote {
            Some('\'') => {
                current.push(ch);
                if ch == '\'' {
                    quote = None;
                }
            }
            Some(open) => {
                current.push(ch);
                if ch == '\\' {
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                } else if ch == open {
                    quote = None;
                } else if ch == '`' || (ch == '$' && chars.peek() == Some(&'(')) {
                    substitution = true;
                }
            }
            None => match ch {
                '\'' | '"' => {
                    quote = Some(ch);
                    current.push(ch);
                }
                '\\' => {
                    current.push(ch);
                    if let Some(next) = chars.next() {
                        current.push(next);
                    }
                }
                '|' => {
                    if matches!(chars.peek(), Some('|' | '&')) {
                        chars.next();
                    }
                    flush(&mut segments, &mut current);
                }
                '&' if prev == Some('>') || chars.peek() == Some(&'>') => current.push(ch),
                '&' => {
                    if chars.peek() == Some(&'&') {
                        chars.next();
                    }
                    flush(&mut segments, &mut current);
                }
                ';' | '\n' => flush(&mut segments, &mut current),
                '`' => {
                    substitution = true;
                    current.push(ch);
                }
                '(' if matches!(prev, Some('$' | '<' | '>')) => {
                    substitution = true;
                    current.push(ch);
                }
                _ => current.push(ch),
            },
        }
        prev = Some(ch);
    }
    flush(&mut segments, &mut current);

    Segments {
        segments,
        substitution,
    }
}

fn flush(segments: &mut Vec<String>, current: &mut String) {
    let segment = current.trim();
    if !segment.is_empty() {
        segments.push(segment.to_string());
    }
    current.clear();
}

#[cfg(test)]
mod tests {
    use super::*;

    fn classifier() -> CommandClassifier {
        CommandClassifier::new(CommandPolicy {
            extrasafe: true,
            ..CommandPolicy::default()
        })
    }

    fn kind(command: &str) -> CommandKind {
        classifier().classify(command)
    }

    #[test]
    fn empty_line_is_read_only() {
        assert_eq!(kind(""), CommandKind::ReadOnly);
        assert_eq!(kind("   "), CommandKind::ReadOnly);
    }

    #[test]
    fn redirections_are_mutating_regardless_of_command() {
        for command in [
            "echo hi > out.txt",
            "cat a >> b",
            "grep x f 2>&1",
            "ls &> log",
            "cat <<< word",
            "wc -l < input",
            "echo hi >out.txt",
            "grep x f 2>/dev/null",
        ] {
            assert_eq!(kind(command), CommandKind::Mutating, "{command}");
        }
    }

    #[test]
    fn read_only_pipelines_stay_read_only() {
        for command in [
            "cat f",
            "grep x f",
            "cat f | grep x | sort",
            "ls -la && pwd",
            "cd src && rg foo",
            "sed -n '1,5p' file",
            "grep 'a|b' file",
        ] {
            assert_eq!(kind(command), CommandKind::ReadOnly, "{command}");
        }
    }

    #[test]
    fn one_mutating_segment_taints_the_line() {
        assert_eq!(kind("ls && rm -rf build"), CommandKind::Mutating);
        assert_eq!(kind("cat f || touch f"), CommandKind::Mutating);
        assert_eq!(kind("ls; rm x"), CommandKind::Mutating);
        assert_eq!(kind("cat f & rm x"), CommandKind::Mutating);
    }

    #[test]
    fn argument_idioms_are_mutating() {
        for command in [
            "sed -i 's/a/b/' f",
            "sed --in-place 's/a/b/' f",
            "sed -ni 's/a/b/p' f",
            "awk '{print > \"o\"}' f",
            "awk '{print >\"o\"}' f",
            "find . -delete",
            "find . -exec rm {} +",
            "find . -name '*.tmp' -exec sed -i 's/a/b/' {} ;",
            "ls | xargs rm",
            "ls | xargs sed -i 's/a/b/'",
            "env FOO=1 rm x",
        ] {
            assert_eq!(kind(command), CommandKind::Mutating, "{command}");
        }
    }

    #[test]
    fn read_only_exec_and_xargs_targets_are_allowed() {
        assert_eq!(kind("find . -name '*.rs' -exec cat {} ;"), CommandKind::ReadOnly);
        assert_eq!(kind("ls | xargs -n 1 wc -l"), CommandKind::ReadOnly);
    }

    #[test]
    fn subcommand_rules() {
        assert_eq!(kind("pip list"), CommandKind::ReadOnly);
        assert_eq!(kind("pip install requests"), CommandKind::Mutating);
        assert_eq!(kind("npm view react"), CommandKind::ReadOnly);
        assert_eq!(kind("yarn add react"), CommandKind::Mutating);
        assert_eq!(kind("python -c 'print(1)'"), CommandKind::ReadOnly);
        assert_eq!(kind("python3 script.py"), CommandKind::Mutating);
    }

    #[test]
    fn git_is_classified_by_subcommand() {
        for command in [
            "git status",
            "git log --oneline",
            "git -C sub diff",
            "git branch",
            "git branch -a",
            "git branch --list 'feat*'",
            "git remote -v",
        ] {
            assert_eq!(kind(command), CommandKind::ReadOnly, "{command}");
        }
        for command in [
            "git commit -m x",
            "git checkout main",
            "git fetch",
            "git branch new-feature",
            "git branch -D old",
            "git remote add origin url",
        ] {
            assert_eq!(kind(command), CommandKind::Mutating, "{command}");
        }
    }

    #[test]
    fn unknown_commands_follow_extrasafe() {
        assert_eq!(kind("frobnicate --all"), CommandKind::Mutating);
        let lenient = CommandClassifier::new(CommandPolicy::default());
        assert_eq!(lenient.classify("frobnicate --all"), CommandKind::ReadOnly);
    }

    #[test]
    fn unbalanced_quotes_follow_extrasafe() {
        assert_eq!(kind("cat 'unterminated"), CommandKind::Mutating);
        let lenient = CommandClassifier::new(CommandPolicy::default());
        assert_eq!(lenient.classify("cat 'unterminated"), CommandKind::ReadOnly);
    }

    #[test]
    fn command_substitution_is_mutating_when_extrasafe() {
        assert_eq!(kind("echo $(rm -rf x)"), CommandKind::Mutating);
        assert_eq!(kind("echo `touch x`"), CommandKind::Mutating);
        assert_eq!(kind("echo '$(literal)'"), CommandKind::ReadOnly);
    }

    #[test]
    fn configured_patterns_extend_sets() {
        let classifier = CommandClassifier::new(CommandPolicy {
            read_patterns: vec!["kubectl".to_string()],
            write_patterns: vec!["cat".to_string()],
            extrasafe: true,
        });
        assert_eq!(classifier.classify("kubectl get pods"), CommandKind::ReadOnly);
        assert_eq!(classifier.classify("cat f"), CommandKind::Mutating);
    }

    #[test]
    fn protected_file_detection() {
        let classifier = classifier();
        let file = "sessions-state.json";
        assert!(classifier.touches_protected_file("rm sessions/sessions-state.json", file));
        assert!(classifier.touches_protected_file(
            "python -c 'open(\"sessions/sessions-state.json\",\"w\")'",
            file
        ));
        assert!(!classifier.touches_protected_file("cat sessions/sessions-state.json", file));
        assert!(!classifier.touches_protected_file("rm other.json", file));
    }

    #[test]
    fn protected_file_globs_and_stem_are_detected() {
        let classifier = classifier();
        let file = "sessions-state.json";
        assert!(classifier.touches_protected_file("cp x sessions/*state.json", file));
        assert!(classifier.touches_protected_file("rm sessions/sessions-?tate.*", file));
        assert!(classifier.touches_protected_file("mv sessions/sessions-state.tmp y", file));
        assert!(!classifier.touches_protected_file("cat sessions/*.json", file));
        assert!(!classifier.touches_protected_file("rm sessions/*.md", file));
    }

    #[test]
    fn exempted_segments_do_not_hide_other_segments() {
        let classifier = classifier();
        let exempt = |words: &[String]| words.first().is_some_and(|word| word == "gate");
        assert_eq!(
            classifier.classify_exempting("gate state | grep mode", exempt),
            CommandKind::ReadOnly
        );
        for command in [
            "gate state && rm -rf src",
            "gate state > src/main.rs",
            "gate mode ; touch x",
            "gate mode $(touch x)",
        ] {
            assert_eq!(
                classifier.classify_exempting(command, exempt),
                CommandKind::Mutating,
                "{command}"
            );
        }
    }
}
