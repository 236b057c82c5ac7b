//! Command admission control for termbridge.
//!
//! Every command goes through a [`CommandFilter`] before it reaches any
//! execution backend. The filter is loaded once from two optional
//! line-oriented pattern files and is immutable afterwards, so a decision
//! depends only on the command text and the loaded policy.

use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{error, info, warn};

/// Which pattern set governs admission decisions.
///
/// The two modes are exclusive: a decision never consults both sets.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FilterMode {
    /// Only whitelisted commands are allowed.
    Whitelist,
    /// Everything except blacklisted commands is allowed.
    Blacklist,
}

impl Default for FilterMode {
    fn default() -> Self {
        Self::Blacklist
    }
}

impl std::fmt::Display for FilterMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Whitelist => write!(f, "whitelist"),
            Self::Blacklist => write!(f, "blacklist"),
        }
    }
}

/// Outcome of evaluating a command against the policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilterDecision {
    pub allowed: bool,
    /// Denial reason; `None` when the command is allowed.
    pub reason: Option<String>,
}

impl FilterDecision {
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
        }
    }

    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason.into()),
        }
    }
}

/// A single policy entry.
///
/// Lines beginning with `^` are anchored regular expressions matched against
/// the full command; anything else is a literal matched against the base
/// command (first whitespace-delimited token).
#[derive(Debug, Clone)]
enum Pattern {
    Literal(String),
    Regex(Regex),
}

impl Pattern {
    /// Parse one non-blank, non-comment line into a pattern.
    ///
    /// A malformed regex is logged and dropped; it must never match and must
    /// never make policy loading fail.
    fn parse(line: &str) -> Option<Self> {
        if line.starts_with('^') {
            match Regex::new(line) {
                Ok(re) => Some(Self::Regex(re)),
                Err(e) => {
                    error!(pattern = line, "Invalid regex pattern in policy file: {e}");
                    None
                }
            }
        } else {
            Some(Self::Literal(line.to_string()))
        }
    }

    fn matches(&self, base_command: &str, command: &str) -> bool {
        match self {
            Self::Literal(lit) => base_command == lit,
            Self::Regex(re) => re.is_match(command),
        }
    }
}

/// Whitelist/blacklist filter for terminal commands.
///
/// Pattern files are plain UTF-8 text: one pattern per line, `#` comments and
/// blank lines ignored, surrounding whitespace trimmed. A missing file logs a
/// warning and yields an empty set rather than an error.
#[derive(Debug, Clone)]
pub struct CommandFilter {
    mode: FilterMode,
    whitelist: Vec<Pattern>,
    blacklist: Vec<Pattern>,
}

impl CommandFilter {
    /// Build a filter from two optional pattern files.
    pub fn new(
        whitelist_file: Option<&Path>,
        blacklist_file: Option<&Path>,
        mode: FilterMode,
    ) -> Self {
        Self {
            mode,
            whitelist: load_patterns(whitelist_file),
            blacklist: load_patterns(blacklist_file),
        }
    }

    /// Build a filter directly from pattern lines. Used by callers that keep
    /// policy inline rather than in files, and by tests.
    pub fn from_patterns<S: AsRef<str>>(
        whitelist: &[S],
        blacklist: &[S],
        mode: FilterMode,
    ) -> Self {
        Self {
            mode,
            whitelist: whitelist
                .iter()
                .filter_map(|l| Pattern::parse(l.as_ref()))
                .collect(),
            blacklist: blacklist
                .iter()
                .filter_map(|l| Pattern::parse(l.as_ref()))
                .collect(),
        }
    }

    pub fn mode(&self) -> FilterMode {
        self.mode
    }

    /// Decide whether a command may run.
    ///
    /// Pure and deterministic for a fixed policy: no I/O, no state.
    pub fn decide(&self, command: &str) -> FilterDecision {
        let base_command = command.split_whitespace().next().unwrap_or("");

        match self.mode {
            FilterMode::Whitelist => {
                if self.whitelist.is_empty() {
                    warn!("Whitelist mode enabled but whitelist is empty");
                    return FilterDecision::deny("Whitelist mode enabled but whitelist is empty");
                }
                if self
                    .whitelist
                    .iter()
                    .any(|p| p.matches(base_command, command))
                {
                    FilterDecision::allow()
                } else {
                    FilterDecision::deny(format!("Command not in whitelist: {base_command}"))
                }
            }
            FilterMode::Blacklist => {
                if self
                    .blacklist
                    .iter()
                    .any(|p| p.matches(base_command, command))
                {
                    FilterDecision::deny(format!("Command blacklisted: {base_command}"))
                } else {
                    FilterDecision::allow()
                }
            }
        }
    }
}

impl Default for CommandFilter {
    /// Blacklist mode with empty sets: everything is allowed.
    fn default() -> Self {
        Self {
            mode: FilterMode::Blacklist,
            whitelist: Vec::new(),
            blacklist: Vec::new(),
        }
    }
}

/// Load patterns from an optional policy file.
///
/// A missing or unreadable file degrades to an empty set; policy loading is
/// never fatal.
fn load_patterns(path: Option<&Path>) -> Vec<Pattern> {
    let Some(path) = path else {
        return Vec::new();
    };

    if !path.exists() {
        warn!(path = %path.display(), "Command list file not found");
        return Vec::new();
    }

    match read_pattern_lines(path) {
        Ok(lines) => {
            let patterns: Vec<Pattern> = lines.iter().filter_map(|l| Pattern::parse(l)).collect();
            info!(
                path = %path.display(),
                count = patterns.len(),
                "Loaded command patterns"
            );
            patterns
        }
        Err(e) => {
            error!(path = %path.display(), "Error loading command list: {e:#}");
            Vec::new()
        }
    }
}

fn read_pattern_lines(path: &Path) -> Result<Vec<String>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read policy file {}", path.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

/// Convenience holder for the two policy file paths plus the mode, the shape
/// the surrounding server layer passes down from its configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FilterConfig {
    pub whitelist_file: Option<PathBuf>,
    pub blacklist_file: Option<PathBuf>,
    #[serde(default)]
    pub mode: FilterMode,
}

impl FilterConfig {
    pub fn build(&self) -> CommandFilter {
        CommandFilter::new(
            self.whitelist_file.as_deref(),
            self.blacklist_file.as_deref(),
            self.mode,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn blacklist_filter(patterns: &[&str]) -> CommandFilter {
        CommandFilter::from_patterns::<&str>(&[], patterns, FilterMode::Blacklist)
    }

    fn whitelist_filter(patterns: &[&str]) -> CommandFilter {
        CommandFilter::from_patterns::<&str>(patterns, &[], FilterMode::Whitelist)
    }

    #[test]
    fn default_filter_allows_everything() {
        let filter = CommandFilter::default();
        assert!(filter.decide("rm -rf /").allowed);
        assert!(filter.decide("").allowed);
    }

    #[test]
    fn empty_whitelist_denies_everything() {
        let filter = whitelist_filter(&[]);
        let decision = filter.decide("echo hello");
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("empty"));
    }

    #[test]
    fn blacklist_literals_match_base_command() {
        let filter = blacklist_filter(&["rm", "sudo", "^.*eval.*"]);

        assert!(filter.decide("echo Hello").allowed);

        let rm = filter.decide("rm file.txt");
        assert!(!rm.allowed);
        assert!(rm.reason.unwrap().contains("blacklisted"));

        let sudo = filter.decide("sudo apt-get update");
        assert!(!sudo.allowed);
        assert!(sudo.reason.unwrap().contains("blacklisted"));

        assert!(!filter.decide("python -c 'eval(input())'").allowed);
    }

    #[test]
    fn blacklist_literal_does_not_match_substring() {
        let filter = blacklist_filter(&["rm"]);
        // "rmdir" is a different base command
        assert!(filter.decide("rmdir build").allowed);
    }

    #[test]
    fn whitelist_regex_matches_full_command() {
        let filter = whitelist_filter(&["^git (pull|push|status)$"]);

        assert!(filter.decide("git status").allowed);
        assert!(filter.decide("git pull").allowed);

        let clone = filter.decide("git clone https://example.com/repo.git");
        assert!(!clone.allowed);
        assert!(clone.reason.unwrap().contains("git"));
    }

    #[test]
    fn whitelist_literal_allows_any_arguments() {
        let filter = whitelist_filter(&["ls", "echo"]);
        assert!(filter.decide("ls -la /tmp").allowed);
        assert!(filter.decide("echo hi there").allowed);
        assert!(!filter.decide("cat /etc/passwd").allowed);
    }

    #[test]
    fn malformed_regex_never_raises_and_never_matches() {
        let filter = blacklist_filter(&["^*invalid"]);
        assert!(filter.decide("^*invalid").allowed);
        assert!(filter.decide("anything at all").allowed);

        // Same pattern on the whitelist side: nothing can satisfy it.
        let filter = whitelist_filter(&["^*invalid"]);
        assert!(!filter.decide("anything at all").allowed);
    }

    #[test]
    fn decision_is_deterministic() {
        let filter = blacklist_filter(&["rm", "^.*secret.*"]);
        let first = filter.decide("cat secret.txt");
        for _ in 0..10 {
            assert_eq!(filter.decide("cat secret.txt"), first);
        }
    }

    #[test]
    fn empty_command_in_whitelist_mode_is_denied() {
        let filter = whitelist_filter(&["ls"]);
        assert!(!filter.decide("").allowed);
    }

    #[test]
    fn loads_patterns_from_file_skipping_comments_and_blanks() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "# blocked commands").unwrap();
        writeln!(file).unwrap();
        writeln!(file, "  rm  ").unwrap();
        writeln!(file, "^.*--force.*").unwrap();
        file.flush().unwrap();

        let filter = CommandFilter::new(None, Some(file.path()), FilterMode::Blacklist);
        assert!(!filter.decide("rm file.txt").allowed);
        assert!(!filter.decide("git push --force origin main").allowed);
        assert!(filter.decide("echo hello").allowed);
        // The comment line is not a pattern
        assert!(filter.decide("# blocked commands").allowed);
    }

    #[test]
    fn missing_file_yields_empty_set() {
        let filter = CommandFilter::new(
            Some(Path::new("/nonexistent/whitelist.txt")),
            None,
            FilterMode::Whitelist,
        );
        let decision = filter.decide("ls");
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("empty"));
    }

    #[test]
    fn filter_config_builds_equivalent_filter() {
        let config = FilterConfig {
            whitelist_file: None,
            blacklist_file: None,
            mode: FilterMode::Blacklist,
        };
        assert!(config.build().decide("ls").allowed);
    }
}
