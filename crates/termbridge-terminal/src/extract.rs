/// Locating command output inside captured terminal text
///
/// The automation-driven backends only ever see the whole visible screen, so
/// the command's own echo line is used as the boundary: everything after the
/// first line containing the literal command text is treated as its output.
/// This is a compatibility heuristic, not a guaranteed-correct algorithm —
/// the command text can reappear in later output, or the shell's echo can be
/// wrapped so the literal text never matches.

/// Everything after the first line containing `command`, or `None` when the
/// command line cannot be located (callers then fall back to the full text).
pub(crate) fn output_after_command(text: &str, command: &str) -> Option<String> {
    let lines: Vec<&str> = text.lines().collect();
    let index = lines.iter().position(|line| line.contains(command))?;
    if index + 1 >= lines.len() {
        return None;
    }
    Some(lines[index + 1..].join("\n"))
}

/// Completion heuristic for screen-text snapshots: the shell echoed the
/// command and produced further content.
pub(crate) fn command_echo_detected(snapshot: &str, command: &str) -> bool {
    !snapshot.is_empty() && snapshot.contains(command) && snapshot.len() > command.len()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_lines_after_the_command() {
        let text = "prompt$ echo hi\nhi\nprompt$";
        assert_eq!(
            output_after_command(text, "echo hi").as_deref(),
            Some("hi\nprompt$")
        );
    }

    #[test]
    fn returns_none_when_command_not_present() {
        assert!(output_after_command("some output\nmore", "echo hi").is_none());
    }

    #[test]
    fn returns_none_when_command_is_on_the_last_line() {
        assert!(output_after_command("prompt$ echo hi", "echo hi").is_none());
    }

    #[test]
    fn first_occurrence_wins_when_command_text_reappears() {
        let text = "$ cat f\ncat f\ndone";
        assert_eq!(output_after_command(text, "cat f").as_deref(), Some("cat f\ndone"));
    }

    #[test]
    fn echo_detection_needs_command_plus_more() {
        assert!(command_echo_detected("$ echo hi\nhi", "echo hi"));
        assert!(!command_echo_detected("echo hi", "echo hi"));
        assert!(!command_echo_detected("", "echo hi"));
        assert!(!command_echo_detected("unrelated text", "echo hi"));
    }
}
