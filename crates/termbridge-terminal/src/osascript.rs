/// osascript runner shared by the automation-driven backends
use anyhow::{bail, Result};
use tokio::process::Command;

/// Run one AppleScript source via `osascript -e`, returning trimmed stdout.
pub(crate) async fn run_osascript(script: &str) -> Result<String> {
    let output = Command::new("osascript")
        .args(["-e", script])
        .output()
        .await?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        bail!("osascript failed: {}", stderr.trim());
    }

    Ok(String::from_utf8_lossy(&output.stdout).trim_end().to_string())
}

/// Escape command text for embedding inside a double-quoted AppleScript
/// string literal.
pub(crate) fn escape_applescript(text: &str) -> String {
    text.replace('\\', "\\\\").replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_and_backslashes() {
        assert_eq!(escape_applescript(r#"echo "hi""#), r#"echo \"hi\""#);
        assert_eq!(escape_applescript(r"a\b"), r"a\\b");
        assert_eq!(escape_applescript("plain"), "plain");
    }
}
