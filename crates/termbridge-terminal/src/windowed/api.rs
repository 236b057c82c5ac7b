/// Structured session-API seam for the windowed backend
///
/// The backend's state machine only ever talks to these traits, which mirror
/// the connection → application → session shape of the iTerm2 automation
/// surface. The production implementation drives iTerm2 through osascript;
/// tests substitute a scripted mock.
use anyhow::{bail, Result};
use async_trait::async_trait;

use crate::osascript::{escape_applescript, run_osascript};

/// Entry point: bootstrap the application and establish connections.
#[async_trait]
pub trait WindowedApi: Send + Sync {
    /// Activate the application, create a window and tab if absent, and send
    /// an empty write to force session initialization. Failures here are
    /// logged and tolerated; the subsequent connect decides success.
    async fn bootstrap(&self) -> Result<()>;

    /// Establish the structured connection.
    async fn connect(&self) -> Result<Box<dyn WindowedConnection>>;
}

/// An established connection. Closed explicitly during cleanup.
#[async_trait]
pub trait WindowedConnection: Send + Sync {
    /// Obtain the application handle over this connection.
    async fn app(&self) -> Result<Box<dyn WindowedApp>>;

    async fn close(&mut self) -> Result<()>;
}

/// The application handle: enumerates windows, tabs, and sessions.
#[async_trait]
pub trait WindowedApp: Send + Sync {
    async fn window_ids(&self) -> Result<Vec<String>>;

    async fn tab_ids(&self, window_id: &str) -> Result<Vec<String>>;

    async fn active_session(
        &self,
        window_id: &str,
        tab_id: &str,
    ) -> Result<Box<dyn WindowedSessionHandle>>;
}

/// One interactive session inside a tab.
#[async_trait]
pub trait WindowedSessionHandle: Send + Sync {
    async fn send_text(&self, text: &str) -> Result<()>;

    /// Current visible screen contents, one entry per line.
    async fn screen_lines(&self) -> Result<Vec<String>>;
}

/// osascript-backed implementation driving iTerm2.
#[derive(Debug, Default)]
pub struct ItermApi;

impl ItermApi {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl WindowedApi for ItermApi {
    async fn bootstrap(&self) -> Result<()> {
        run_osascript(
            r#"tell application "iTerm2"
    activate
    if (count of windows) is 0 then
        create window with default profile
    end if
    tell current window
        if (count of tabs) is 0 then
            create tab with default profile
        end if
        tell current session
            write text ""
        end tell
    end tell
end tell"#,
        )
        .await?;
        Ok(())
    }

    async fn connect(&self) -> Result<Box<dyn WindowedConnection>> {
        // A trivial scripting query proves the app is up and answering.
        let version = run_osascript(r#"tell application "iTerm2" to version"#).await?;
        if version.is_empty() {
            bail!("iTerm2 did not report a version");
        }
        Ok(Box::new(ItermConnection { open: true }))
    }
}

pub struct ItermConnection {
    open: bool,
}

#[async_trait]
impl WindowedConnection for ItermConnection {
    async fn app(&self) -> Result<Box<dyn WindowedApp>> {
        if !self.open {
            bail!("iTerm2 connection is closed");
        }
        Ok(Box::new(ItermAppHandle))
    }

    async fn close(&mut self) -> Result<()> {
        self.open = false;
        Ok(())
    }
}

pub struct ItermAppHandle;

#[async_trait]
impl WindowedApp for ItermAppHandle {
    async fn window_ids(&self) -> Result<Vec<String>> {
        let raw = run_osascript(r#"tell application "iTerm2" to id of windows"#).await?;
        Ok(split_applescript_list(&raw))
    }

    async fn tab_ids(&self, window_id: &str) -> Result<Vec<String>> {
        let script = format!(
            r#"tell application "iTerm2" to index of tabs of window id {window_id}"#
        );
        let raw = run_osascript(&script).await?;
        Ok(split_applescript_list(&raw))
    }

    async fn active_session(
        &self,
        window_id: &str,
        _tab_id: &str,
    ) -> Result<Box<dyn WindowedSessionHandle>> {
        Ok(Box::new(ItermSessionHandle {
            window_id: window_id.to_string(),
        }))
    }
}

pub struct ItermSessionHandle {
    window_id: String,
}

#[async_trait]
impl WindowedSessionHandle for ItermSessionHandle {
    async fn send_text(&self, text: &str) -> Result<()> {
        let escaped = escape_applescript(text.trim_end_matches('\n'));
        let script = format!(
            r#"tell application "iTerm2"
    tell current session of window id {}
        write text "{escaped}"
    end tell
end tell"#,
            self.window_id
        );
        run_osascript(&script).await?;
        Ok(())
    }

    async fn screen_lines(&self) -> Result<Vec<String>> {
        let script = format!(
            r#"tell application "iTerm2"
    tell current session of window id {}
        contents
    end tell
end tell"#,
            self.window_id
        );
        let contents = run_osascript(&script).await?;
        Ok(contents.lines().map(str::to_string).collect())
    }
}

/// AppleScript prints lists as comma-separated text.
fn split_applescript_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_comma_separated_ids() {
        assert_eq!(split_applescript_list("101, 102, 103"), ["101", "102", "103"]);
        assert_eq!(split_applescript_list("7"), ["7"]);
        assert!(split_applescript_list("").is_empty());
    }
}
