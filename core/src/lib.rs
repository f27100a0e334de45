//! Shared pieces of the songbox workspace: configuration, logging, and small helpers.

use std::{net::TcpListener, path::PathBuf, time::Duration};

use errors::DirectoryError;

pub mod config;
pub mod errors;
pub mod logger;
#[cfg(any(test, feature = "test_utils"))]
pub mod test_utils;

/// Checks if a server is already listening on the given port.
///
/// This is done by trying to bind to the port on localhost, if that fails the port is taken.
#[must_use]
#[inline]
pub fn is_server_running(port: u16) -> bool {
    TcpListener::bind(("127.0.0.1", port)).is_err()
}

/// Get the directory the config file lives in (e.g. `~/.config/songbox` on linux).
///
/// # Errors
///
/// Returns an error if the home directory of the user can't be determined.
#[inline]
pub fn get_config_dir() -> Result<PathBuf, DirectoryError> {
    directories::ProjectDirs::from("", "", "songbox")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or(DirectoryError::Config)
}

/// Get the directory persistent data (logs, by default) is stored in (e.g. `~/.local/share/songbox` on linux).
///
/// # Errors
///
/// Returns an error if the home directory of the user can't be determined.
#[inline]
pub fn get_data_dir() -> Result<PathBuf, DirectoryError> {
    directories::ProjectDirs::from("", "", "songbox")
        .map(|dirs| dirs.data_dir().to_path_buf())
        .ok_or(DirectoryError::Data)
}

/// Format a duration as `m:ss`, minutes are not wrapped into hours.
#[must_use]
#[inline]
pub fn format_duration(duration: &Duration) -> String {
    let total = duration.as_secs();
    format!("{}:{:02}", total / 60, total % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[rstest]
    #[case(Duration::from_secs(0), "0:00")]
    #[case(Duration::from_millis(59_999), "0:59")]
    #[case(Duration::from_secs(61), "1:01")]
    #[case(Duration::from_secs(3600 + 5), "60:05")]
    fn test_format_duration(#[case] duration: Duration, #[case] expected: &str) {
        assert_eq!(format_duration(&duration), expected);
    }

    #[test]
    fn test_is_server_running() -> anyhow::Result<()> {
        let listener = TcpListener::bind(("127.0.0.1", 0))?;
        let port = listener.local_addr()?.port();
        assert!(is_server_running(port));
        drop(listener);
        assert!(!is_server_running(port));
        Ok(())
    }
}
