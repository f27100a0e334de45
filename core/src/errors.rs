use thiserror::Error;

/// Errors that can occur with finding the config or data directories.
#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("Unable to find the config directory for songbox.")]
    Config,
    #[error("Unable to find the data directory for songbox.")]
    Data,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_str_eq;
    use rstest::rstest;

    #[rstest]
    #[case(DirectoryError::Config, "Unable to find the config directory for songbox.")]
    #[case(DirectoryError::Data, "Unable to find the data directory for songbox.")]
    fn test_directory_error_display(#[case] input: DirectoryError, #[case] expected: &str) {
        assert_str_eq!(input.to_string(), expected);
    }
}
