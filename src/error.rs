use std::path::PathBuf;

/// Exit code for configuration and usage errors.
pub const CONFIG_ERROR_EXIT_CODE: u8 = 2;

/// Problems with the inputs a command was pointed at. `main` maps these to
/// [`CONFIG_ERROR_EXIT_CODE`].
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing source directory: {}", .0.display())]
    MissingSourceDir(PathBuf),

    #[error("source directory is empty; refusing to write archive: {}", .0.display())]
    EmptySourceDir(PathBuf),

    #[error("missing site root: {}", .0.display())]
    MissingSiteRoot(PathBuf),
}

/// Process exit code for a failed command: [`CONFIG_ERROR_EXIT_CODE`] when a
/// [`ConfigError`] is anywhere in the chain, 1 otherwise.
pub fn exit_code_for(err: &anyhow::Error) -> u8 {
    if err.chain().any(|cause| cause.is::<ConfigError>()) {
        CONFIG_ERROR_EXIT_CODE
    } else {
        1
    }
}

#[cfg(test)]
mod tests {
    use anyhow::Context as _;

    use super::*;

    #[test]
    fn config_errors_map_to_exit_code_two_through_context() {
        let err: anyhow::Result<()> = Err(ConfigError::MissingSiteRoot(PathBuf::from("site")).into());
        let err = err.context("check links").err();
        assert_eq!(err.as_ref().map(exit_code_for), Some(CONFIG_ERROR_EXIT_CODE));
    }

    #[test]
    fn other_errors_map_to_exit_code_one() {
        let err = anyhow::anyhow!("boom").context("render derivatives");
        assert_eq!(exit_code_for(&err), 1);
    }
}
