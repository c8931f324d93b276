//! Output destinations for rendered text.

use std::fs::{self, OpenOptions};
use std::io::{self, Write};
use std::path::PathBuf;

use crate::config::OutputConfig;

/// Where rendered text goes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Output {
    Stdout,
    /// A file rewritten in full on every render.
    File { path: PathBuf, mode: u32 },
}

impl Output {
    pub fn from_config(config: &OutputConfig) -> Self {
        match &config.path {
            Some(path) => Output::File {
                path: path.clone(),
                mode: config.mode,
            },
            None => Output::Stdout,
        }
    }

    pub fn write(&self, contents: &str) -> io::Result<()> {
        match self {
            Output::Stdout => {
                let mut stdout = io::stdout().lock();
                stdout.write_all(contents.as_bytes())?;
                stdout.flush()
            }
            Output::File { path, mode } => {
                let mut options = OpenOptions::new();
                options.write(true).create(true).truncate(true);
                #[cfg(unix)]
                {
                    use std::os::unix::fs::OpenOptionsExt;
                    options.mode(*mode);
                }
                let mut file = options.open(path)?;
                file.write_all(contents.as_bytes())?;
                file.sync_all()?;

                // `mode` only applies when the file is created
                #[cfg(unix)]
                {
                    use std::os::unix::fs::PermissionsExt;
                    fs::set_permissions(path, fs::Permissions::from_mode(*mode))?;
                }
                #[cfg(not(unix))]
                let _ = mode;

                tracing::debug!(path = %path.display(), bytes = contents.len(), "Output written");
                Ok(())
            }
        }
    }
}
