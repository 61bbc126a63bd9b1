use std::path::{Path, PathBuf};

use signaltap_cli::config::{CollectorConfig, LoadedConfig};

use super::output::OutputFormat;

pub struct CliContext {
    config: CollectorConfig,
    config_path: PathBuf,
    from_file: bool,
    output: OutputFormat,
}

impl CliContext {
    pub fn new(loaded: LoadedConfig, output: OutputFormat) -> Self {
        Self {
            config: loaded.config,
            config_path: loaded.path,
            from_file: loaded.from_file,
            output,
        }
    }

    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn config_from_file(&self) -> bool {
        self.from_file
    }

    pub fn output(&self) -> OutputFormat {
        self.output
    }
}
