use clap::ValueEnum;

use ocikey_provisioning::RunMode;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum CliRunMode {
    Packaged,
    #[value(alias = "dev")]
    Development,
}

impl From<CliRunMode> for RunMode {
    fn from(value: CliRunMode) -> Self {
        match value {
            CliRunMode::Packaged => RunMode::Packaged,
            CliRunMode::Development => RunMode::Development,
        }
    }
}
