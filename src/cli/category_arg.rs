use clap::builder::PossibleValue;
use clap::ValueEnum;
use std::fmt;

use crate::logs::LogCategory;

/// CLI-facing mirror of [`LogCategory`], used for `--category` filtering on
/// `logs`.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum CategoryArg {
    Console,
    Network,
    Renderer,
    Security,
    System,
    Ipc,
    Performance,
}

impl From<CategoryArg> for LogCategory {
    fn from(value: CategoryArg) -> Self {
        match value {
            CategoryArg::Console => LogCategory::Console,
            CategoryArg::Network => LogCategory::Network,
            CategoryArg::Renderer => LogCategory::Renderer,
            CategoryArg::Security => LogCategory::Security,
            CategoryArg::System => LogCategory::System,
            CategoryArg::Ipc => LogCategory::Ipc,
            CategoryArg::Performance => LogCategory::Performance,
        }
    }
}

impl fmt::Display for CategoryArg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.to_possible_value()
            .expect("to_possible_value should cover all categories")
            .get_name()
            .fmt(f)
    }
}

impl ValueEnum for CategoryArg {
    fn value_variants<'a>() -> &'a [CategoryArg] {
        &[
            CategoryArg::Console,
            CategoryArg::Network,
            CategoryArg::Renderer,
            CategoryArg::Security,
            CategoryArg::System,
            CategoryArg::Ipc,
            CategoryArg::Performance,
        ]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(match self {
            CategoryArg::Console => PossibleValue::new("console"),
            CategoryArg::Network => PossibleValue::new("network"),
            CategoryArg::Renderer => PossibleValue::new("renderer"),
            CategoryArg::Security => PossibleValue::new("security"),
            CategoryArg::System => PossibleValue::new("system"),
            CategoryArg::Ipc => PossibleValue::new("ipc"),
            CategoryArg::Performance => PossibleValue::new("performance"),
        })
    }
}
