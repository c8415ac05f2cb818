use clap::builder::PossibleValue;
use clap::ValueEnum;
use std::fmt;

use crate::config::Mode;

/// CLI-facing mirror of [`Mode`], kept separate so the data model stays
/// free of `clap` derives.
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub enum ModeArg {
    Dev,
    Production,
}

impl From<ModeArg> for Mode {
    fn from(value: ModeArg) -> Self {
        match value {
            ModeArg::Dev => Mode::Dev,
            ModeArg::Production => Mode::Production,
        }
    }
}

impl fmt::Display for ModeArg {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        self.to_possible_value()
            .expect("to_possible_value should cover all modes")
            .get_name()
            .fmt(f)
    }
}

impl ValueEnum for ModeArg {
    fn value_variants<'a>() -> &'a [ModeArg] {
        &[ModeArg::Dev, ModeArg::Production]
    }

    fn to_possible_value(&self) -> Option<PossibleValue> {
        Some(match self {
            ModeArg::Dev => PossibleValue::new("dev"),
            ModeArg::Production => PossibleValue::new("production"),
        })
    }
}
