//! Table-driven substring classifier, kept as one data structure so the
//! level/category rules can be audited and unit-tested independent of the
//! buffer or tailer that feed it.

use super::{LogCategory, LogLevel, LogSource};

const ERROR_MARKERS: &[&str] = &["[error]", "error:", "uncaught", "exception"];
const WARNING_MARKERS: &[&str] = &["[warn", "warning"];
const DEBUG_MARKERS: &[&str] = &["[debug]"];

const CATEGORY_RULES: &[(&[&str], LogCategory)] = &[
    (&["[network]", "fetch", "http"], LogCategory::Network),
    (&["[renderer]", "[browser]"], LogCategory::Renderer),
    (&["[security]", "cors", "csp"], LogCategory::Security),
    (&["[ipc]"], LogCategory::Ipc),
    (&["[performance]", "memory", "cpu"], LogCategory::Performance),
];

fn contains_any(haystack: &str, needles: &[&str]) -> bool {
    needles.iter().any(|needle| haystack.contains(needle))
}

fn level_from_text(lower: &str) -> LogLevel {
    if contains_any(lower, ERROR_MARKERS) {
        LogLevel::Error
    } else if contains_any(lower, WARNING_MARKERS) {
        LogLevel::Warning
    } else if contains_any(lower, DEBUG_MARKERS) {
        LogLevel::Debug
    } else {
        LogLevel::Info
    }
}

/// Classifies a single line, given the source it came from and the default
/// category that applies absent an override (the file tailer passes each
/// watched file's default; direct stdout/stderr pushes pass a stream
/// default, usually [`LogCategory::Console`]).
pub fn classify(line: &str, source: LogSource, default_category: LogCategory) -> (LogLevel, LogCategory) {
    let lower = line.to_lowercase();

    let level = match source {
        LogSource::Stderr => {
            // Direct stderr defaults to error; stdout-style rules may still
            // upgrade it to warning/debug, but only actual stdout lines are
            // allowed to downgrade to info.
            if contains_any(&lower, ERROR_MARKERS) {
                LogLevel::Error
            } else if contains_any(&lower, WARNING_MARKERS) {
                LogLevel::Warning
            } else if contains_any(&lower, DEBUG_MARKERS) {
                LogLevel::Debug
            } else {
                LogLevel::Error
            }
        }
        LogSource::Stdout | LogSource::File => level_from_text(&lower),
    };

    let category = CATEGORY_RULES
        .iter()
        .find(|(markers, _)| contains_any(&lower, markers))
        .map(|(_, category)| *category)
        .unwrap_or(default_category);

    (level, category)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("normal message", LogLevel::Info)]
    #[case("[ERROR] disk full", LogLevel::Error)]
    #[case("Error: cannot connect", LogLevel::Error)]
    #[case("Uncaught TypeError", LogLevel::Error)]
    #[case("unhandled exception in worker", LogLevel::Error)]
    #[case("[warn] retrying", LogLevel::Warning)]
    #[case("Warning: deprecated api", LogLevel::Warning)]
    #[case("[debug] entering loop", LogLevel::Debug)]
    fn classifies_stdout_level(#[case] line: &str, #[case] expected: LogLevel) {
        let (level, _) = classify(line, LogSource::Stdout, LogCategory::Console);
        assert_eq!(level, expected);
    }

    #[test]
    fn stderr_defaults_to_error_without_markers() {
        let (level, _) = classify("connection refused", LogSource::Stderr, LogCategory::Console);
        assert_eq!(level, LogLevel::Error);
    }

    #[test]
    fn stderr_markers_still_apply() {
        let (level, _) = classify("[warn] retrying connection", LogSource::Stderr, LogCategory::Console);
        assert_eq!(level, LogLevel::Warning);
    }

    #[rstest]
    #[case("[network] request failed", LogCategory::Network)]
    #[case("fetching resource", LogCategory::Network)]
    #[case("http status 500", LogCategory::Network)]
    #[case("[renderer] frame dropped", LogCategory::Renderer)]
    #[case("[browser] window closed", LogCategory::Renderer)]
    #[case("[security] blocked request", LogCategory::Security)]
    #[case("cors violation detected", LogCategory::Security)]
    #[case("csp directive violated", LogCategory::Security)]
    #[case("[ipc] channel closed", LogCategory::Ipc)]
    #[case("[performance] slow frame", LogCategory::Performance)]
    #[case("memory usage high", LogCategory::Performance)]
    #[case("cpu spike detected", LogCategory::Performance)]
    fn classifies_category_override(#[case] line: &str, #[case] expected: LogCategory) {
        let (_, category) = classify(line, LogSource::Stdout, LogCategory::System);
        assert_eq!(category, expected);
    }

    #[test]
    fn falls_back_to_default_category() {
        let (_, category) = classify("just a line", LogSource::File, LogCategory::System);
        assert_eq!(category, LogCategory::System);
    }

    #[test]
    fn classification_is_case_insensitive() {
        let (level, category) = classify("[ERROR] [NETWORK] boom", LogSource::Stdout, LogCategory::Console);
        assert_eq!(level, LogLevel::Error);
        assert_eq!(category, LogCategory::Network);
    }
}
