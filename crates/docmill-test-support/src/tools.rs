//! External tool probes for availability-gated integration tests.

use std::process::Command;

/// Returns `true` if the named converter binary can be spawned.
///
/// Suites exercising `pdftoppm` or `soffice` call this first and skip when
/// the binary is absent, so the tests stay green on minimal hosts.
#[must_use]
pub fn tool_available(program: &str, probe_arg: &str) -> bool {
    Command::new(program)
        .arg(probe_arg)
        .output()
        .map(|output| output.status.success())
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_binary_reports_unavailable() {
        assert!(!tool_available("/definitely/not/a/binary", "--version"));
    }

    #[test]
    fn shell_builtin_reports_available() {
        assert!(tool_available("true", "--ignored"));
    }
}
