//! Command wrapper: composes the driver script handed to the executor.
//!
//! This is the only place in the workspace where executable text is built
//! from a command string; every other component treats commands as opaque
//! values. The command reaching this point has already passed validation.

/// Characters that force the command through `sh -c` instead of a verbatim
/// driver line.
pub const SHELL_METACHARACTERS: &[char] = &['|', '&', ';', '<', '>', '(', ')', '{', '}'];

/// Whether the command needs shell interpretation.
pub fn needs_shell(command: &str) -> bool {
    command.chars().any(|c| SHELL_METACHARACTERS.contains(&c))
}

/// Escape single quotes for embedding inside a single-quoted sh string.
pub fn escape_single_quotes(command: &str) -> String {
    command.replace('\'', r"'\''")
}

/// Build the driver script.
///
/// The driver runs the command, captures its exit status, then sleeps the
/// settle window so backgrounded children get a chance to flush output
/// before the parent collects the pipes, and finally exits with the
/// captured status.
pub fn compose_driver(command: &str, settle_secs: u64) -> String {
    let mut script = String::from("#!/bin/sh\n");
    script.push_str("# generated execution driver; removed after the run\n");

    if needs_shell(command) {
        script.push_str(&format!("sh -c '{}'\n", escape_single_quotes(command)));
    } else {
        script.push_str(command);
        script.push('\n');
    }

    script.push_str("__cordon_status=$?\n");
    if settle_secs > 0 {
        script.push_str(&format!("sleep {}\n", settle_secs));
    }
    script.push_str("exit $__cordon_status\n");
    script
}
