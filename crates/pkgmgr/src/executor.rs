use duct::cmd;

/// Output of a command invocation, normalized the way `osutils::exe::OutputChecker` normalizes
/// `std::process::Output` in the teacher codebase: exit code plus captured stdout/stderr, with
/// `success`/`failed` convenience predicates.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn failed(&self) -> bool {
        !self.success()
    }
}

/// Every native-tool invocation made by an adapter or a step body goes through this trait.
/// No adapter constructs a `std::process::Command` directly; this is the single seam that
/// makes the adapter layer testable against scripted `(exit_code, stdout, stderr)` tuples.
pub trait ShellExecutor: Send + Sync {
    fn execute(&self, cmd: &str, args: &[&str]) -> CommandOutput;

    /// Run the command through the injected privilege manager's elevation mechanism.
    fn execute_elevated(&self, cmd: &str, args: &[&str]) -> CommandOutput;

    /// Run the command, feeding `stdin_bytes` to its standard input. Used for writing
    /// repository files via an elevated `tee` when the native repo-manager tool is absent.
    fn execute_with_input(&self, stdin_bytes: &[u8], cmd: &str, args: &[&str]) -> CommandOutput;
}

/// Default executor backed by `duct`, the teacher's own process-invocation crate (e.g.
/// `osutils/src/systemd.rs`, `osutils/src/sfdisk.rs`). Provided so the crate is runnable
/// standalone; adapters and step bodies depend only on `ShellExecutor`, never on this type
/// concretely.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemExecutor;

impl SystemExecutor {
    fn run(program: &str, expr: duct::Expression) -> CommandOutput {
        match expr.stdout_capture().stderr_capture().unchecked().run() {
            Ok(output) => CommandOutput {
                exit_code: output.status.code().unwrap_or(-1),
                stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
                stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
            },
            Err(e) => CommandOutput {
                exit_code: -1,
                stdout: String::new(),
                stderr: format!("failed to execute '{program}': {e}"),
            },
        }
    }
}

impl ShellExecutor for SystemExecutor {
    fn execute(&self, program: &str, args: &[&str]) -> CommandOutput {
        Self::run(program, cmd(program, args.to_vec()))
    }

    fn execute_elevated(&self, program: &str, args: &[&str]) -> CommandOutput {
        let sudo_args: Vec<&str> = std::iter::once("-n").chain(std::iter::once(program)).chain(args.iter().copied()).collect();
        Self::run(program, cmd("sudo", sudo_args))
    }

    fn execute_with_input(&self, stdin_bytes: &[u8], program: &str, args: &[&str]) -> CommandOutput {
        let sudo_args: Vec<&str> = std::iter::once("-n").chain(std::iter::once(program)).chain(args.iter().copied()).collect();
        Self::run(program, cmd("sudo", sudo_args).stdin_bytes(stdin_bytes.to_vec()))
    }
}

/// Whether a binary is reachable on `$PATH`. Adapters use this for `is_available()`.
pub fn on_path(binary: &str) -> bool {
    which::which(binary).is_ok()
}

#[cfg(any(test, feature = "test-util"))]
pub mod mock {
    use super::*;
    use std::{
        collections::VecDeque,
        sync::Mutex,
    };

    /// Test double that returns a scripted queue of `CommandOutput`s regardless of which
    /// method is called, and records every invocation for assertions (e.g. scenario 8's
    /// "install([]) made zero executor calls").
    #[derive(Default)]
    pub struct MockExecutor {
        pub responses: Mutex<VecDeque<CommandOutput>>,
        pub calls: Mutex<Vec<(String, Vec<String>)>>,
    }

    impl MockExecutor {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn push_response(&self, output: CommandOutput) {
            self.responses.lock().unwrap().push_back(output);
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }

        fn record_and_respond(&self, cmd: &str, args: &[&str]) -> CommandOutput {
            self.calls
                .lock()
                .unwrap()
                .push((cmd.to_string(), args.iter().map(|s| s.to_string()).collect()));
            self.responses
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_default()
        }
    }

    impl ShellExecutor for MockExecutor {
        fn execute(&self, cmd: &str, args: &[&str]) -> CommandOutput {
            self.record_and_respond(cmd, args)
        }

        fn execute_elevated(&self, cmd: &str, args: &[&str]) -> CommandOutput {
            self.record_and_respond(cmd, args)
        }

        fn execute_with_input(&self, _stdin: &[u8], cmd: &str, args: &[&str]) -> CommandOutput {
            self.record_and_respond(cmd, args)
        }
    }
}
