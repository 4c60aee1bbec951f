//! Common transport types

use std::collections::BTreeSet;

/// Operating system family of a managed host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OsName {
    Linux,
    Windows,
    FreeBsd,
    MacOs,
    Esxi,
    Unknown,
}

impl OsName {
    /// OS family of the machine this binary was built for
    pub fn current() -> Self {
        match std::env::consts::OS {
            "linux" => OsName::Linux,
            "windows" => OsName::Windows,
            "freebsd" => OsName::FreeBsd,
            "macos" => OsName::MacOs,
            _ => OsName::Unknown,
        }
    }
}

impl std::fmt::Display for OsName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OsName::Linux => write!(f, "linux"),
            OsName::Windows => write!(f, "windows"),
            OsName::FreeBsd => write!(f, "freebsd"),
            OsName::MacOs => write!(f, "macos"),
            OsName::Esxi => write!(f, "esxi"),
            OsName::Unknown => write!(f, "unknown"),
        }
    }
}

/// How a command should be executed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecOptions {
    /// Run through the platform shell (`sh -c` / `cmd /C`)
    pub shell: bool,
    /// Exit codes treated as success; `None` accepts any code
    pub expected_return_codes: Option<BTreeSet<i32>>,
}

impl Default for ExecOptions {
    fn default() -> Self {
        Self {
            shell: false,
            expected_return_codes: Some(BTreeSet::from([0])),
        }
    }
}

impl ExecOptions {
    /// Default options run through the shell
    pub fn shell() -> Self {
        Self {
            shell: true,
            ..Default::default()
        }
    }

    /// Set the accepted exit codes
    pub fn with_expected_return_codes(mut self, codes: impl IntoIterator<Item = i32>) -> Self {
        self.expected_return_codes = Some(codes.into_iter().collect());
        self
    }

    /// Accept any exit code
    pub fn any_return_code(mut self) -> Self {
        self.expected_return_codes = None;
        self
    }

    /// Check an exit code against the accepted set
    pub fn accepts(&self, code: i32) -> bool {
        self.expected_return_codes
            .as_ref()
            .map_or(true, |codes| codes.contains(&code))
    }
}

/// Output of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletedProcess {
    /// The command line that was run
    pub args: String,
    pub stdout: String,
    pub stderr: String,
    pub return_code: i32,
}

impl CompletedProcess {
    /// Successful process with the given stdout
    pub fn with_stdout(args: impl Into<String>, stdout: impl Into<String>) -> Self {
        Self {
            args: args.into(),
            stdout: stdout.into(),
            ..Default::default()
        }
    }
}
