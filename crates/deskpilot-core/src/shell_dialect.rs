//! Shell dialect heuristic.
//!
//! Free-form `/sh` text is run by the platform shell unless it looks like
//! PowerShell, in which case it goes to the PowerShell interpreter. Matching
//! is case-sensitive on the capitalised `Verb-Noun` and `-Parameter` forms so
//! that POSIX flags such as `find -path` or `test x -eq 0` stay in `sh`. When
//! no PowerShell is installed the runner falls back to the default shell.

// lazy_regex! validates the patterns at compile time
#![allow(clippy::non_std_lazy_statics)]

use lazy_regex::lazy_regex;

/// Verb-Noun cmdlet names such as `Get-ChildItem` or `Stop-Process`.
static RE_CMDLET: lazy_regex::Lazy<regex::Regex> = lazy_regex!(
    r"(?:^|[\s;|(])(?:Get|Set|New|Remove|Start|Stop|Restart|Test|Select|Where|ForEach|Write|Out|Invoke|Import|Export|Add|Clear|Copy|Move|Rename|Format|Measure|Sort|Resolve|Split|Join|Convert|ConvertTo|ConvertFrom)-[A-Z][A-Za-z]+\b"
);

/// PowerShell variables and parameters (`$env:PATH`, `$PSVersionTable`, `-ErrorAction`).
static RE_PS_SYNTAX: lazy_regex::Lazy<regex::Regex> = lazy_regex!(
    r"\$[Ee]nv:|\$PSVersionTable|\$PSHOME|\$_\.|\s-(?:ErrorAction|Recurse|Force|Filter|Path|Encoding)\b|\[(?:System\.|IO\.)"
);

/// Interpreter chosen for a shell-mode command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellDialect {
    /// `sh -c` on Unix, `cmd /C` on Windows.
    Default,
    /// `powershell -Command` (`pwsh` outside Windows).
    PowerShell,
}

impl ShellDialect {
    /// Program and leading arguments that run a command string.
    #[must_use]
    pub const fn interpreter(self) -> (&'static str, &'static [&'static str]) {
        match self {
            Self::PowerShell if cfg!(windows) => (
                "powershell",
                &["-NoProfile", "-NonInteractive", "-Command"],
            ),
            Self::PowerShell => ("pwsh", &["-NoProfile", "-NonInteractive", "-Command"]),
            Self::Default if cfg!(windows) => ("cmd", &["/C"]),
            Self::Default => ("sh", &["-c"]),
        }
    }
}

/// Classify a command string by the idioms it uses.
#[must_use]
pub fn detect(command: &str) -> ShellDialect {
    if RE_CMDLET.is_match(command) || RE_PS_SYNTAX.is_match(command) {
        ShellDialect::PowerShell
    } else {
        ShellDialect::Default
    }
}
