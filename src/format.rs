use std::io::Write;
use std::process::{Command, Stdio};

use crate::config::{Config, FormatterKind};
use crate::error::{Error, Result};

/// Normalizes reconstructed Go source before it is written.
pub trait Formatter {
    /// Returns the formatted `content` of the file called `name`.
    fn format(&self, name: &str, content: &str) -> Result<String>;
}

/// Pipes content through an external program such as `gofmt`.
///
/// The program receives the source on stdin and must print the formatted
/// source on stdout. A non-zero exit is reported with its stderr.
#[derive(Debug, Clone)]
pub struct GoFmt {
    program: String,
    args: Vec<String>,
}

impl GoFmt {
    /// Splits `command` on whitespace into a program and its arguments.
    pub fn new(command: &str) -> Result<Self> {
        let mut parts = command.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| Error::ConfigValidation("formatter command is empty".into()))?;
        Ok(Self { program, args: parts.collect() })
    }
}

impl Formatter for GoFmt {
    fn format(&self, name: &str, content: &str) -> Result<String> {
        let format_error = |message: String| Error::FormatError {
            name: name.to_string(),
            message,
            content: content.to_string(),
        };

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| format_error(format!("cannot run '{}': {e}", self.program)))?;

        if let Some(mut stdin) = child.stdin.take() {
            if let Err(e) = stdin.write_all(content.as_bytes()) {
                if e.kind() == std::io::ErrorKind::BrokenPipe {
                    log::debug!("Formatter closed stdin early");
                } else {
                    return Err(format_error(format!("cannot write to formatter: {e}")));
                }
            }
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            return Err(format_error(String::from_utf8_lossy(&output.stderr).trim().to_string()));
        }
        String::from_utf8(output.stdout).map_err(|e| format_error(e.to_string()))
    }
}

/// Leaves content untouched.
#[derive(Debug, Clone, Copy, Default)]
pub struct Passthrough;

impl Formatter for Passthrough {
    fn format(&self, _name: &str, content: &str) -> Result<String> {
        Ok(content.to_string())
    }
}

/// Picks the formatter named by the configuration.
pub fn from_config(config: &Config) -> Result<Box<dyn Formatter>> {
    match config.formatter {
        FormatterKind::Gofmt => Ok(Box::new(GoFmt::new(&config.formatter_command)?)),
        FormatterKind::None => Ok(Box::new(Passthrough)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_keeps_content() {
        assert_eq!(Passthrough.format("a.go", "package a\n").unwrap(), "package a\n");
    }

    #[test]
    fn splits_command_arguments() {
        let formatter = GoFmt::new("gofmt -s").unwrap();
        assert_eq!(formatter.program, "gofmt");
        assert_eq!(formatter.args, vec!["-s".to_string()]);
        assert!(GoFmt::new("  ").is_err());
    }

    #[cfg(unix)]
    #[test]
    fn pipes_content_through_command() {
        let formatter = GoFmt::new("tr a-z A-Z").unwrap();
        assert_eq!(formatter.format("a.go", "package a\n").unwrap(), "PACKAGE A\n");
    }

    #[cfg(unix)]
    #[test]
    fn failing_command_reports_content() {
        let formatter = GoFmt::new("false").unwrap();
        match formatter.format("a.go", "package a\n") {
            Err(Error::FormatError { name, content, .. }) => {
                assert_eq!(name, "a.go");
                assert_eq!(content, "package a\n");
            }
            other => panic!("expected format error, got {other:?}"),
        }
    }
}
