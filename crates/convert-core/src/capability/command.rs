use super::{Capability, CapabilityError, CapabilityOptions};
use async_trait::async_trait;
use std::fmt;
use std::path::Path;
use std::process::Stdio;
use std::str::FromStr;
use tokio::process::Command;

/// Program plus argument template
///
/// Arguments may contain `{input}`, `{output}`, `{output_dir}`,
/// `{output_stem}` and `{<option>}` placeholders. A template without
/// `{input}` gets the input and output paths appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>, args: &[&str]) -> Self {
        Self {
            program: program.into(),
            args: args.iter().map(|arg| arg.to_string()).collect(),
        }
    }

    fn expand(&self, input: &Path, output: &Path, options: &CapabilityOptions) -> Vec<String> {
        let output_dir = output.parent().unwrap_or_else(|| Path::new("."));
        let output_stem = output.with_extension("");
        let mut values: Vec<(String, String)> = vec![
            ("{input}".into(), input.display().to_string()),
            ("{output}".into(), output.display().to_string()),
            ("{output_dir}".into(), output_dir.display().to_string()),
            ("{output_stem}".into(), output_stem.display().to_string()),
        ];
        values.extend(
            options
                .iter()
                .map(|(key, value)| (format!("{{{}}}", key), value.clone())),
        );

        let mut args: Vec<String> = self
            .args
            .iter()
            .map(|arg| {
                values
                    .iter()
                    .fold(arg.clone(), |acc, (key, value)| acc.replace(key, value))
            })
            .collect();

        if !self.args.iter().any(|arg| arg.contains("{input}")) {
            args.push(input.display().to_string());
            args.push(output.display().to_string());
        }
        args
    }
}

impl FromStr for CommandSpec {
    type Err = String;

    /// Whitespace-separated `program arg arg...`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut parts = s.split_whitespace().map(str::to_string);
        let program = parts
            .next()
            .ok_or_else(|| "converter command must not be empty".to_string())?;
        Ok(Self {
            program,
            args: parts.collect(),
        })
    }
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {}", arg)?;
        }
        Ok(())
    }
}

/// Runs a converter as a child process. The child is killed if the
/// invocation future is dropped (e.g. on timeout).
pub struct CommandCapability {
    spec: CommandSpec,
}

impl CommandCapability {
    pub fn new(spec: CommandSpec) -> Self {
        Self { spec }
    }
}

#[async_trait]
impl Capability for CommandCapability {
    async fn invoke(
        &self,
        input: &Path,
        output: &Path,
        options: &CapabilityOptions,
    ) -> Result<(), CapabilityError> {
        let args = self.spec.expand(input, output, options);
        tracing::debug!("Running {} {:?}", self.spec.program, args);

        let result = Command::new(&self.spec.program)
            .args(&args)
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CapabilityError::Unavailable(format!(
                    "{} is not installed",
                    self.spec.program
                )))
            }
            Err(e) => {
                return Err(CapabilityError::Failed(format!(
                    "failed to start {}: {}",
                    self.spec.program, e
                )))
            }
        };

        if output.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        tracing::warn!(
            "{} exited with {}: {}",
            self.spec.program,
            output.status,
            stderr
        );
        Err(CapabilityError::Failed(if stderr.is_empty() {
            format!("{} exited with {}", self.spec.program, output.status)
        } else {
            stderr
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_placeholders_expand() {
        let spec: CommandSpec = "pdftoppm -jpeg {input} {output}/{base_name}_page"
            .parse()
            .unwrap();
        let mut options = CapabilityOptions::new();
        options.insert("base_name".into(), "report".into());

        let args = spec.expand(Path::new("/in/a.pdf"), Path::new("/out/job"), &options);
        assert_eq!(args, vec!["-jpeg", "/in/a.pdf", "/out/job/report_page"]);
    }

    #[test]
    fn test_output_stem_strips_extension() {
        let spec = CommandSpec::new("pdftoppm", &["{input}", "{output_stem}", "{output_dir}"]);
        let args = spec.expand(
            Path::new("a.pdf"),
            Path::new("/out/thumb.jpg"),
            &CapabilityOptions::new(),
        );
        assert_eq!(args, vec!["a.pdf", "/out/thumb", "/out"]);
    }

    #[test]
    fn test_paths_appended_without_input_placeholder() {
        let spec: CommandSpec = "convert-tool --headless".parse().unwrap();
        let args = spec.expand(
            Path::new("in.docx"),
            Path::new("out.pdf"),
            &CapabilityOptions::new(),
        );
        assert_eq!(args, vec!["--headless", "in.docx", "out.pdf"]);
    }

    #[test]
    fn test_empty_command_rejected() {
        assert!("   ".parse::<CommandSpec>().is_err());
    }

    #[tokio::test]
    async fn test_missing_program_is_unavailable() {
        let capability = CommandCapability::new(CommandSpec::new("definitely-not-a-converter-xyz", &[]));
        let result = capability
            .invoke(Path::new("a"), Path::new("b"), &CapabilityOptions::new())
            .await;
        assert!(matches!(result, Err(CapabilityError::Unavailable(_))));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_successful_command_writes_output() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.txt");
        let output = dir.path().join("out.txt");
        std::fs::write(&input, b"payload").unwrap();

        let capability =
            CommandCapability::new(CommandSpec::new("cp", &["{input}", "{output}"]));
        capability
            .invoke(&input, &output, &CapabilityOptions::new())
            .await
            .unwrap();
        assert_eq!(std::fs::read(&output).unwrap(), b"payload");
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_nonzero_exit_reports_stderr() {
        let capability = CommandCapability::new(CommandSpec::new(
            "sh",
            &["-c", "echo broken document >&2; exit 3", "{input}"],
        ));
        let err = capability
            .invoke(Path::new("a"), Path::new("b"), &CapabilityOptions::new())
            .await
            .unwrap_err();
        match err {
            CapabilityError::Failed(cause) => assert_eq!(cause, "broken document"),
            other => panic!("unexpected error: {:?}", other),
        }
    }
}
