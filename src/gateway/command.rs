//! Local command gateway.
//!
//! Invokes a user-configured command with the prompt on stdin and takes
//! stdout as the completion. Any tool that reads text and writes text works
//! (`llm`, `ollama run <model>`, a wrapper script). The requested model and
//! temperature are exported to the child as `FORMDOC_MODEL` and
//! `FORMDOC_TEMPERATURE`.
//!
//! The child is killed when it outlives the configured timeout.
use super::{CompletionRequest, TextGenerator};
use crate::error::{FormError, Result};
use std::io::{Read, Write};
use std::process::{Command, Output, Stdio};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

#[derive(Debug, Clone)]
pub struct CommandGateway {
    command: String,
    timeout: Duration,
}

impl CommandGateway {
    /// Validate `command` (shell-words syntax) and resolve its program on PATH.
    pub fn new(command: impl Into<String>, timeout: Duration) -> Result<Self> {
        let command = command.into();
        let args = split_command(&command)?;
        which::which(&args[0]).map_err(|err| {
            FormError::Config(format!("LM command {:?} not found: {err}", args[0]))
        })?;
        Ok(Self { command, timeout })
    }

    pub fn command(&self) -> &str {
        &self.command
    }
}

impl TextGenerator for CommandGateway {
    fn name(&self) -> &str {
        "command"
    }

    fn complete(&self, request: &CompletionRequest) -> Result<String> {
        let args = split_command(&self.command)?;
        let prompt = request.prompt_text();
        let start = Instant::now();

        let mut child = Command::new(&args[0])
            .args(&args[1..])
            .env("FORMDOC_MODEL", &request.model)
            .env("FORMDOC_TEMPERATURE", request.temperature.to_string())
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|err| FormError::Gateway(format!("spawn LM command {}: {err}", args[0])))?;

        if let Some(mut stdin) = child.stdin.take() {
            thread::spawn(move || {
                // A child that exits without reading its input is not an error here.
                let _ = stdin.write_all(prompt.as_bytes());
            });
        }
        let stdout = child.stdout.take().map(drain);
        let stderr = child.stderr.take().map(drain);

        let waited = child
            .wait_timeout(self.timeout)
            .map_err(|err| FormError::Gateway(format!("wait for LM command: {err}")))?;
        let Some(status) = waited else {
            if let Err(err) = child.kill() {
                tracing::warn!(%err, "failed to kill timed out LM command");
            }
            let _ = child.wait();
            return Err(FormError::Gateway(format!(
                "LM command timed out after {}s",
                self.timeout.as_secs()
            )));
        };
        let output = Output {
            status,
            stdout: collect(stdout),
            stderr: collect(stderr),
        };

        tracing::debug!(
            elapsed_ms = start.elapsed().as_millis() as u64,
            response_bytes = output.stdout.len(),
            "lm command finished"
        );
        decode_output(output)
    }
}

fn split_command(command: &str) -> Result<Vec<String>> {
    let args = shell_words::split(command)
        .map_err(|err| FormError::Config(format!("parse LM command {command:?}: {err}")))?;
    if args.is_empty() {
        return Err(FormError::Config("LM command is empty".to_string()));
    }
    Ok(args)
}

fn decode_output(output: Output) -> Result<String> {
    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(FormError::Gateway(format!(
            "LM command failed with status {}: {}",
            output.status,
            stderr.trim()
        )));
    }
    String::from_utf8(output.stdout)
        .map_err(|err| FormError::Gateway(format!("decode LM stdout as UTF-8: {err}")))
}

fn drain<R: Read + Send + 'static>(mut pipe: R) -> JoinHandle<Vec<u8>> {
    thread::spawn(move || {
        let mut bytes = Vec::new();
        let _ = pipe.read_to_end(&mut bytes);
        bytes
    })
}

fn collect(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

#[cfg(all(test, unix))]
mod tests {
    use super::*;

    fn request(prompt: &str) -> CompletionRequest {
        CompletionRequest::user("test-model", prompt, 0.3)
    }

    #[test]
    fn reply_is_stdout_of_the_command() {
        let gateway =
            CommandGateway::new("sh -c 'cat >/dev/null; echo Good.'", Duration::from_secs(10))
                .expect("gateway");
        assert_eq!(gateway.complete(&request("ignored")).unwrap(), "Good.\n");
    }

    #[test]
    fn prompt_is_piped_to_stdin_and_settings_are_exported() {
        let gateway = CommandGateway::new(
            "sh -c 'cat; printf \" %s %s\" \"$FORMDOC_MODEL\" \"$FORMDOC_TEMPERATURE\"'",
            Duration::from_secs(10),
        )
        .expect("gateway");
        let reply = gateway.complete(&request("hello")).unwrap();
        assert_eq!(reply, "hello test-model 0.3");
    }

    #[test]
    fn failing_command_is_a_gateway_error() {
        let gateway =
            CommandGateway::new("sh -c 'echo boom >&2; exit 3'", Duration::from_secs(10))
                .expect("gateway");
        let err = gateway.complete(&request("x")).unwrap_err();
        match err {
            FormError::Gateway(detail) => assert!(detail.contains("boom"), "{detail}"),
            other => panic!("unexpected error {other:?}"),
        }
    }

    #[test]
    fn slow_command_times_out() {
        let gateway =
            CommandGateway::new("sh -c 'sleep 5'", Duration::from_millis(200)).expect("gateway");
        let start = Instant::now();
        let err = gateway.complete(&request("x")).unwrap_err();
        assert!(matches!(err, FormError::Gateway(_)));
        assert!(start.elapsed() < Duration::from_secs(4));
    }

    #[test]
    fn timed_out_command_is_killed() {
        let dir = tempfile::tempdir().expect("temp dir");
        let pid_file = dir.path().join("pid");
        let command = format!("sh -c 'echo $$ > {}; exec sleep 5'", pid_file.display());
        let gateway = CommandGateway::new(&command, Duration::from_millis(300)).expect("gateway");
        assert!(gateway.complete(&request("x")).is_err());

        let pid = std::fs::read_to_string(&pid_file).expect("pid written");
        let alive = Command::new("sh")
            .args(["-c", &format!("kill -0 {} 2>/dev/null", pid.trim())])
            .status()
            .expect("run kill");
        assert!(!alive.success(), "child {} still running", pid.trim());
    }

    #[test]
    fn unknown_program_is_a_config_error() {
        let err = CommandGateway::new("formdoc-no-such-binary --flag", Duration::from_secs(1))
            .unwrap_err();
        assert!(matches!(err, FormError::Config(_)));
        assert!(matches!(
            CommandGateway::new("   ", Duration::from_secs(1)),
            Err(FormError::Config(_))
        ));
    }
}
