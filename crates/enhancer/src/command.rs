//! Local command backend.
//!
//! Runs `<program> <args...> <input.wav> <output.wav>` inside the request's
//! scratch directory. The child is killed if the enhancement future is
//! dropped (for example when the caller's timeout fires).

use std::path::PathBuf;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::process::Command;

use crate::buffer::{decode_mono_wav, encode_wav, AudioBuffer};
use crate::error::EnhanceError;
use crate::{EnhanceRequest, Enhancer};

const INPUT_FILE: &str = "input.wav";
const OUTPUT_FILE: &str = "output.wav";

/// Only the tail of stderr is kept in error messages.
const MAX_STDERR_CHARS: usize = 2_000;

/// Enhancer that shells out to a local model runner.
pub struct CommandEnhancer {
    program: PathBuf,
    args: Vec<String>,
}

impl CommandEnhancer {
    pub fn new(program: impl Into<PathBuf>, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }
}

#[async_trait]
impl Enhancer for CommandEnhancer {
    fn name(&self) -> &'static str {
        "command"
    }

    async fn enhance(&self, request: EnhanceRequest<'_>) -> Result<AudioBuffer, EnhanceError> {
        let input_path = request.scratch_dir.join(INPUT_FILE);
        let output_path = request.scratch_dir.join(OUTPUT_FILE);

        tokio::fs::write(&input_path, encode_wav(&request.audio)?).await?;

        let output = Command::new(&self.program)
            .args(&self.args)
            .arg(&input_path)
            .arg(&output_path)
            .current_dir(request.scratch_dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = tail(stderr.trim(), MAX_STDERR_CHARS);
            let code = output
                .status
                .code()
                .map_or_else(|| "signal".to_string(), |c| c.to_string());
            return Err(EnhanceError::Process(if stderr.is_empty() {
                format!("exit status {code}")
            } else {
                format!("exit status {code}: {stderr}")
            }));
        }

        let bytes = match tokio::fs::read(&output_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(EnhanceError::MalformedOutput(format!(
                    "command did not write {OUTPUT_FILE}"
                )));
            }
            Err(e) => return Err(e.into()),
        };
        decode_mono_wav(&bytes)
    }

    async fn health(&self) -> Result<(), EnhanceError> {
        match tokio::fs::metadata(&self.program).await {
            Ok(_) => Ok(()),
            // Bare program names are resolved through PATH at spawn time.
            Err(_) if self.program.components().count() == 1 => Ok(()),
            Err(e) => Err(EnhanceError::Process(format!(
                "{}: {e}",
                self.program.display()
            ))),
        }
    }
}

fn tail(s: &str, max_chars: usize) -> &str {
    let count = s.chars().count();
    if count <= max_chars {
        return s;
    }
    let skip = count - max_chars;
    let start = s.char_indices().nth(skip).map_or(0, |(i, _)| i);
    &s[start..]
}
