use std::fs;
use std::io::{BufRead, BufReader, Read};
use std::path::{Path, PathBuf};
use std::process::{ChildStderr, Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::Sender;

use tracing::{debug, warn};

use crate::engine::TranscodeEngine;
use crate::error::EngineError;
use crate::probe::probe_total_frames;

/// Subprocess-backed engine. Inputs and outputs live in a private scratch
/// directory; one transcode runs at a time by construction of the pipeline.
pub struct FFmpegEngine {
    workdir: PathBuf,
    loaded: AtomicBool,
}

impl FFmpegEngine {
    pub fn new(workdir: PathBuf) -> Self {
        FFmpegEngine {
            workdir,
            loaded: AtomicBool::new(false),
        }
    }

    pub fn is_installed() -> bool {
        let cmd = Command::new("ffmpeg")
            .arg("-codecs")
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status();
        match cmd {
            Ok(status) => status.success(),
            Err(_) => false,
        }
    }

    fn scratch_path(&self, name: &str) -> PathBuf {
        self.workdir.join(name)
    }
}

impl TranscodeEngine for FFmpegEngine {
    fn load(&self) -> Result<(), EngineError> {
        if self.is_loaded() {
            return Ok(());
        }
        if !FFmpegEngine::is_installed() {
            return Err(EngineError::NotInstalled);
        }
        fs::create_dir_all(&self.workdir)?;
        self.loaded.store(true, Ordering::SeqCst);
        debug!(workdir = %self.workdir.display(), "engine loaded");
        Ok(())
    }

    fn is_loaded(&self) -> bool {
        self.loaded.load(Ordering::SeqCst)
    }

    fn write_input(&self, name: &str, bytes: &[u8]) -> Result<(), EngineError> {
        fs::create_dir_all(&self.workdir)?;
        fs::write(self.scratch_path(name), bytes)?;
        Ok(())
    }

    fn execute(&self, args: Vec<String>, progress: Option<Sender<f64>>)
        -> Result<i32, EngineError>
    {
        if !self.is_loaded() {
            return Err(EngineError::NotLoaded);
        }

        let total_frames = match input_name(&args) {
            Some(name) => total_frames_or_one(&self.scratch_path(name)),
            None => 1,
        };

        debug!("ffmpeg {}", args.join(" "));
        let mut child = Command::new("ffmpeg")
            .args([
                "-hide_banner", "-nostats",
                "-loglevel", "warning",
                "-progress", "pipe:1",
            ])
            .args(&args)
            .current_dir(&self.workdir)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()?;

        if let Some(stdout) = child.stdout.take() {
            forward_progress(BufReader::new(stdout), total_frames, progress);
        }

        let status = child.wait()?;
        let code = status.code().unwrap_or(-1);
        if code != 0 {
            if let Some(stderr) = read_stderr_to_end(&mut child.stderr.take()) {
                warn!(code, "ffmpeg failed: {}", stderr.trim());
            }
        }
        Ok(code)
    }

    fn read_output(&self, name: &str) -> Result<Vec<u8>, EngineError> {
        Ok(fs::read(self.scratch_path(name))?)
    }

    fn delete(&self, name: &str) -> Result<(), EngineError> {
        fs::remove_file(self.scratch_path(name))?;
        Ok(())
    }
}

/// The value following "-i", the engine's input scratch name.
fn input_name(args: &[String]) -> Option<&str> {
    args.windows(2)
        .find(|pair| pair[0] == "-i")
        .map(|pair| pair[1].as_str())
}

fn total_frames_or_one(path: &Path) -> usize {
    match probe_total_frames(path) {
        Ok(frames) => frames.max(1),
        Err(_) => 1,
    }
}

/// Parses the key=value stream emitted by `-progress pipe:1` and publishes
/// a fraction per progress record.
fn forward_progress<R: BufRead>(reader: R, total_frames: usize, progress_tx: Option<Sender<f64>>) {
    let mut frame: usize = 0;
    for line in reader.lines() {
        let Ok(line) = line else { break };
        let parts: Vec<&str> = line.split('=').collect();
        if parts.len() != 2 {
            continue;
        }
        match parts[0] {
            "frame" => frame = parts[1].trim().parse().unwrap_or(frame),
            "progress" => {
                if let Some(tx) = &progress_tx {
                    let fraction = f64::min(1.0, (frame as f64) / (total_frames as f64));
                    let _ = tx.send(fraction);
                }
            },
            _ => {},
        }
    }
}

fn read_stderr_to_end(stderr: &mut Option<ChildStderr>) -> Option<String> {
    let mut buf = Vec::new();
    match stderr {
        Some(stream) => match BufReader::new(stream).read_to_end(&mut buf) {
            Ok(_) => Some(String::from_utf8_lossy(&buf).into_owned()),
            Err(_) => None,
        },
        None => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::sync::mpsc;

    #[test]
    fn test_input_name() {
        let args: Vec<String> = ["-y", "-i", "input_1.mp4", "-c:v", "libx264", "out.mp4"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(input_name(&args), Some("input_1.mp4"));
        assert_eq!(input_name(&args[3..]), None);
    }

    #[test]
    fn test_forward_progress_fractions() {
        let stdout = "fps=30.0\nframe=50\nprogress=continue\nframe=100\nprogress=end\n";
        let (tx, rx) = mpsc::channel();
        forward_progress(Cursor::new(stdout), 100, Some(tx));
        let fractions: Vec<f64> = rx.iter().collect();
        assert_eq!(fractions, vec![0.5, 1.0]);
    }

    #[test]
    fn test_forward_progress_caps_at_one() {
        let stdout = "frame=250\nprogress=end\n";
        let (tx, rx) = mpsc::channel();
        forward_progress(Cursor::new(stdout), 100, Some(tx));
        assert_eq!(rx.iter().collect::<Vec<f64>>(), vec![1.0]);
    }

    #[test]
    fn test_scratch_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FFmpegEngine::new(dir.path().join("scratch"));
        engine.write_input("input_a.mp4", b"bytes").unwrap();
        assert_eq!(engine.read_output("input_a.mp4").unwrap(), b"bytes");
        engine.delete("input_a.mp4").unwrap();
        assert!(engine.read_output("input_a.mp4").is_err());
    }

    #[test]
    fn test_execute_requires_load() {
        let dir = tempfile::tempdir().unwrap();
        let engine = FFmpegEngine::new(dir.path().to_path_buf());
        let result = engine.execute(vec![String::from("-version")], None);
        assert!(matches!(result, Err(EngineError::NotLoaded)));
    }
}
