use std::path::Path;
use std::process::Command;

use serde::Deserialize;

use crate::error::ProbeError;

#[derive(Deserialize, Debug)]
struct FFProbeJsonOutput {
    streams: Vec<FFProbeJsonStream>,
}

#[derive(Deserialize, Debug)]
struct FFProbeJsonStream {
    nb_read_packets: Option<String>,
}

/// Total frame count of the first video stream, used to turn the engine's
/// frame counter into a progress fraction.
pub fn probe_total_frames(path: &Path) -> Result<usize, ProbeError> {
    let output = Command::new("ffprobe")
        .args([
            "-of", "json",
            "-show_streams",
            "-select_streams", "v:0",
            "-count_packets",
        ])
        .arg(path)
        .output()?;
    if !output.status.success() {
        return Err(ProbeError::Failed);
    }
    parse_total_frames(&output.stdout)
}

fn parse_total_frames(json: &[u8]) -> Result<usize, ProbeError> {
    let deserialized: FFProbeJsonOutput = serde_json::from_slice(json)?;
    let stream = deserialized.streams.first().ok_or(ProbeError::NoVideoStream)?;
    Ok(match &stream.nb_read_packets {
        Some(count) => count.parse().unwrap_or(1),
        None => 1,
    })
}
