use std::sync::mpsc::Sender;

use crate::error::EngineError;

/// Boundary to the external transcoding engine.
///
/// The engine owns a private scratch namespace: inputs are written into it
/// by name, `execute` runs against those names, and outputs are read back
/// out. `execute` reports fractional progress in [0, 1] over the given
/// channel, with no ordering guarantee, and returns the process exit code;
/// judging that code is the caller's business.
pub trait TranscodeEngine: Send + Sync {
    /// Idempotent. Must complete before the pipeline may run.
    fn load(&self) -> Result<(), EngineError>;

    fn is_loaded(&self) -> bool;

    fn write_input(&self, name: &str, bytes: &[u8]) -> Result<(), EngineError>;

    fn execute(&self, args: Vec<String>, progress: Option<Sender<f64>>)
        -> Result<i32, EngineError>;

    fn read_output(&self, name: &str) -> Result<Vec<u8>, EngineError>;

    fn delete(&self, name: &str) -> Result<(), EngineError>;
}
