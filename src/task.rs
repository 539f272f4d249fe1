use std::fmt::Display;
use std::sync::Arc;

use uuid::Uuid;

use crate::formats::OutputFormat;
use crate::handles::HandleId;
use crate::presets::CompressionPreset;

pub type TaskId = Uuid;

/// A submitted input file. Name and bytes are immutable after creation.
#[derive(Clone, Debug)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Arc<Vec<u8>>,
}

impl SourceFile {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        SourceFile {
            name: name.into(),
            bytes: Arc::new(bytes),
        }
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Extension the engine uses to sniff the input container.
    pub fn extension(&self) -> &str {
        match self.name.rsplit_once('.') {
            Some((_, ext)) if !ext.is_empty() => ext,
            _ => "mp4",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TaskStatus {
    Queued,
    Processing,
    Done,
    Error,
}

impl Display for TaskStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            TaskStatus::Queued => "queued",
            TaskStatus::Processing => "processing",
            TaskStatus::Done => "done",
            TaskStatus::Error => "error",
        };
        write!(f, "{}", s)
    }
}

/// One file submitted for processing plus all its derived state.
#[derive(Clone, Debug)]
pub struct Task {
    pub id: TaskId,
    pub source: SourceFile,
    pub status: TaskStatus,
    pub progress: u8,
    pub format: OutputFormat,
    pub preset: CompressionPreset,
    pub output_bytes: Option<Arc<Vec<u8>>>,
    pub output_size: Option<usize>,
    pub output_handle: Option<HandleId>,
    pub error: Option<String>,
}

impl Task {
    pub fn new(source: SourceFile, format: OutputFormat, preset: CompressionPreset) -> Self {
        Task {
            id: Uuid::new_v4(),
            source,
            status: TaskStatus::Queued,
            progress: 0,
            format,
            preset,
            output_bytes: None,
            output_size: None,
            output_handle: None,
            error: None,
        }
    }

    /// Target format is only mutable while the task still waits in the queue.
    pub fn set_format(&mut self, format: OutputFormat) {
        if self.status == TaskStatus::Queued {
            self.format = format;
        }
    }

    pub fn set_preset(&mut self, preset: CompressionPreset) {
        if self.status == TaskStatus::Queued {
            self.preset = preset;
        }
    }

    pub fn start(&mut self) {
        self.status = TaskStatus::Processing;
        self.progress = 0;
    }

    pub fn set_progress(&mut self, pct: u8) {
        if self.status == TaskStatus::Processing {
            self.progress = pct.min(100);
        }
    }

    pub fn complete(&mut self, bytes: Arc<Vec<u8>>, handle: HandleId) {
        self.status = TaskStatus::Done;
        self.progress = 100;
        self.output_size = Some(bytes.len());
        self.output_bytes = Some(bytes);
        self.output_handle = Some(handle);
        self.error = None;
    }

    pub fn fail(&mut self, message: impl Into<String>) {
        self.status = TaskStatus::Error;
        self.output_bytes = None;
        self.output_size = None;
        self.output_handle = None;
        self.error = Some(message.into());
    }

    /// Suggested filename for the delivered output: source basename with the
    /// original extension replaced by the target format's.
    pub fn download_name(&self) -> String {
        let stem = match self.source.name.rsplit_once('.') {
            Some((stem, _)) if !stem.is_empty() => stem,
            _ => self.source.name.as_str(),
        };
        format!("{}.{}", stem, self.format.extension())
    }
}
