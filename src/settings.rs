use std::fmt::Display;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::formats::OutputFormat;
use crate::notify::{Notice, Notifier};
use crate::presets::CompressionPreset;
use crate::store::TaskStore;
use crate::task::{SourceFile, Task, TaskId, TaskStatus};

/// Files above this size get a warning notice on submission.
pub const LARGE_FILE_THRESHOLD: usize = 500 * 1024 * 1024;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    Convert,
    Compress,
}

impl Mode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "convert" => Some(Mode::Convert),
            "compress" => Some(Mode::Compress),
            _ => None,
        }
    }
}

impl Display for Mode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Mode::Convert => "convert",
            Mode::Compress => "compress",
        };
        write!(f, "{}", s)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Settings {
    pub mode: Mode,
    pub format: OutputFormat,
    pub preset: CompressionPreset,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            mode: Mode::Convert,
            format: OutputFormat::Mp4,
            preset: CompressionPreset::None,
        }
    }
}

/// Governs global defaults and reconciles them into every still-queued task
/// when they change. Tasks that already started, finished, or failed are
/// never touched.
#[derive(Clone)]
pub struct SettingsController {
    settings: Arc<Mutex<Settings>>,
    store: TaskStore,
    notifier: Notifier,
}

impl SettingsController {
    pub fn new(store: TaskStore, notifier: Notifier) -> Self {
        SettingsController::with_settings(store, notifier, Settings::default())
    }

    pub fn with_settings(store: TaskStore, notifier: Notifier, settings: Settings) -> Self {
        SettingsController {
            settings: Arc::new(Mutex::new(settings)),
            store,
            notifier,
        }
    }

    pub fn settings(&self) -> Settings {
        *self.settings.lock().unwrap()
    }

    /// Shared view for collaborators that read settings at their own pace.
    pub fn settings_handle(&self) -> Arc<Mutex<Settings>> {
        Arc::clone(&self.settings)
    }

    pub fn set_mode(&self, mode: Mode) {
        debug!(%mode, "mode change");
        self.settings.lock().unwrap().mode = mode;
        match mode {
            Mode::Compress => {
                // compression mode must never run with no compression
                let promoted = {
                    let mut settings = self.settings.lock().unwrap();
                    if settings.preset == CompressionPreset::None {
                        settings.preset = CompressionPreset::Medium;
                        true
                    } else {
                        false
                    }
                };
                if promoted {
                    self.store.update_where(
                        |t| t.status == TaskStatus::Queued,
                        |t| t.set_preset(CompressionPreset::Medium),
                    );
                }
                // compress mode preserves each file's native container
                self.store.update_where(
                    |t| t.status == TaskStatus::Queued,
                    |t| {
                        let format = OutputFormat::from_filename(&t.source.name);
                        t.set_format(format);
                    },
                );
            },
            Mode::Convert => {
                let format = self.settings().format;
                self.store.update_where(
                    |t| t.status == TaskStatus::Queued,
                    |t| t.set_format(format),
                );
            },
        }
    }

    pub fn set_format(&self, format: OutputFormat) {
        self.settings.lock().unwrap().format = format;
        self.store.update_where(
            |t| t.status == TaskStatus::Queued,
            |t| t.set_format(format),
        );
    }

    pub fn set_compression(&self, preset: CompressionPreset) {
        self.settings.lock().unwrap().preset = preset;
        self.store.update_where(
            |t| t.status == TaskStatus::Queued,
            |t| t.set_preset(preset),
        );
    }

    /// Submission interface: each file becomes one queued task. The target
    /// format follows the current mode's rule, the preset the global value.
    pub fn submit(&self, files: Vec<SourceFile>) -> Vec<TaskId> {
        let settings = self.settings();
        let mut tasks = Vec::with_capacity(files.len());
        for file in files {
            if file.size() > LARGE_FILE_THRESHOLD {
                self.notifier.publish(Notice::LargeFile {
                    name: file.name.clone(),
                    size: file.size(),
                });
            }
            let format = match settings.mode {
                Mode::Compress => OutputFormat::from_filename(&file.name),
                Mode::Convert => settings.format,
            };
            tasks.push(Task::new(file, format, settings.preset));
        }
        let ids: Vec<TaskId> = tasks.iter().map(|t| t.id).collect();
        if !tasks.is_empty() {
            let count = tasks.len();
            self.store.append(tasks);
            self.notifier.publish(Notice::FilesAdded(count));
        }
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn controller() -> (SettingsController, TaskStore, Notifier) {
        let store = TaskStore::new();
        let notifier = Notifier::new();
        let controller = SettingsController::new(store.clone(), notifier.clone());
        (controller, store, notifier)
    }

    fn file(name: &str, size: usize) -> SourceFile {
        SourceFile::new(name, vec![0; size])
    }

    #[test]
    fn test_submit_in_convert_mode_uses_global_format() {
        let (controller, store, _) = controller();
        controller.set_format(OutputFormat::Mkv);
        let ids = controller.submit(vec![file("clip.mov", 16)]);
        let task = store.get(&ids[0]).unwrap();
        assert_eq!(task.status, TaskStatus::Queued);
        assert_eq!(task.format, OutputFormat::Mkv);
        assert_eq!(task.preset, CompressionPreset::None);
    }

    #[test]
    fn test_submit_in_compress_mode_derives_format_from_filename() {
        let (controller, store, _) = controller();
        controller.set_mode(Mode::Compress);
        let ids = controller.submit(vec![file("clip.mov", 16), file("clip.flv", 16)]);
        assert_eq!(store.get(&ids[0]).unwrap().format, OutputFormat::Mov);
        assert_eq!(store.get(&ids[1]).unwrap().format, OutputFormat::Mp4);
    }

    #[test]
    fn test_large_file_warning_threshold() {
        let (controller, _, notifier) = controller();
        let notices = notifier.subscribe();
        controller.submit(vec![
            file("small.mp4", 16),
            file("big.mp4", LARGE_FILE_THRESHOLD + 1),
        ]);
        let received: Vec<Notice> = notices.try_iter().collect();
        let large: Vec<&Notice> = received
            .iter()
            .filter(|n| matches!(n, Notice::LargeFile { .. }))
            .collect();
        assert_eq!(large.len(), 1);
        match large[0] {
            Notice::LargeFile { name, size } => {
                assert_eq!(name, "big.mp4");
                assert_eq!(*size, LARGE_FILE_THRESHOLD + 1);
            },
            _ => unreachable!(),
        }
        assert!(received.contains(&Notice::FilesAdded(2)));
    }

    #[test]
    fn test_compress_mode_promotes_preset_none_to_medium() {
        let (controller, store, _) = controller();
        let ids = controller.submit(vec![file("a.webm", 16), file("b.avi", 16)]);
        // freeze one task before the mode change
        store.update(&ids[1], |t| t.start());

        controller.set_mode(Mode::Compress);

        assert_eq!(controller.settings().preset, CompressionPreset::Medium);
        let a = store.get(&ids[0]).unwrap();
        assert_eq!(a.preset, CompressionPreset::Medium);
        assert_eq!(a.format, OutputFormat::Webm);
        // the processing task keeps both of its values
        let b = store.get(&ids[1]).unwrap();
        assert_eq!(b.preset, CompressionPreset::None);
        assert_eq!(b.format, OutputFormat::Mp4);
    }

    #[test]
    fn test_compress_mode_keeps_explicit_preset() {
        let (controller, _, _) = controller();
        controller.set_compression(CompressionPreset::Heavy);
        controller.set_mode(Mode::Compress);
        assert_eq!(controller.settings().preset, CompressionPreset::Heavy);
    }

    #[test]
    fn test_convert_mode_restores_global_format() {
        let (controller, store, _) = controller();
        controller.set_mode(Mode::Compress);
        let ids = controller.submit(vec![file("clip.mov", 16)]);
        assert_eq!(store.get(&ids[0]).unwrap().format, OutputFormat::Mov);

        controller.set_mode(Mode::Convert);
        assert_eq!(store.get(&ids[0]).unwrap().format, OutputFormat::Mp4);
    }

    #[test]
    fn test_format_change_reconciles_queued_only() {
        let (controller, store, _) = controller();
        let ids = controller.submit(vec![file("a.mp4", 16), file("b.mp4", 16)]);
        store.update(&ids[0], |t| {
            t.start();
            t.fail("boom");
        });

        controller.set_format(OutputFormat::Avi);

        assert_eq!(store.get(&ids[0]).unwrap().format, OutputFormat::Mp4);
        assert_eq!(store.get(&ids[1]).unwrap().format, OutputFormat::Avi);
    }
}
