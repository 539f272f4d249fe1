use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use human_repr::HumanCount;
use kdam::{term, tqdm, Bar, BarExt};
use rustop::opts;
use serde::Serialize;

use vidqueue::engine::TranscodeEngine;
use vidqueue::ffmpeg::FFmpegEngine;
use vidqueue::formats::OutputFormat;
use vidqueue::notify::{Notice, Notifier};
use vidqueue::pipeline::{Pipeline, PipelineEvent};
use vidqueue::presets::CompressionPreset;
use vidqueue::settings::{Mode, Settings, SettingsController};
use vidqueue::store::TaskStore;
use vidqueue::task::{SourceFile, Task, TaskStatus};

#[derive(Serialize)]
struct TaskReport {
    source: String,
    status: String,
    format: String,
    preset: String,
    output: Option<String>,
    output_size: Option<usize>,
    error: Option<String>,
}

fn main() -> ExitCode {
    let (args, _rest) = opts! {
        synopsis "Convert or compress a batch of video files";
        opt mode:String=String::from("convert"), desc:"Processing mode. [convert, compress]";
        opt format:String=String::from("mp4"), desc:"Target container in convert mode. [mp4, webm, mov, avi, mkv]";
        opt compression:String=String::from("none"), desc:"Compression preset. [none, light, medium, heavy]";
        opt out_dir:String=String::from("."), desc:"Directory for converted outputs.";
        opt work_dir:Option<String>, desc:"Scratch directory for the engine.";
        opt json:bool=false, desc:"Print the final task report as JSON.";
        param infiles:Vec<String>, desc:"Input video files";
    }.parse_or_exit();

    init_logging();

    // closed enums; reject unknown values before anything runs
    let Some(mode) = Mode::parse(&args.mode) else {
        eprintln!("Unsupported mode: {}.", args.mode);
        return ExitCode::FAILURE;
    };
    let Some(format) = OutputFormat::parse(&args.format) else {
        eprintln!("Unsupported format: {}.", args.format);
        return ExitCode::FAILURE;
    };
    let Some(preset) = CompressionPreset::parse(&args.compression) else {
        eprintln!("Unsupported compression preset: {}.", args.compression);
        return ExitCode::FAILURE;
    };

    let work_dir = args
        .work_dir
        .map(PathBuf::from)
        .unwrap_or_else(|| std::env::temp_dir().join("vidqueue"));
    let engine: Arc<dyn TranscodeEngine> = Arc::new(FFmpegEngine::new(work_dir));
    if let Err(err) = engine.load() {
        eprintln!("{}.", err);
        return ExitCode::FAILURE;
    }

    let store = TaskStore::new();
    let notifier = Notifier::new();
    let controller = SettingsController::with_settings(
        store.clone(),
        notifier.clone(),
        Settings { mode, format, preset },
    );

    let notice_printer = spawn_notice_printer(&notifier);

    let mut files = vec![];
    for path in &args.infiles {
        match fs::read(path) {
            Ok(bytes) => files.push(SourceFile::new(basename(path), bytes)),
            Err(err) => eprintln!("Skipping {}: {}.", path, err),
        }
    }
    if files.is_empty() {
        eprintln!("No readable input files.");
        return ExitCode::FAILURE;
    }
    controller.submit(files);

    // an interrupt removes whatever has not started yet; the in-flight
    // task runs to completion
    let interrupted = Arc::new(AtomicBool::new(false));
    let _ = signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&interrupted));
    {
        let store = store.clone();
        let interrupted = Arc::clone(&interrupted);
        thread::spawn(move || {
            loop {
                if interrupted.load(Ordering::Relaxed) {
                    for task in store.snapshot() {
                        if task.status == TaskStatus::Queued {
                            store.remove(&task.id);
                        }
                    }
                    break;
                }
                thread::sleep(Duration::from_millis(100));
            }
        });
    }

    let pipeline = Pipeline::new(
        store.clone(),
        controller.settings_handle(),
        notifier.clone(),
        engine,
    );
    let progress_renderer = spawn_progress_renderer(&pipeline, &store);

    let run_result = pipeline.run();
    drop(pipeline);
    let _ = progress_renderer.join();
    drop(controller);
    drop(notifier);
    let _ = notice_printer.join();

    if let Err(err) = run_result {
        eprintln!("{}.", err);
        return ExitCode::FAILURE;
    }

    if interrupted.load(Ordering::Relaxed) {
        eprintln!("Interrupted; queued tasks were dropped.");
    }

    deliver_outputs(&store, Path::new(&args.out_dir), args.json)
}

fn init_logging() {
    use tracing_subscriber::EnvFilter;
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .try_init();
}

fn basename(path: &str) -> String {
    match Path::new(path).file_name() {
        Some(name) => name.to_string_lossy().into_owned(),
        None => String::from(path),
    }
}

fn spawn_notice_printer(notifier: &Notifier) -> thread::JoinHandle<()> {
    let notices = notifier.subscribe();
    thread::spawn(move || {
        for notice in notices {
            match notice {
                Notice::FilesAdded(count) => {
                    eprintln!("Added {} file{}.", count, if count > 1 { "s" } else { "" });
                },
                Notice::LargeFile { name, size } => {
                    eprintln!(
                        "\"{}\" is larger than 500MB ({}); processing may be slow.",
                        name,
                        size.human_count_bytes()
                    );
                },
                Notice::SlowFormat(format) => {
                    eprintln!("{} encoding can be significantly slower than other formats.", format);
                },
                Notice::TaskFailed { name, message } => {
                    eprintln!("Failed to convert {}: {}.", name, message);
                },
            }
        }
    })
}

fn spawn_progress_renderer(pipeline: &Pipeline, store: &TaskStore) -> thread::JoinHandle<()> {
    let events = pipeline.subscribe();
    let store = store.clone();
    thread::spawn(move || {
        term::init(false);
        let mut pbar: Option<Bar> = None;
        for event in events {
            match event {
                PipelineEvent::TaskStarted(id) => {
                    let desc = match store.get(&id) {
                        Some(task) => format!(
                            "{} ({})",
                            task.source.name,
                            task.source.size().human_count_bytes()
                        ),
                        None => String::new(),
                    };
                    pbar = Some(tqdm!(
                        total = 100,
                        desc = desc,
                        position = 0,
                        force_refresh = true
                    ));
                },
                PipelineEvent::TaskProgress(_, pct) => {
                    if let Some(bar) = &mut pbar {
                        let _ = bar.update_to(pct as usize);
                    }
                },
                PipelineEvent::TaskDone(_) | PipelineEvent::TaskFailed(..) => {
                    if let Some(mut bar) = pbar.take() {
                        let _ = bar.clear();
                    }
                },
                PipelineEvent::RunCompleted => break,
            }
        }
    })
}

fn deliver_outputs(store: &TaskStore, out_dir: &Path, json: bool) -> ExitCode {
    if let Err(err) = fs::create_dir_all(out_dir) {
        eprintln!("Unable to create {:?}: {}.", out_dir, err);
        return ExitCode::FAILURE;
    }

    let tasks = store.snapshot();
    let mut failed = false;
    for task in &tasks {
        match task.status {
            TaskStatus::Done => {
                let name = task.download_name();
                let bytes = task
                    .output_handle
                    .and_then(|handle| store.handles().resolve(&handle));
                match bytes {
                    Some(bytes) => match fs::write(out_dir.join(&name), bytes.as_slice()) {
                        Ok(()) => println!(
                            "{} -> {} ({})",
                            task.source.name,
                            name,
                            task.output_size.unwrap_or(0).human_count_bytes()
                        ),
                        Err(err) => {
                            failed = true;
                            eprintln!("Unable to write {}: {}.", name, err);
                        },
                    },
                    None => {
                        failed = true;
                        eprintln!("No output available for {}.", task.source.name);
                    },
                }
            },
            TaskStatus::Error => {
                failed = true;
                println!(
                    "{}: {}",
                    task.source.name,
                    task.error.as_deref().unwrap_or("unknown error")
                );
            },
            TaskStatus::Queued | TaskStatus::Processing => {},
        }
    }

    if json {
        match serde_json::to_string_pretty(&reports(&tasks)) {
            Ok(report) => println!("{}", report),
            Err(err) => eprintln!("Unable to serialize report: {}.", err),
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}

fn reports(tasks: &[Task]) -> Vec<TaskReport> {
    tasks
        .iter()
        .map(|task| TaskReport {
            source: task.source.name.clone(),
            status: task.status.to_string(),
            format: task.format.to_string(),
            preset: task.preset.to_string(),
            output: match task.status {
                TaskStatus::Done => Some(task.download_name()),
                _ => None,
            },
            output_size: task.output_size,
            error: task.error.clone(),
        })
        .collect()
}
