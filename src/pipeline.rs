use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};
use std::thread;

use tracing::{debug, info};

use crate::engine::TranscodeEngine;
use crate::error::Error;
use crate::formats::OutputFormat;
use crate::notify::{Notice, Notifier};
use crate::params;
use crate::settings::{Mode, Settings};
use crate::store::TaskStore;
use crate::task::{Task, TaskId, TaskStatus};

#[derive(Clone, Debug, PartialEq)]
pub enum PipelineEvent {
    TaskStarted(TaskId),
    TaskProgress(TaskId, u8),
    TaskDone(TaskId),
    TaskFailed(TaskId, String),
    /// Published exactly once per run, after the last task.
    RunCompleted,
}

/// Drains queued tasks through the engine, one at a time, in the order they
/// were queued when `run` started. The engine handle is mutex-guarded; a run
/// holds it exclusively, so at most one transcode is in flight process-wide.
pub struct Pipeline {
    store: TaskStore,
    settings: Arc<Mutex<Settings>>,
    notifier: Notifier,
    engine: Mutex<Arc<dyn TranscodeEngine>>,
    subscribers: Mutex<Vec<Sender<PipelineEvent>>>,
}

impl Pipeline {
    pub fn new(
        store: TaskStore,
        settings: Arc<Mutex<Settings>>,
        notifier: Notifier,
        engine: Arc<dyn TranscodeEngine>,
    ) -> Self {
        Pipeline {
            store,
            settings,
            notifier,
            engine: Mutex::new(engine),
            subscribers: Mutex::new(vec![]),
        }
    }

    pub fn subscribe(&self) -> Receiver<PipelineEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    fn publish(&self, event: PipelineEvent) {
        let subscribers = self.subscribers.lock().unwrap();
        for tx in subscribers.iter() {
            let _ = tx.send(event.clone());
        }
    }

    /// Processes the tasks queued at this moment, FIFO. Tasks queued while
    /// the run is in flight wait for the next invocation. Fails only on the
    /// batch-level precondition; per-task failures stay on their task.
    pub fn run(&self) -> Result<(), Error> {
        let engine = self.engine.lock().unwrap();
        if !engine.is_loaded() {
            return Err(Error::EngineUnavailable);
        }

        {
            let settings = self.settings.lock().unwrap();
            if settings.mode == Mode::Convert && settings.format == OutputFormat::Webm {
                self.notifier.publish(Notice::SlowFormat(OutputFormat::Webm));
            }
        }

        let queued = self.store.queued_ids();
        debug!(tasks = queued.len(), "run started");
        for id in queued {
            self.process_task(&engine, id);
        }

        info!("run completed");
        self.publish(PipelineEvent::RunCompleted);
        Ok(())
    }

    fn process_task(&self, engine: &Arc<dyn TranscodeEngine>, id: TaskId) {
        self.store.update(&id, |t| t.start());
        // re-read after the transition; the format/preset on the task now
        // are the frozen values for this invocation
        let task = match self.store.get(&id) {
            Some(task) if task.status == TaskStatus::Processing => task,
            _ => return,
        };
        self.publish(PipelineEvent::TaskStarted(id));

        let input_name = format!("input_{}.{}", id.simple(), task.source.extension());
        let output_name = format!("output_{}.{}", id.simple(), task.format.extension());

        if let Err(err) = engine.write_input(&input_name, &task.source.bytes) {
            self.fail_task(&task, err.to_string());
            let _ = engine.delete(&input_name);
            return;
        }

        let mut args: Vec<String> = vec![
            String::from("-y"),
            String::from("-i"),
            input_name.clone(),
        ];
        args.extend(params::derive(task.format, task.preset));
        args.push(output_name.clone());

        let (tx, rx) = mpsc::channel();
        let worker_engine = Arc::clone(engine);
        let worker = thread::spawn(move || worker_engine.execute(args, Some(tx)));

        // execute drops its sender when it finishes, ending this loop
        let mut last_pct: u8 = 0;
        for fraction in rx {
            let pct = clamp_progress(fraction);
            if pct > last_pct {
                last_pct = pct;
                self.store.update(&id, |t| t.set_progress(pct));
                self.publish(PipelineEvent::TaskProgress(id, pct));
            }
        }

        match worker.join() {
            Ok(Ok(0)) => match engine.read_output(&output_name) {
                Ok(bytes) if !bytes.is_empty() => {
                    if self.store.complete(&id, bytes) {
                        self.publish(PipelineEvent::TaskDone(id));
                    }
                },
                Ok(_) => self.fail_task(&task, "engine produced an empty output file"),
                Err(err) => self.fail_task(&task, err.to_string()),
            },
            Ok(Ok(code)) => self.fail_task(&task, format!("engine exited with code {}", code)),
            Ok(Err(err)) => self.fail_task(&task, err.to_string()),
            Err(_) => self.fail_task(&task, "engine worker panicked"),
        }

        // scratch hygiene, best effort
        let _ = engine.delete(&input_name);
        let _ = engine.delete(&output_name);
    }

    fn fail_task(&self, task: &Task, message: impl Into<String>) {
        let message = message.into();
        debug!(task = %task.source.name, "task failed: {}", message);
        {
            let message = message.clone();
            self.store.update(&task.id, |t| t.fail(message));
        }
        self.notifier.publish(Notice::TaskFailed {
            name: task.source.name.clone(),
            message: message.clone(),
        });
        self.publish(PipelineEvent::TaskFailed(task.id, message));
    }
}

fn clamp_progress(fraction: f64) -> u8 {
    let pct = (fraction * 100.0).round();
    if pct.is_nan() {
        return 0;
    }
    pct.clamp(0.0, 100.0) as u8
}
