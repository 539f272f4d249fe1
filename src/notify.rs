use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use crate::formats::OutputFormat;

#[derive(Clone, Debug, PartialEq)]
pub enum Notice {
    FilesAdded(usize),
    /// A submitted file exceeds the large-file threshold; processing may be
    /// slow.
    LargeFile { name: String, size: usize },
    /// The selected convert-mode target is markedly slower to encode.
    SlowFormat(OutputFormat),
    TaskFailed { name: String, message: String },
}

/// Fire-and-forget notification hub. Publishing never blocks and never
/// fails: a subscriber that went away is simply skipped.
#[derive(Clone)]
pub struct Notifier {
    subscribers: Arc<Mutex<Vec<Sender<Notice>>>>,
}

impl Notifier {
    pub fn new() -> Self {
        Notifier {
            subscribers: Arc::new(Mutex::new(vec![])),
        }
    }

    pub fn subscribe(&self) -> Receiver<Notice> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.lock().unwrap().push(tx);
        rx
    }

    pub fn publish(&self, notice: Notice) {
        let subscribers = self.subscribers.lock().unwrap();
        for tx in subscribers.iter() {
            let _ = tx.send(notice.clone());
        }
    }
}

impl Default for Notifier {
    fn default() -> Self {
        Notifier::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_every_subscriber() {
        let notifier = Notifier::new();
        let rx1 = notifier.subscribe();
        let rx2 = notifier.subscribe();
        notifier.publish(Notice::FilesAdded(3));
        assert_eq!(rx1.try_recv().unwrap(), Notice::FilesAdded(3));
        assert_eq!(rx2.try_recv().unwrap(), Notice::FilesAdded(3));
    }

    #[test]
    fn test_dropped_subscriber_does_not_break_publish() {
        let notifier = Notifier::new();
        let rx1 = notifier.subscribe();
        drop(notifier.subscribe());
        notifier.publish(Notice::SlowFormat(OutputFormat::Webm));
        assert_eq!(rx1.try_recv().unwrap(), Notice::SlowFormat(OutputFormat::Webm));
    }
}
