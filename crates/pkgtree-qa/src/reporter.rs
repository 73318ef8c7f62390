use std::sync::mpsc::{self, Receiver, Sender};

use crate::QaMessage;

/// Receives the outcome of a QA run.
///
/// Callbacks are delivered one at a time from the thread that started the
/// run, so implementations need not be reentrant.
pub trait QaReporter {
    fn message(&mut self, message: QaMessage);

    /// Coarse progress text. Carries no pass/fail meaning.
    fn status(&mut self, text: &str);
}

/// Channel-based reporter.
///
/// Sends findings through a standard mpsc channel; status lines are dropped.
pub struct ChannelReporter {
    sender: Sender<QaMessage>,
}

impl ChannelReporter {
    pub fn new() -> (Self, Receiver<QaMessage>) {
        let (sender, receiver) = mpsc::channel();
        (
            Self {
                sender,
            },
            receiver,
        )
    }
}

impl QaReporter for ChannelReporter {
    fn message(&mut self, message: QaMessage) {
        let _ = self.sender.send(message);
    }

    fn status(&mut self, _text: &str) {}
}

/// No-op reporter for headless runs.
pub struct NullReporter;

impl QaReporter for NullReporter {
    fn message(&mut self, _message: QaMessage) {}

    fn status(&mut self, _text: &str) {}
}

/// Reporter that keeps everything it receives for later inspection.
#[derive(Default)]
pub struct CollectorReporter {
    messages: Vec<QaMessage>,
    statuses: Vec<String>,
}

impl CollectorReporter {
    pub fn messages(&self) -> &[QaMessage] {
        &self.messages
    }

    pub fn statuses(&self) -> &[String] {
        &self.statuses
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn into_messages(self) -> Vec<QaMessage> {
        self.messages
    }
}

impl QaReporter for CollectorReporter {
    fn message(&mut self, message: QaMessage) {
        self.messages.push(message);
    }

    fn status(&mut self, text: &str) {
        self.statuses.push(text.to_string());
    }
}
