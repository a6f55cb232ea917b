use std::{
    collections::HashMap,
    io::{self, Write},
    sync::{Arc, Mutex, PoisonError},
};

use crate::ui;

/// Identifier for a bootstrap step displayed to the user.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct StepId(String);

impl StepId {
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Terminal or in-flight state of a step.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StepStatus {
    Done,
    Cached,
    Failed,
    /// The step failed but the failure was discarded.
    Ignored,
}

/// Context passed to a step so subprocess output reaches the configured sink.
#[derive(Clone)]
pub struct StepContext {
    pub sink: Arc<dyn ProgressLogger>,
    pub step_id: StepId,
}

impl StepContext {
    pub fn append_output(&self, line: impl Into<String>) {
        self.sink.append_output(&self.step_id, line.into());
    }
}

/// Indicates how a logger wants command output to be delivered.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum OutputPolicy {
    /// Pipe child stdout/stderr directly to the parent terminal (no capture).
    Inherit,
    /// Capture output so it can be buffered or formatted.
    Capture,
}

/// Sink abstraction for progress reporting.
pub trait ProgressLogger: Send + Sync {
    fn register_step(&self, id: &StepId, label: &str);
    fn start(&self, id: &StepId);
    fn finish(&self, id: &StepId, status: StepStatus);
    fn append_output(&self, id: &StepId, line: String);
    fn append_output_chunk(&self, id: &StepId, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        let text = String::from_utf8_lossy(chunk).into_owned();
        self.append_output(id, text);
    }
    fn output_policy(&self) -> OutputPolicy {
        OutputPolicy::Capture
    }
}

/// Guard that ensures a step ends with a terminal status.
pub struct StepGuard {
    sink: Arc<dyn ProgressLogger>,
    id: StepId,
    finished: bool,
}

impl StepGuard {
    pub fn new(sink: Arc<dyn ProgressLogger>, id: StepId) -> Self {
        Self {
            sink,
            id,
            finished: false,
        }
    }

    pub fn done(mut self) {
        self.finish_with(StepStatus::Done);
    }

    pub fn cached(mut self) {
        self.finish_with(StepStatus::Cached);
    }

    pub fn ignore(mut self) {
        self.finish_with(StepStatus::Ignored);
    }

    fn finish_with(&mut self, status: StepStatus) {
        if self.finished {
            return;
        }
        self.sink.finish(&self.id, status);
        self.finished = true;
    }
}

impl Drop for StepGuard {
    fn drop(&mut self) {
        if !self.finished {
            self.sink.finish(&self.id, StepStatus::Failed);
        }
    }
}

/// Register and start a step, returning its context and guard.
pub fn begin_step(
    sink: &Arc<dyn ProgressLogger>,
    id: &str,
    label: &str,
) -> (StepContext, StepGuard) {
    let step_id = StepId::new(id);
    sink.register_step(&step_id, label);
    sink.start(&step_id);
    (
        StepContext {
            sink: Arc::clone(sink),
            step_id: step_id.clone(),
        },
        StepGuard::new(Arc::clone(sink), step_id),
    )
}

/// Progress sink for plain output; subprocesses write straight to the terminal.
#[derive(Default)]
pub struct PlainProgressLogger {
    labels: Mutex<HashMap<StepId, String>>,
}

impl ProgressLogger for PlainProgressLogger {
    fn register_step(&self, id: &StepId, label: &str) {
        self.labels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), label.to_string());
    }

    fn start(&self, id: &StepId) {
        if let Some(label) = self
            .labels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
        {
            ui::step(label);
        }
    }

    fn finish(&self, _id: &StepId, status: StepStatus) {
        match status {
            StepStatus::Cached => ui::detail("cached"),
            StepStatus::Failed => ui::detail("failed"),
            StepStatus::Ignored => ui::detail("failed (ignored)"),
            StepStatus::Done => {}
        }
        ui::blank_line();
    }

    fn append_output(&self, _id: &StepId, line: String) {
        eprintln!("{line}");
    }

    fn append_output_chunk(&self, _id: &StepId, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        let mut stderr = io::stderr();
        let _ = stderr.write_all(chunk);
        let _ = stderr.flush();
    }

    fn output_policy(&self) -> OutputPolicy {
        OutputPolicy::Inherit
    }
}

/// Progress sink that prints only step headers and keeps subprocess output
/// buffered, replaying it when a step does not finish cleanly.
pub struct QuietProgressLogger {
    labels: Mutex<HashMap<StepId, String>>,
    buffers: Mutex<HashMap<StepId, Vec<u8>>>,
    replay: Mutex<Box<dyn Write + Send>>,
}

impl Default for QuietProgressLogger {
    fn default() -> Self {
        Self::with_writer(io::stderr())
    }
}

impl QuietProgressLogger {
    /// Replay output of failed steps into `writer` instead of stderr.
    #[must_use]
    pub fn with_writer(writer: impl Write + Send + 'static) -> Self {
        Self {
            labels: Mutex::new(HashMap::new()),
            buffers: Mutex::new(HashMap::new()),
            replay: Mutex::new(Box::new(writer)),
        }
    }

    fn take_buffer(&self, id: &StepId) -> Vec<u8> {
        self.buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .unwrap_or_default()
    }
}

impl ProgressLogger for QuietProgressLogger {
    fn register_step(&self, id: &StepId, label: &str) {
        self.labels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(id.clone(), label.to_string());
    }

    fn start(&self, id: &StepId) {
        if let Some(label) = self
            .labels
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
        {
            ui::step(label);
        }
    }

    fn finish(&self, id: &StepId, status: StepStatus) {
        let buffered = self.take_buffer(id);
        match status {
            StepStatus::Failed | StepStatus::Ignored => {
                let mut replay = self.replay.lock().unwrap_or_else(PoisonError::into_inner);
                let _ = replay.write_all(&buffered);
                if !buffered.ends_with(b"\n") && !buffered.is_empty() {
                    let _ = replay.write_all(b"\n");
                }
                let _ = replay.flush();
                if status == StepStatus::Failed {
                    ui::detail("failed");
                } else {
                    ui::detail("failed (ignored)");
                }
            }
            StepStatus::Cached => ui::detail("cached"),
            StepStatus::Done => {}
        }
    }

    fn append_output(&self, id: &StepId, line: String) {
        let mut buffers = self.buffers.lock().unwrap_or_else(PoisonError::into_inner);
        let buffer = buffers.entry(id.clone()).or_default();
        buffer.extend_from_slice(line.as_bytes());
        buffer.push(b'\n');
    }

    fn append_output_chunk(&self, id: &StepId, chunk: &[u8]) {
        if chunk.is_empty() {
            return;
        }
        self.buffers
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(id.clone())
            .or_default()
            .extend_from_slice(chunk);
    }
}

#[cfg(test)]
pub mod testing {
    use super::{OutputPolicy, ProgressLogger, StepId, StepStatus};
    use std::sync::{Mutex, PoisonError};

    /// Sink that records every event, for assertions in tests.
    #[derive(Default)]
    pub struct RecordingLogger {
        pub finished: Mutex<Vec<(String, StepStatus)>>,
        pub output: Mutex<Vec<String>>,
    }

    impl RecordingLogger {
        pub fn statuses(&self) -> Vec<(String, StepStatus)> {
            self.finished
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .clone()
        }
    }

    impl ProgressLogger for RecordingLogger {
        fn register_step(&self, _id: &StepId, _label: &str) {}

        fn start(&self, _id: &StepId) {}

        fn finish(&self, id: &StepId, status: StepStatus) {
            self.finished
                .lock()
                .unwrap()
                .push((id.as_str().to_string(), status));
        }

        fn append_output(&self, _id: &StepId, line: String) {
            self.output.lock().unwrap().push(line);
        }

        fn output_policy(&self) -> OutputPolicy {
            OutputPolicy::Capture
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::RecordingLogger;
    use super::*;

    #[test]
    fn dropped_guard_marks_step_failed() {
        let recorder = Arc::new(RecordingLogger::default());
        let sink: Arc<dyn ProgressLogger> = recorder.clone();
        {
            let (_ctx, _guard) = begin_step(&sink, "create", "Create environment");
        }
        assert_eq!(
            recorder.statuses(),
            vec![("create".to_string(), StepStatus::Failed)]
        );
    }

    #[test]
    fn guard_reports_single_terminal_status() {
        let recorder = Arc::new(RecordingLogger::default());
        let sink: Arc<dyn ProgressLogger> = recorder.clone();
        let (ctx, guard) = begin_step(&sink, "sync", "Sync requirements");
        ctx.append_output("Requirement already satisfied: marimo");
        guard.ignore();

        assert_eq!(
            recorder.statuses(),
            vec![("sync".to_string(), StepStatus::Ignored)]
        );
        assert_eq!(recorder.output.lock().unwrap().len(), 1);
    }

    #[test]
    fn quiet_logger_drops_output_of_successful_steps() {
        let logger = QuietProgressLogger::default();
        let id = StepId::new("sync");
        logger.register_step(&id, "Sync requirements");
        logger.append_output_chunk(&id, b"Collecting marimo\n");
        assert_eq!(logger.take_buffer(&id), b"Collecting marimo\n".to_vec());

        logger.append_output_chunk(&id, b"partial");
        logger.finish(&id, StepStatus::Done);
        assert!(logger.take_buffer(&id).is_empty());
    }

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn quiet_logger_replays_output_of_failed_steps() {
        let replayed = SharedBuf::default();
        let logger = QuietProgressLogger::with_writer(replayed.clone());

        let install = StepId::new("install");
        logger.register_step(&install, "Install requirements");
        logger.append_output_chunk(&install, b"ERROR: No matching distribution");
        logger.finish(&install, StepStatus::Failed);

        let sync = StepId::new("sync");
        logger.register_step(&sync, "Sync requirements");
        logger.append_output(&sync, "network unreachable".to_string());
        logger.finish(&sync, StepStatus::Ignored);

        assert!(logger.take_buffer(&install).is_empty());
        assert!(logger.take_buffer(&sync).is_empty());
        assert_eq!(
            String::from_utf8(replayed.0.lock().unwrap().clone()).unwrap(),
            "ERROR: No matching distribution\nnetwork unreachable\n"
        );
    }

    #[test]
    fn quiet_logger_keeps_successful_output_off_the_terminal() {
        let replayed = SharedBuf::default();
        let logger = QuietProgressLogger::with_writer(replayed.clone());
        let id = StepId::new("create");
        logger.register_step(&id, "Create environment");
        logger.append_output_chunk(&id, b"created virtual environment\n");
        logger.finish(&id, StepStatus::Done);

        assert!(replayed.0.lock().unwrap().is_empty());
    }
}
