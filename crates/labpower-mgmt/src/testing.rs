//! Scripted connection for unit tests

use async_trait::async_trait;
use labpower_connect::{CompletedProcess, Connection, ConnectionError, ExecOptions, OsName};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

/// Records every call and answers from a queue of scripted results
///
/// Once the queue is empty each command succeeds with `default_stdout`.
pub(crate) struct RecordingConnection {
    os_name: OsName,
    default_stdout: String,
    calls: Mutex<Vec<(String, ExecOptions)>>,
    responses: Mutex<VecDeque<labpower_connect::Result<CompletedProcess>>>,
    shutdowns: AtomicUsize,
}

impl RecordingConnection {
    pub(crate) fn new(os_name: OsName) -> Self {
        Self {
            os_name,
            default_stdout: String::new(),
            calls: Mutex::new(Vec::new()),
            responses: Mutex::new(VecDeque::new()),
            shutdowns: AtomicUsize::new(0),
        }
    }

    pub(crate) fn with_default_stdout(mut self, stdout: &str) -> Self {
        self.default_stdout = stdout.to_string();
        self
    }

    pub(crate) fn push_stdout(&self, stdout: &str) {
        self.responses
            .lock()
            .unwrap()
            .push_back(Ok(CompletedProcess::with_stdout("", stdout)));
    }

    pub(crate) fn push_error(&self, err: ConnectionError) {
        self.responses.lock().unwrap().push_back(Err(err));
    }

    pub(crate) fn commands(&self) -> Vec<String> {
        self.calls.lock().unwrap().iter().map(|(c, _)| c.clone()).collect()
    }

    pub(crate) fn calls(&self) -> Vec<(String, ExecOptions)> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub(crate) fn shutdown_count(&self) -> usize {
        self.shutdowns.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Connection for RecordingConnection {
    async fn execute_command(
        &self,
        command: &str,
        options: &ExecOptions,
    ) -> labpower_connect::Result<CompletedProcess> {
        self.calls
            .lock()
            .unwrap()
            .push((command.to_string(), options.clone()));

        match self.responses.lock().unwrap().pop_front() {
            Some(Ok(mut process)) => {
                process.args = command.to_string();
                Ok(process)
            }
            Some(Err(e)) => Err(e),
            None => Ok(CompletedProcess::with_stdout(command, self.default_stdout.as_str())),
        }
    }

    async fn shutdown_platform(&self) -> labpower_connect::Result<()> {
        self.shutdowns.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn get_os_name(&self) -> labpower_connect::Result<OsName> {
        Ok(self.os_name)
    }
}
