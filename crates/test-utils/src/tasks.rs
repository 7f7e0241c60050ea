use std::sync::{Arc, Mutex};
use std::time::Duration;

use assetwatch::errors::AssetwatchError;
use assetwatch::pipeline::task::{Task, TaskContext, TaskFuture, TaskReport};

/// Shared, ordered log of `"start:<name>"` / `"end:<name>"` entries.
pub type EventLog = Arc<Mutex<Vec<String>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

/// A task that only logs when it starts and ends.
#[derive(Debug)]
pub struct StubTask {
    name: String,
    log: EventLog,
    delay: Duration,
    fail: bool,
    exclusive: bool,
}

impl StubTask {
    pub fn new(name: &str, log: &EventLog) -> Self {
        Self {
            name: name.to_string(),
            log: Arc::clone(log),
            delay: Duration::ZERO,
            fail: false,
            exclusive: false,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Fail structurally after the delay.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    /// Behave like a clean task: never overlap other tasks.
    pub fn exclusive(mut self) -> Self {
        self.exclusive = true;
        self
    }

    pub fn into_arc(self) -> Arc<dyn Task> {
        Arc::new(self)
    }
}

impl Task for StubTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn exclusive(&self) -> bool {
        self.exclusive
    }

    fn run<'a>(&'a self, _ctx: &'a TaskContext) -> TaskFuture<'a> {
        Box::pin(async move {
            self.log.lock().unwrap().push(format!("start:{}", self.name));
            if !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }
            if self.fail {
                self.log.lock().unwrap().push(format!("fail:{}", self.name));
                return Err(AssetwatchError::structural(&self.name, "stub failure"));
            }
            self.log.lock().unwrap().push(format!("end:{}", self.name));
            Ok(TaskReport {
                task: self.name.clone(),
                ..TaskReport::default()
            })
        })
    }
}
