//! Scripted in-memory data-flow service used by the poller tests.

#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};

use async_trait::async_trait;
use chrono::{TimeZone, Utc};

use flowrun_core::{
    FlowError, FlowResult, LogEntry, LogPage, PipelineId, RunHandle, RunRecord, RunState,
    RunStatus, RunSummary, RunsApi,
};

struct ScriptedRun {
    pipeline: String,
    script: Vec<RunStatus>,
    cursor: usize,
    finish_on_stop: bool,
    logs: Vec<LogEntry>,
}

impl ScriptedRun {
    fn current(&self) -> RunStatus {
        self.script[self.cursor.min(self.script.len() - 1)].clone()
    }
}

/// A service whose runs walk through a fixed script of statuses, one step
/// per `get_run` call. The last status repeats forever.
pub struct ScriptedApi {
    pipelines: Mutex<HashMap<String, Vec<RunStatus>>>,
    runs: Mutex<HashMap<String, ScriptedRun>>,
    next_id: AtomicU32,
    transient_failures: AtomicU32,
    stale_log_offsets: AtomicBool,
    pub get_calls: AtomicU32,
    pub stop_calls: AtomicU32,
}

impl ScriptedApi {
    pub fn new() -> Self {
        Self {
            pipelines: Mutex::new(HashMap::new()),
            runs: Mutex::new(HashMap::new()),
            next_id: AtomicU32::new(1),
            transient_failures: AtomicU32::new(0),
            stale_log_offsets: AtomicBool::new(false),
            get_calls: AtomicU32::new(0),
            stop_calls: AtomicU32::new(0),
        }
    }

    /// Register a pipeline whose runs follow `script`.
    pub fn with_pipeline(self, pipeline: &str, script: Vec<RunStatus>) -> Self {
        self.pipelines
            .lock()
            .unwrap()
            .insert(pipeline.to_string(), script);
        self
    }

    /// Insert a run directly, bypassing submission.
    pub fn insert_run(&self, run: &RunHandle, script: Vec<RunStatus>) {
        self.runs.lock().unwrap().insert(
            key(run),
            ScriptedRun {
                pipeline: run.pipeline_id.to_string(),
                script,
                cursor: 0,
                finish_on_stop: false,
                logs: Vec::new(),
            },
        );
    }

    /// Make the next stop request race with completion: the run finishes
    /// and the request is rejected with a conflict.
    pub fn finish_on_stop(&self, run: &RunHandle) {
        if let Some(r) = self.runs.lock().unwrap().get_mut(&key(run)) {
            r.finish_on_stop = true;
        }
    }

    /// Attach `count` log entries to a run.
    pub fn set_logs(&self, run: &RunHandle, count: u64) {
        let logs = (0..count)
            .map(|i| LogEntry {
                sequence: i,
                date: Utc.timestamp_opt(1_700_000_000 + i as i64, 0).unwrap(),
                event_id: format!("evt-{i}"),
                message_text: format!("event number {i}"),
                event_type: if i % 7 == 0 { "warning" } else { "info" }.to_string(),
            })
            .collect();
        if let Some(r) = self.runs.lock().unwrap().get_mut(&key(run)) {
            r.logs = logs;
        }
    }

    /// Fail the next `count` calls with a transport error.
    pub fn fail_next(&self, count: u32) {
        self.transient_failures.store(count, Ordering::SeqCst);
    }

    /// Report every log page as starting at offset 0, whatever was asked.
    pub fn stale_log_offsets(&self) {
        self.stale_log_offsets.store(true, Ordering::SeqCst);
    }

    fn take_failure(&self) -> FlowResult<()> {
        let remaining = self.transient_failures.load(Ordering::SeqCst);
        if remaining > 0 {
            self.transient_failures
                .store(remaining - 1, Ordering::SeqCst);
            return Err(FlowError::Transport("connection reset by peer".into()));
        }
        Ok(())
    }
}

fn key(run: &RunHandle) -> String {
    format!("{}/{}", run.pipeline_id, run.run_id)
}

pub fn status(state: RunState) -> RunStatus {
    RunStatus::with_state(state)
}

pub fn finished(rows_read: u64, rows_written: u64) -> RunStatus {
    RunStatus::new(
        RunState::Finished,
        Some(RunSummary {
            total_rows_read: rows_read,
            total_rows_written: rows_written,
            total_bytes_read: rows_read * 64,
            total_bytes_written: rows_written * 64,
            completed_bindings: Some(2),
            total_bindings: Some(2),
        }),
        None,
    )
}

#[async_trait]
impl RunsApi for ScriptedApi {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn create_run(&self, pipeline: &PipelineId) -> FlowResult<RunRecord> {
        let script = self
            .pipelines
            .lock()
            .unwrap()
            .get(pipeline.as_str())
            .cloned()
            .ok_or_else(|| FlowError::Submission(format!("pipeline {pipeline} does not exist")))?;

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let handle = RunHandle::new(pipeline.clone(), format!("run-{id}"));
        self.insert_run(&handle, script);

        Ok(RunRecord {
            handle,
            status: status(RunState::Starting),
            created_at: Some(Utc::now()),
        })
    }

    async fn get_run(&self, run: &RunHandle) -> FlowResult<RunStatus> {
        self.get_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;

        let mut runs = self.runs.lock().unwrap();
        let r = runs
            .get_mut(&key(run))
            .ok_or_else(|| FlowError::RunNotFound(run.run_id.to_string()))?;
        let current = r.current();
        if r.cursor < r.script.len() - 1 {
            r.cursor += 1;
        }
        Ok(current)
    }

    async fn stop_run(&self, run: &RunHandle) -> FlowResult<()> {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        self.take_failure()?;

        let mut runs = self.runs.lock().unwrap();
        let r = runs
            .get_mut(&key(run))
            .ok_or_else(|| FlowError::RunNotFound(run.run_id.to_string()))?;

        if r.finish_on_stop {
            r.script = vec![finished(10, 10)];
            r.cursor = 0;
            return Err(FlowError::Conflict("run already finished".into()));
        }
        if r.current().is_terminal() {
            return Err(FlowError::Conflict("run already finished".into()));
        }

        r.script = vec![
            status(RunState::Stopping),
            status(RunState::Stopping),
            status(RunState::Stopped),
        ];
        r.cursor = 0;
        Ok(())
    }

    async fn get_logs(&self, run: &RunHandle, offset: u64, limit: u32) -> FlowResult<LogPage> {
        self.take_failure()?;

        let runs = self.runs.lock().unwrap();
        let r = runs
            .get(&key(run))
            .ok_or_else(|| FlowError::RunNotFound(run.run_id.to_string()))?;
        let total = r.logs.len() as u64;
        let start = offset.min(total) as usize;
        let end = (offset + u64::from(limit)).min(total) as usize;

        let reported = if self.stale_log_offsets.load(Ordering::SeqCst) {
            0
        } else {
            offset
        };

        Ok(LogPage {
            entries: r.logs[start..end].to_vec(),
            offset: reported,
            total_count: total,
        })
    }

    async fn list_runs(&self, pipeline: &PipelineId) -> FlowResult<Vec<RunRecord>> {
        let runs = self.runs.lock().unwrap();
        let mut records: Vec<RunRecord> = runs
            .iter()
            .filter(|(_, r)| r.pipeline == pipeline.as_str())
            .map(|(k, r)| {
                let run_id = k.rsplit('/').next().unwrap_or_default().to_string();
                RunRecord {
                    handle: RunHandle::new(pipeline.clone(), run_id),
                    status: r.current(),
                    created_at: None,
                }
            })
            .collect();
        records.sort_by(|a, b| a.handle.run_id.0.cmp(&b.handle.run_id.0));
        Ok(records)
    }
}
