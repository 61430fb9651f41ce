//! `RunsApi` implementation over HTTP.

use async_trait::async_trait;
use tracing::{debug, info, instrument};

use flowrun_core::{
    ClientConfig, FlowError, FlowResult, LogEntry, LogPage, PipelineId, RunHandle, RunRecord,
    RunStatus, RunsApi,
};

use crate::api::{DataFlowClient, LogsResponse, RunResponse};
use crate::error::{HttpError, HttpResult};

/// A data-flow service reached over HTTP+JSON.
///
/// # Example
///
/// ```ignore
/// use flowrun_adapter_http::HttpRunsApi;
/// use flowrun_core::{ClientConfig, RunsApi};
///
/// let api = HttpRunsApi::new(
///     ClientConfig::new("https://dataflow.example.com/v2").with_token("..."),
/// )?;
/// println!("Talking to {}", api.name());
/// ```
#[derive(Debug, Clone)]
pub struct HttpRunsApi {
    /// Connection settings.
    config: ClientConfig,
    /// API client.
    client: DataFlowClient,
}

impl HttpRunsApi {
    /// Create a binding from connection settings.
    pub fn new(config: ClientConfig) -> HttpResult<Self> {
        let client = DataFlowClient::new(&config)?;
        Ok(Self { config, client })
    }

    /// Connection settings in use.
    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    fn to_record(pipeline: &PipelineId, response: RunResponse) -> RunRecord {
        let created_at = response.metadata.created_at();
        RunRecord {
            handle: RunHandle::new(pipeline.clone(), response.metadata.asset_id),
            status: response.entity.into_status(),
            created_at,
        }
    }

    fn to_page(offset: u64, response: LogsResponse) -> LogPage {
        // Entries are numbered from the offset asked for; an echoed offset
        // that disagrees is not trusted.
        if let Some(echoed) = response.offset.filter(|&echoed| echoed != offset) {
            debug!("Service echoed log offset {} for a request at {}", echoed, offset);
        }
        let entries = response
            .logs
            .into_iter()
            .enumerate()
            .map(|(i, event)| LogEntry {
                sequence: offset + i as u64,
                date: event.date,
                event_id: event.event_id.to_string(),
                message_text: event.message_text,
                event_type: event.event_type,
            })
            .collect();

        LogPage {
            entries,
            offset,
            total_count: response.total_count,
        }
    }
}

#[async_trait]
impl RunsApi for HttpRunsApi {
    fn name(&self) -> &str {
        self.client.base_url()
    }

    #[instrument(skip(self))]
    async fn create_run(&self, pipeline: &PipelineId) -> FlowResult<RunRecord> {
        let response = self
            .client
            .create_run(pipeline.as_str())
            .await
            .map_err(|e| match e {
                // The pipeline, or something it references, does not exist.
                HttpError::NotFound(msg) | HttpError::BadRequest(msg) => {
                    FlowError::Submission(msg)
                }
                HttpError::ApiError {
                    status: 422,
                    message,
                } => FlowError::Submission(message),
                other => other.into(),
            })?;

        let record = Self::to_record(pipeline, response);
        info!(
            "Run created: {} (state: {})",
            record.handle,
            record.status.state()
        );
        Ok(record)
    }

    #[instrument(skip(self))]
    async fn get_run(&self, run: &RunHandle) -> FlowResult<RunStatus> {
        let response = self
            .client
            .get_run(run.pipeline_id.as_str(), run.run_id.as_str())
            .await
            .map_err(|e| match e {
                HttpError::NotFound(_) => FlowError::RunNotFound(run.run_id.to_string()),
                other => other.into(),
            })?;

        debug!("Run {} is {}", run, response.entity.state);
        Ok(response.entity.into_status())
    }

    #[instrument(skip(self))]
    async fn stop_run(&self, run: &RunHandle) -> FlowResult<()> {
        self.client
            .cancel_run(run.pipeline_id.as_str(), run.run_id.as_str())
            .await
            .map_err(|e| match e {
                HttpError::NotFound(_) => FlowError::RunNotFound(run.run_id.to_string()),
                other => other.into(),
            })
    }

    #[instrument(skip(self))]
    async fn get_logs(&self, run: &RunHandle, offset: u64, limit: u32) -> FlowResult<LogPage> {
        let response = self
            .client
            .get_logs(run.pipeline_id.as_str(), run.run_id.as_str(), offset, limit)
            .await
            .map_err(|e| match e {
                HttpError::NotFound(_) => FlowError::RunNotFound(run.run_id.to_string()),
                other => other.into(),
            })?;

        Ok(Self::to_page(offset, response))
    }

    #[instrument(skip(self))]
    async fn list_runs(&self, pipeline: &PipelineId) -> FlowResult<Vec<RunRecord>> {
        let response = self
            .client
            .list_runs(pipeline.as_str())
            .await
            .map_err(|e| match e {
                // There is no run to be missing; the pipeline is.
                HttpError::NotFound(msg) => FlowError::Api {
                    status: 404,
                    message: format!("pipeline {pipeline} not found: {msg}"),
                },
                other => other.into(),
            })?;
        Ok(response
            .runs
            .into_iter()
            .map(|r| Self::to_record(pipeline, r))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_to_page_numbers_from_requested_offset() {
        let json = r#"{
            "logs": [
                {"date": "2024-03-01T10:15:01Z", "event_id": "a", "message_text": "one", "type": "info"},
                {"date": "2024-03-01T10:15:02Z", "event_id": "b", "message_text": "two", "type": "info"}
            ],
            "offset": 40,
            "total_count": 50
        }"#;
        let response: LogsResponse = serde_json::from_str(json).unwrap();
        let page = HttpRunsApi::to_page(40, response);
        assert_eq!(page.offset, 40);
        assert_eq!(page.entries[0].sequence, 40);
        assert_eq!(page.entries[1].sequence, 41);
        assert!(page.has_more());
    }

    #[test]
    fn test_to_page_ignores_stale_echoed_offset() {
        let json = r#"{
            "logs": [
                {"date": "2024-03-01T10:15:01Z", "event_id": "c", "message_text": "three", "type": "info"}
            ],
            "offset": 0,
            "total_count": 3
        }"#;
        let response: LogsResponse = serde_json::from_str(json).unwrap();
        let page = HttpRunsApi::to_page(2, response);
        assert_eq!(page.offset, 2);
        assert_eq!(page.entries[0].sequence, 2);
        assert!(!page.has_more());
    }

    #[test]
    fn test_to_page_without_echoed_offset() {
        let json = r#"{"logs": [{"date": "2024-03-01T10:15:01Z", "event_id": 9, "message_text": "x", "type": "info"}], "total_count": 4}"#;
        let response: LogsResponse = serde_json::from_str(json).unwrap();
        let page = HttpRunsApi::to_page(3, response);
        assert_eq!(page.entries[0].sequence, 3);
        assert_eq!(page.entries[0].event_id, "9");
        assert!(!page.has_more());
    }

    #[test]
    fn test_to_record() {
        let json = r#"{"metadata": {"asset_id": "run-7", "create_time": "2024-03-01T10:15:00Z"}, "entity": {"state": "starting"}}"#;
        let response: RunResponse = serde_json::from_str(json).unwrap();
        let record = HttpRunsApi::to_record(&PipelineId::new("p-1"), response);
        assert_eq!(record.handle, RunHandle::new("p-1", "run-7"));
        assert!(record.created_at.is_some());
    }

    #[test]
    fn test_name_is_base_url() {
        let api = HttpRunsApi::new(ClientConfig::new("https://dataflow.example.com/v2/")).unwrap();
        assert_eq!(api.name(), "https://dataflow.example.com/v2");
        assert_eq!(api.config().base_url, "https://dataflow.example.com/v2");
    }
}
