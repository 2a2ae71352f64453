use std::time::Duration;

use notes_core::{FormData, TaskId};
use serde::de::DeserializeOwned;
use url::Url;

use crate::types::{DeleteRequest, Envelope, SubmitData, SubmitRequest};
use crate::{FailureKind, ServiceError, StatusReport};

#[derive(Debug, Clone, PartialEq)]
pub struct ServiceSettings {
    /// Prefix of every endpoint, e.g. `http://127.0.0.1:8483/api`.
    pub base_url: String,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for ServiceSettings {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8483/api".to_string(),
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
        }
    }
}

/// The remote job service that downloads, transcribes and summarizes.
#[async_trait::async_trait]
pub trait NoteService: Send + Sync {
    /// Starts a job. Passing `task_id` asks the service to regenerate that
    /// task instead of creating a new one.
    async fn submit(&self, form: &FormData, task_id: Option<&str>) -> Result<TaskId, ServiceError>;

    async fn query_status(&self, task_id: &str) -> Result<StatusReport, ServiceError>;

    /// Releases server-side files kept for a source video.
    async fn delete_job(&self, video_id: &str, platform: &str) -> Result<(), ServiceError>;
}

#[derive(Debug, Clone)]
pub struct ReqwestNoteService {
    base_url: Url,
    client: reqwest::Client,
}

impl ReqwestNoteService {
    pub fn new(settings: ServiceSettings) -> Result<Self, ServiceError> {
        let base_url = Url::parse(settings.base_url.trim_end_matches('/'))
            .map_err(|err| ServiceError::new(FailureKind::InvalidUrl, err.to_string()))?;
        if base_url.cannot_be_a_base() {
            return Err(ServiceError::new(
                FailureKind::InvalidUrl,
                format!("{} cannot be used as a base url", settings.base_url),
            ));
        }

        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .build()
            .map_err(|err| ServiceError::new(FailureKind::Network, err.to_string()))?;

        Ok(Self { base_url, client })
    }

    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }
}

#[async_trait::async_trait]
impl NoteService for ReqwestNoteService {
    async fn submit(&self, form: &FormData, task_id: Option<&str>) -> Result<TaskId, ServiceError> {
        let body = SubmitRequest { form, task_id };
        let response = self
            .client
            .post(self.endpoint(&["generate_note"]))
            .json(&body)
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let envelope: Envelope<SubmitData> = read_envelope(response).await?;
        if envelope.code != 0 {
            return Err(rejected(envelope.code, envelope.msg));
        }
        envelope
            .data
            .map(|data| data.task_id)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| ServiceError::new(FailureKind::Decode, "missing task_id"))
    }

    async fn query_status(&self, task_id: &str) -> Result<StatusReport, ServiceError> {
        let response = self
            .client
            .get(self.endpoint(&["task_status", task_id]))
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let envelope: Envelope<StatusReport> = read_envelope(response).await?;
        if envelope.code != 0 {
            // The service answered: the job itself failed.
            return Ok(StatusReport::failed(envelope.msg));
        }
        envelope
            .data
            .ok_or_else(|| ServiceError::new(FailureKind::Decode, "missing status data"))
    }

    async fn delete_job(&self, video_id: &str, platform: &str) -> Result<(), ServiceError> {
        let response = self
            .client
            .post(self.endpoint(&["delete_task"]))
            .json(&DeleteRequest { video_id, platform })
            .send()
            .await
            .map_err(map_reqwest_error)?;

        let envelope: Envelope<serde_json::Value> = read_envelope(response).await?;
        if envelope.code != 0 {
            return Err(rejected(envelope.code, envelope.msg));
        }
        Ok(())
    }
}

async fn read_envelope<T: DeserializeOwned>(
    response: reqwest::Response,
) -> Result<Envelope<T>, ServiceError> {
    let status = response.status();
    if !status.is_success() {
        return Err(ServiceError::new(
            FailureKind::HttpStatus(status.as_u16()),
            status.to_string(),
        ));
    }
    response.json::<Envelope<T>>().await.map_err(|err| {
        if err.is_decode() {
            ServiceError::new(FailureKind::Decode, err.to_string())
        } else {
            map_reqwest_error(err)
        }
    })
}

fn rejected(code: i64, msg: String) -> ServiceError {
    let message = if msg.is_empty() {
        "request rejected".to_string()
    } else {
        msg
    };
    ServiceError::new(FailureKind::Rejected { code }, message)
}

fn map_reqwest_error(err: reqwest::Error) -> ServiceError {
    if err.is_timeout() {
        return ServiceError::new(FailureKind::Timeout, err.to_string());
    }
    ServiceError::new(FailureKind::Network, err.to_string())
}
