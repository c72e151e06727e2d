//! HTTP implementation of the backend collaborator.

use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use domain::models::{
    AvailabilityRequest, AvailabilityResponse, CompleteRequest, CompleteResponse, InstallationId,
    InstallationStatus, LocationReport, PaymentConfirmRequest, PaymentConfirmResponse,
    StatusUpdateRequest, StatusUpdateResponse, TechnicianId, TechnicianProfile, TimerStartRequest,
    TimerStartedBy, TimerStatus, WorkItem,
};

use super::Backend;
use crate::config::BackendConfig;
use crate::error::AgentError;

/// Header carrying a per-request correlation id.
const REQUEST_ID_HEADER: &str = "x-request-id";

/// Backend client over the REST API.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    api_token: Option<String>,
}

impl HttpBackend {
    /// Create a new client from configuration.
    pub fn new(config: &BackendConfig) -> Result<Self, AgentError> {
        let client = Client::builder().timeout(config.timeout()).build()?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_token: config
                .api_token
                .clone()
                .filter(|token| !token.trim().is_empty()),
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn prepare(&self, request: RequestBuilder) -> (RequestBuilder, Uuid) {
        let request_id = Uuid::new_v4();
        let request = request.header(REQUEST_ID_HEADER, request_id.to_string());
        let request = match &self.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        };
        (request, request_id)
    }

    /// Send a request and decode a JSON body on success.
    async fn send_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T, AgentError> {
        let (request, request_id) = self.prepare(request);
        let response = request.send().await?;
        let status = response.status();
        debug!(request_id = %request_id, status = status.as_u16(), "Backend response");

        if status.is_success() {
            response
                .json::<T>()
                .await
                .map_err(|e| AgentError::InvalidResponse(e.to_string()))
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AgentError::from_response(status.as_u16(), &body))
        }
    }

    /// Send a request whose success body is irrelevant.
    async fn send_unit(&self, request: RequestBuilder) -> Result<(), AgentError> {
        let (request, request_id) = self.prepare(request);
        let response = request.send().await?;
        let status = response.status();
        debug!(request_id = %request_id, status = status.as_u16(), "Backend response");

        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(AgentError::from_response(status.as_u16(), &body))
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn submit_location(&self, report: &LocationReport) -> Result<(), AgentError> {
        let request = self.client.post(self.endpoint("tech/location")).json(report);
        self.send_unit(request).await
    }

    async fn start_timer(
        &self,
        installation_id: InstallationId,
        started_by: TimerStartedBy,
    ) -> Result<TimerStatus, AgentError> {
        let url = self.endpoint(&format!("installations/{}/timer/start", installation_id));
        let request = self
            .client
            .post(url)
            .json(&TimerStartRequest { started_by });
        self.send_json(request).await
    }

    async fn stop_timer(&self, installation_id: InstallationId) -> Result<TimerStatus, AgentError> {
        let url = self.endpoint(&format!("installations/{}/timer/stop", installation_id));
        self.send_json(self.client.post(url)).await
    }

    async fn timer_status(
        &self,
        installation_id: InstallationId,
    ) -> Result<TimerStatus, AgentError> {
        let url = self.endpoint(&format!("installations/{}/timer", installation_id));
        self.send_json(self.client.get(url)).await
    }

    async fn my_installations(
        &self,
        technician_id: TechnicianId,
        date: Option<NaiveDate>,
    ) -> Result<Vec<WorkItem>, AgentError> {
        let mut query = vec![("technician_id", technician_id.to_string())];
        if let Some(date) = date {
            query.push(("target_date", date.format("%Y-%m-%d").to_string()));
        }
        let request = self
            .client
            .get(self.endpoint("tech/my-installations"))
            .query(&query);
        self.send_json(request).await
    }

    async fn update_status(
        &self,
        technician_id: TechnicianId,
        installation_id: InstallationId,
        status: InstallationStatus,
    ) -> Result<StatusUpdateResponse, AgentError> {
        let url = self.endpoint(&format!("tech/installations/{}/status", installation_id));
        let request = self
            .client
            .patch(url)
            .query(&[("technician_id", technician_id)])
            .json(&StatusUpdateRequest { status });
        self.send_json(request).await
    }

    async fn confirm_payment(
        &self,
        technician_id: TechnicianId,
        installation_id: InstallationId,
        request: &PaymentConfirmRequest,
    ) -> Result<PaymentConfirmResponse, AgentError> {
        let url = self.endpoint(&format!(
            "tech/installations/{}/confirm-payment",
            installation_id
        ));
        let request = self
            .client
            .post(url)
            .query(&[("technician_id", technician_id)])
            .json(request);
        self.send_json(request).await
    }

    async fn complete_installation(
        &self,
        technician_id: TechnicianId,
        installation_id: InstallationId,
        request: &CompleteRequest,
    ) -> Result<CompleteResponse, AgentError> {
        let url = self.endpoint(&format!("tech/installations/{}/complete", installation_id));
        let request = self
            .client
            .post(url)
            .query(&[("technician_id", technician_id)])
            .json(request);
        self.send_json(request).await
    }

    async fn update_availability(
        &self,
        technician_id: TechnicianId,
        is_available: bool,
    ) -> Result<AvailabilityResponse, AgentError> {
        let request = self
            .client
            .patch(self.endpoint("tech/availability"))
            .query(&[("technician_id", technician_id)])
            .json(&AvailabilityRequest { is_available });
        self.send_json(request).await
    }

    async fn profile(&self, technician_id: TechnicianId) -> Result<TechnicianProfile, AgentError> {
        let request = self
            .client
            .get(self.endpoint("tech/profile"))
            .query(&[("technician_id", technician_id)]);
        self.send_json(request).await
    }
}
