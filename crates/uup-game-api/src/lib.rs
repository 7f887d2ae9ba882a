use std::future::Future;
use std::time::Duration;

use reqwest::{header, Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uup_game_core::{
    reconcile_student_data, Assignment, AssignmentId, ChallengeConfig, DependentLookup, GameError,
    PowerupType, RawEnvelope, RawStudentData, ServerResponse, StudentData, Task, TaskCategory,
};

mod config;

pub use config::{GameClientConfig, DEFAULT_BASE_URL, DEFAULT_ENDPOINT_PATH, DEFAULT_TIMEOUT_SECS};

pub const API_CONTRACT_VERSION: &str = "api.v1";

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request error: {0}")]
    Request(#[from] reqwest::Error),
    #[error("HTTP {status} from `{action}`")]
    Http { action: String, status: u16 },
    #[error("{0}")]
    Provider(String),
    #[error("could not decode `{action}` response: {detail}")]
    Decode { action: String, detail: String },
    #[error("reconciliation failed: {0}")]
    Reconcile(GameError),
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<GameError> for ClientError {
    fn from(err: GameError) -> Self {
        match err {
            GameError::Provider(message) => Self::Provider(message),
            other => Self::Reconcile(other),
        }
    }
}

impl From<ClientError> for GameError {
    fn from(err: ClientError) -> Self {
        match err {
            ClientError::Provider(message) => Self::Provider(message),
            ClientError::Reconcile(inner) => inner,
            decode @ ClientError::Decode { .. } => Self::Malformed(decode.to_string()),
            other => Self::Transport(other.to_string()),
        }
    }
}

/// Test outcome reported when turning a task in.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct TestResults {
    pub total_tests: u32,
    pub passed_tests: u32,
}

#[derive(Debug, Clone, Serialize)]
struct SecondChanceBody<'a> {
    task_name: &'a str,
    task_number: i64,
}

/// Everything the game view needs, fetched and reconciled in one call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StudentOverview {
    pub challenge: ChallengeConfig,
    pub powerup_types: Vec<PowerupType>,
    pub task_categories: Vec<TaskCategory>,
    pub student: StudentData,
}

/// HTTP client for the `uup_game.php` action endpoint.
#[derive(Debug, Clone)]
pub struct GameClient {
    client: Client,
    endpoint: String,
    session_cookie: Option<String>,
}

fn decode_error(action: &str, err: &impl std::fmt::Display) -> ClientError {
    ClientError::Decode { action: action.to_string(), detail: err.to_string() }
}

impl GameClient {
    /// Build a client from configuration.
    ///
    /// # Errors
    /// Returns [`ClientError::Request`] when the HTTP client cannot be constructed.
    pub fn new(config: &GameClientConfig) -> Result<Self, ClientError> {
        let client = Client::builder().timeout(Duration::from_secs(config.timeout_secs)).build()?;
        Ok(Self {
            client,
            endpoint: config.endpoint_url(),
            session_cookie: config.session_cookie.clone(),
        })
    }

    fn request(&self, method: Method, action: &str, params: &[(&str, String)]) -> RequestBuilder {
        let mut builder = self
            .client
            .request(method, &self.endpoint)
            .query(&[("action", action)])
            .query(params)
            .header(header::ACCEPT, "application/json");
        if let Some(cookie) = &self.session_cookie {
            builder = builder.header(header::COOKIE, cookie);
        }
        builder
    }

    async fn send(&self, action: &str, builder: RequestBuilder) -> Result<RawEnvelope, ClientError> {
        tracing::debug!(action, "sending game request");
        let response = builder.send().await?;
        let status = response.status();
        if !status.is_success() {
            // Size only; bodies may echo session details.
            if let Ok(body) = response.text().await {
                tracing::warn!(action, %status, bytes = body.len(), "game backend returned an error status");
            }
            return Err(ClientError::Http { action: action.to_string(), status: status.as_u16() });
        }

        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|err| decode_error(action, &err))
    }

    async fn get(&self, action: &str, params: &[(&str, String)]) -> Result<ServerResponse, ClientError> {
        let builder = self.request(Method::GET, action, params);
        Ok(self.send(action, builder).await?.normalize())
    }

    async fn post(
        &self,
        action: &str,
        params: &[(&str, String)],
        body: Option<Value>,
    ) -> Result<ServerResponse, ClientError> {
        let mut builder = self
            .request(Method::POST, action, params)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(body) = body {
            builder = builder.json(&body);
        }
        let response = self.send(action, builder).await?.normalize();
        if !response.is_success() {
            tracing::warn!(action, message = response.message(), "game action was rejected");
        }
        Ok(response)
    }

    async fn fetch_data<T>(&self, action: &str) -> Result<T, ClientError>
    where
        T: DeserializeOwned,
    {
        let data = self.get(action, &[]).await?.into_data()?;
        serde_json::from_value(data).map_err(|err| decode_error(action, &err))
    }

    /// `getAssignments`: the full assignment catalog, active or not.
    ///
    /// # Errors
    /// Returns an error on transport failure, a rejected envelope, or an unexpected payload.
    pub async fn assignments(&self) -> Result<Vec<Assignment>, ClientError> {
        self.fetch_data("getAssignments").await
    }

    /// `getPowerUpTypes`.
    ///
    /// # Errors
    /// Returns an error on transport failure, a rejected envelope, or an unexpected payload.
    pub async fn powerup_types(&self) -> Result<Vec<PowerupType>, ClientError> {
        self.fetch_data("getPowerUpTypes").await
    }

    /// `getChallengeConfig`.
    ///
    /// # Errors
    /// Returns an error on transport failure, a rejected envelope, or an unexpected payload.
    pub async fn challenge_config(&self) -> Result<ChallengeConfig, ClientError> {
        self.fetch_data("getChallengeConfig").await
    }

    /// `getTaskCategories`.
    ///
    /// # Errors
    /// Returns an error on transport failure, a rejected envelope, or an unexpected payload.
    pub async fn task_categories(&self) -> Result<Vec<TaskCategory>, ClientError> {
        self.fetch_data("getTaskCategories").await
    }

    /// `getStudentData` without reconciliation.
    ///
    /// # Errors
    /// Returns [`ClientError::Provider`] with the backend's message when the envelope reports
    /// failure, or a transport/decode error.
    pub async fn raw_student_data(&self) -> Result<RawStudentData, ClientError> {
        self.fetch_data("getStudentData").await
    }

    /// Fetch the student's records and reconcile them against the given catalogs.
    ///
    /// # Errors
    /// Returns an error when the student data request fails or any dependent hint /
    /// previous-points lookup fails; no partial view is produced.
    pub async fn student_data(
        &self,
        assignments: &[Assignment],
        powerup_types: &[PowerupType],
        task_requirement: u32,
    ) -> Result<StudentData, ClientError> {
        let raw = self.raw_student_data().await?;
        let data =
            reconcile_student_data(&raw, assignments, powerup_types, task_requirement, self)
                .await?;
        Ok(data)
    }

    /// Fetch the catalogs concurrently, then reconcile the student view using the
    /// configured `tasksRequired` as the unlock threshold.
    ///
    /// # Errors
    /// Returns the first error from any catalog request or from [`Self::student_data`].
    pub async fn overview(&self) -> Result<StudentOverview, ClientError> {
        let (assignments, powerup_types, challenge, task_categories) = futures::try_join!(
            self.assignments(),
            self.powerup_types(),
            self.challenge_config(),
            self.task_categories(),
        )?;
        let student =
            self.student_data(&assignments, &powerup_types, challenge.tasks_required).await?;
        Ok(StudentOverview { challenge, powerup_types, task_categories, student })
    }

    /// `getUsedHint`.
    ///
    /// # Errors
    /// Returns an error on transport failure or an undecodable envelope.
    pub async fn get_used_hint(
        &self,
        assignment_id: AssignmentId,
        task_number: i64,
    ) -> Result<ServerResponse, ClientError> {
        let params =
            [("assignment_id", assignment_id.to_string()), ("task_number", task_number.to_string())];
        self.get("getUsedHint", &params).await
    }

    /// `getTaskPreviousPoints`.
    ///
    /// # Errors
    /// Returns an error on transport failure or an undecodable envelope.
    pub async fn get_previous_points(
        &self,
        assignment_id: AssignmentId,
        task_number: i64,
    ) -> Result<ServerResponse, ClientError> {
        let params =
            [("assignment_id", assignment_id.to_string()), ("task_number", task_number.to_string())];
        self.get("getTaskPreviousPoints", &params).await
    }

    /// `getAvailableTasks`: tasks a second-chance powerup of `type_id` may be spent on.
    ///
    /// # Errors
    /// Returns an error on transport failure or an undecodable envelope.
    pub async fn second_chance_available_tasks(
        &self,
        assignment_id: AssignmentId,
        type_id: i64,
    ) -> Result<ServerResponse, ClientError> {
        let params = [("assignment_id", assignment_id.to_string()), ("type_id", type_id.to_string())];
        self.get("getAvailableTasks", &params).await
    }

    /// # Errors
    /// Returns an error on transport failure or an undecodable envelope.
    pub async fn buy_powerup(&self, type_id: i64) -> Result<ServerResponse, ClientError> {
        self.post("buyPowerUp", &[("type_id", type_id.to_string())], None).await
    }

    /// # Errors
    /// Returns an error on transport failure or an undecodable envelope.
    pub async fn start_assignment(
        &self,
        assignment_id: AssignmentId,
    ) -> Result<ServerResponse, ClientError> {
        self.post("startAssignment", &[("assignment_id", assignment_id.to_string())], None).await
    }

    /// # Errors
    /// Returns an error on transport failure or an undecodable envelope.
    pub async fn use_hint(&self, assignment_id: AssignmentId) -> Result<ServerResponse, ClientError> {
        self.post("hint", &[("assignment_id", assignment_id.to_string())], None).await
    }

    /// # Errors
    /// Returns an error on transport failure or an undecodable envelope.
    pub async fn use_second_chance(
        &self,
        assignment_id: AssignmentId,
        task: &Task,
    ) -> Result<ServerResponse, ClientError> {
        let body = serde_json::to_value(SecondChanceBody {
            task_name: &task.name,
            task_number: task.task_number,
        })
        .map_err(|err| decode_error("secondChance", &err))?;
        self.post("secondChance", &[("assignment_id", assignment_id.to_string())], Some(body)).await
    }

    /// # Errors
    /// Returns an error on transport failure or an undecodable envelope.
    pub async fn switch_task(&self, assignment_id: AssignmentId) -> Result<ServerResponse, ClientError> {
        self.post("swapTask", &[("assignment_id", assignment_id.to_string())], None).await
    }

    /// # Errors
    /// Returns an error on transport failure or an undecodable envelope.
    pub async fn turn_in_task(
        &self,
        assignment_id: AssignmentId,
        results: TestResults,
    ) -> Result<ServerResponse, ClientError> {
        let body = serde_json::to_value(results).map_err(|err| decode_error("turnTaskIn", &err))?;
        self.post("turnTaskIn", &[("assignment_id", assignment_id.to_string())], Some(body)).await
    }
}

impl DependentLookup for GameClient {
    fn used_hint(
        &self,
        assignment_id: AssignmentId,
        task_number: i64,
    ) -> impl Future<Output = Result<ServerResponse, GameError>> + Send {
        async move { self.get_used_hint(assignment_id, task_number).await.map_err(GameError::from) }
    }

    fn previous_points(
        &self,
        assignment_id: AssignmentId,
        task_number: i64,
    ) -> impl Future<Output = Result<ServerResponse, GameError>> + Send {
        async move {
            self.get_previous_points(assignment_id, task_number).await.map_err(GameError::from)
        }
    }
}
