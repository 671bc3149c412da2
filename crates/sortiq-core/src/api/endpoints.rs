//! Typed calls for the SortIQ endpoints.

use futures::future::join_all;
use tracing::debug;

use crate::models::{
    ApiKeyUpdate, AuthResponse, EmailedTask, MessageResponse, ProcessedTask, Registration,
    SignInCredentials, TaskDetail, TaskResultEmail, TaskStatus, TransformRequest,
    TransformResponse, User,
};

use super::client::{LOGIN_PATH, ME_PATH, SIGNUP_PATH};
use super::transport::ApiRequest;
use super::{ApiClient, ApiError};

const TASKS_PATH: &str = "/api/tasks/";
const SAVE_TASK_PATH: &str = "/api/tasks/save";
const API_KEY_PATH: &str = "/api/users/api-key";
const TASK_RESULT_EMAIL_PATH: &str = "/api/email/send-task-result";
const TRANSFORM_PATH: &str = "/api/ai/transform";

impl ApiClient {
    // ===== Auth =====

    pub async fn sign_up(&self, registration: &Registration) -> Result<AuthResponse, ApiError> {
        let request = ApiRequest::post(SIGNUP_PATH).json(registration)?;
        self.execute_public(request).await?.json()
    }

    pub async fn sign_in(&self, credentials: &SignInCredentials) -> Result<AuthResponse, ApiError> {
        let request = ApiRequest::post(LOGIN_PATH).json(credentials)?;
        self.execute_public(request).await?.json()
    }

    /// Profile of the user the stored credential belongs to
    pub async fn current_user(&self) -> Result<User, ApiError> {
        self.get(ME_PATH).await
    }

    /// Store the user's third-party AI key on their profile
    pub async fn update_api_key(&self, api_key: &str) -> Result<(), ApiError> {
        if api_key.trim().is_empty() {
            return Err(ApiError::Validation("API key must not be empty".to_string()));
        }
        let request = ApiRequest::put(API_KEY_PATH).json(&ApiKeyUpdate {
            api_key: api_key.trim(),
        })?;
        self.execute(request).await?;
        Ok(())
    }

    // ===== Tasks =====

    pub async fn list_tasks(&self) -> Result<Vec<TaskDetail>, ApiError> {
        self.get(TASKS_PATH).await
    }

    pub async fn save_task(&self, task: &ProcessedTask) -> Result<TaskDetail, ApiError> {
        self.post(SAVE_TASK_PATH, task).await
    }

    /// Save several tasks concurrently. Results are in input order.
    pub async fn save_tasks(&self, tasks: &[ProcessedTask]) -> Vec<Result<TaskDetail, ApiError>> {
        debug!(count = tasks.len(), "Saving tasks");
        join_all(tasks.iter().map(|task| self.save_task(task))).await
    }

    pub async fn delete_task(&self, task_id: i64) -> Result<(), ApiError> {
        let response: MessageResponse = self.delete(&format!("{}{}", TASKS_PATH, task_id)).await?;
        debug!(task_id = task_id, message = ?response.message, "Task deleted");
        Ok(())
    }

    pub async fn update_task_status(&self, task_id: i64, status: &TaskStatus) -> Result<(), ApiError> {
        let request = ApiRequest::patch(format!("{}{}/status", TASKS_PATH, task_id))
            .query("status", status.as_str());
        self.execute(request).await?;
        Ok(())
    }

    // ===== AI =====

    /// Ask the AI service to restructure raw task lines into SMART tasks.
    /// Blank lines are dropped; an input with nothing left is rejected locally.
    pub async fn transform_tasks<I, S>(&self, lines: I) -> Result<Vec<ProcessedTask>, ApiError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let body = TransformRequest::from_lines(lines);
        if body.tasks.is_empty() {
            return Err(ApiError::Validation("No tasks provided".to_string()));
        }
        let response: TransformResponse = self.post(TRANSFORM_PATH, &body).await?;
        Ok(response.processed_tasks)
    }

    // ===== Email =====

    /// Email the original lines and their SMART versions to the signed-in user
    pub async fn send_task_result_email(
        &self,
        tasks: &[String],
        processed: &[ProcessedTask],
    ) -> Result<(), ApiError> {
        let body = TaskResultEmail {
            tasks,
            processed_tasks: processed.iter().map(EmailedTask::from).collect(),
        };
        let request = ApiRequest::post(TASK_RESULT_EMAIL_PATH).json(&body)?;
        self.execute(request).await?;
        Ok(())
    }
}
