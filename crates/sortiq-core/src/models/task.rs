//! Task models: raw input lines, AI-restructured SMART tasks, and saved tasks.

use std::fmt;

use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Task priority assigned by the AI service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub enum Priority {
    #[default]
    Unknown,
    Low,
    Medium,
    High,
}

impl Priority {
    /// Parse a priority label, case-insensitively. Unrecognized labels are `Unknown`.
    pub fn from_label(label: &str) -> Self {
        let lower = label.trim().to_lowercase();
        if lower.contains("high") {
            Priority::High
        } else if lower.contains("medium") {
            Priority::Medium
        } else if lower.contains("low") {
            Priority::Low
        } else {
            Priority::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
            Priority::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for Priority {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Priority {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(Priority::from_label(&label))
    }
}

/// Lifecycle status of a saved task.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TaskStatus {
    #[default]
    Active,
    Completed,
    Other(String),
}

impl TaskStatus {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "active" => TaskStatus::Active,
            "completed" | "complete" | "done" => TaskStatus::Completed,
            other => TaskStatus::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TaskStatus::Active => "active",
            TaskStatus::Completed => "completed",
            TaskStatus::Other(s) => s,
        }
    }
}

impl fmt::Display for TaskStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for TaskStatus {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TaskStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let label = String::deserialize(deserializer)?;
        Ok(TaskStatus::from_label(&label))
    }
}

/// One task restructured into SMART form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProcessedTask {
    /// The AI service calls this `task`; the task API calls it `original_task`
    #[serde(alias = "task")]
    pub original_task: String,
    pub smart_task: String,
    pub priority: Priority,
}

/// A task saved on the server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskDetail {
    pub id: i64,
    pub original_task: String,
    pub smart_task: String,
    pub priority: Priority,
    #[serde(default)]
    pub status: TaskStatus,
    #[serde(deserialize_with = "deserialize_timestamp")]
    pub created_at: DateTime<Utc>,
    pub user_id: i64,
}

/// Accept RFC 3339 timestamps, and naive ones (taken as UTC) from servers
/// that store timestamps without a zone.
fn deserialize_timestamp<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    let raw = String::deserialize(deserializer)?;
    if let Ok(ts) = DateTime::parse_from_rfc3339(&raw) {
        return Ok(ts.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&raw, "%Y-%m-%dT%H:%M:%S%.f")
        .map(|naive| naive.and_utc())
        .map_err(serde::de::Error::custom)
}

impl TaskDetail {
    pub fn is_completed(&self) -> bool {
        self.status == TaskStatus::Completed
    }
}

/// Body of the transform call.
#[derive(Debug, Clone, Serialize)]
pub struct TransformRequest {
    pub tasks: Vec<String>,
}

impl TransformRequest {
    /// Build a request from raw lines, dropping blank ones.
    pub fn from_lines<I, S>(lines: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let tasks = lines
            .into_iter()
            .map(|l| l.as_ref().trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        Self { tasks }
    }
}

/// Response of the transform call.
#[derive(Debug, Clone, Deserialize)]
pub struct TransformResponse {
    // The server has shipped both spellings
    #[serde(alias = "processed_task")]
    pub processed_tasks: Vec<ProcessedTask>,
}

/// Body of the task-result email call.
#[derive(Debug, Clone, Serialize)]
pub struct TaskResultEmail<'a> {
    pub tasks: &'a [String],
    pub processed_tasks: Vec<EmailedTask<'a>>,
}

/// Email rows use the AI service's field names.
#[derive(Debug, Clone, Serialize)]
pub struct EmailedTask<'a> {
    pub task: &'a str,
    pub smart_task: &'a str,
    pub priority: Priority,
}

impl<'a> From<&'a ProcessedTask> for EmailedTask<'a> {
    fn from(task: &'a ProcessedTask) -> Self {
        Self {
            task: &task.original_task,
            smart_task: &task.smart_task,
            priority: task.priority,
        }
    }
}

/// Generic `{"message": ...}` acknowledgement.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageResponse {
    #[serde(default)]
    pub message: Option<String>,
}
