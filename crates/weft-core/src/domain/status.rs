//! Status - StatusStore が返すジョブ状態のスナップショット
//!
//! Status は StatusStore だけが生成・更新する。Future 側は読むだけ。

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::ids::JobId;

/// Result fields of a completed job.
pub type Payload = Map<String, Value>;

/// Lifecycle state of a job.
///
/// ```text
///   create() ──→ Queued ──→ Working ──→ Completed
///                  │           │
///                  └───────────┴──→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Queued,
    Working,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// Snapshot of a job as recorded by the status store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Status {
    pub job_id: JobId,
    pub state: JobState,

    /// Filled when the job completes.
    #[serde(default)]
    pub payload: Payload,

    /// Error text when the job failed.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,

    pub updated_at: DateTime<Utc>,
}

impl Status {
    pub fn queued(job_id: JobId, at: DateTime<Utc>) -> Self {
        Self {
            job_id,
            state: JobState::Queued,
            payload: Payload::new(),
            message: None,
            updated_at: at,
        }
    }

    /// Look up one field of the completed payload.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.payload.get(key)
    }

    pub fn is_completed(&self) -> bool {
        self.state == JobState::Completed
    }

    pub fn is_failed(&self) -> bool {
        self.state == JobState::Failed
    }

    pub fn is_working(&self) -> bool {
        self.state == JobState::Working
    }

    pub fn is_terminal(&self) -> bool {
        self.state.is_terminal()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;
    use ulid::Ulid;

    #[rstest]
    #[case::queued(JobState::Queued, false)]
    #[case::working(JobState::Working, false)]
    #[case::completed(JobState::Completed, true)]
    #[case::failed(JobState::Failed, true)]
    fn terminal_states(#[case] state: JobState, #[case] terminal: bool) {
        assert_eq!(state.is_terminal(), terminal);
    }

    #[test]
    fn queued_status_has_empty_payload() {
        let st = Status::queued(JobId::from_ulid(Ulid::new()), Utc::now());
        assert_eq!(st.state, JobState::Queued);
        assert!(st.payload.is_empty());
        assert!(st.message.is_none());
        assert!(st.get("anything").is_none());
    }

    #[test]
    fn state_serializes_snake_case() {
        let mut st = Status::queued(JobId::from_ulid(Ulid::new()), Utc::now());
        st.state = JobState::Completed;
        st.payload.insert("example".into(), json!("hellohello"));

        let value = serde_json::to_value(&st).unwrap();
        assert_eq!(value["state"], "completed");
        assert_eq!(value["payload"]["example"], "hellohello");
        assert!(value.get("message").is_none());
    }
}
