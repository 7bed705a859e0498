use serde::{Deserialize, Serialize};

/// Lifecycle state of an upload session.
///
/// `Succeeded`, `Canceled` and `Failed` are terminal.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UploadState {
    #[default]
    Idle,
    Initiating,
    Transferring,
    Completing,
    Succeeded,
    Canceled,
    Failed,
}

impl UploadState {
    /// Returns `true` once no further transitions are possible.
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Canceled | Self::Failed)
    }

    /// Returns `true` while network work may be outstanding.
    pub fn is_active(self) -> bool {
        matches!(
            self,
            Self::Initiating | Self::Transferring | Self::Completing
        )
    }
}

impl std::fmt::Display for UploadState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Idle => "idle",
            Self::Initiating => "initiating",
            Self::Transferring => "transferring",
            Self::Completing => "completing",
            Self::Succeeded => "succeeded",
            Self::Canceled => "canceled",
            Self::Failed => "failed",
        };
        f.write_str(s)
    }
}

/// Snapshot of an upload session's progress.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadProgress {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub object_key: String,
    pub state: UploadState,
    pub total_bytes: u64,
    pub uploaded_bytes: u64,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
}

impl UploadProgress {
    /// Returns progress as a fraction.
    ///
    /// Stays below `1.0` (capped at `0.999`) until the session has
    /// succeeded, so a full byte count alone never reads as done.
    pub fn fraction(&self) -> f64 {
        if self.state == UploadState::Succeeded {
            return 1.0;
        }
        if self.total_bytes == 0 {
            return 0.0;
        }
        (self.uploaded_bytes as f64 / self.total_bytes as f64).min(0.999)
    }
}
