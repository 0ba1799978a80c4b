use crate::gemini::MoodReport;
use crate::studio::SpotPoint;

/// Whether the hosted API is usable. There is no persistent connection;
/// this only reflects key configuration and the last request outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiStatus {
    Ready,
    Unconfigured,
    Erroring,
}

/// Messages from worker tasks back to the UI thread.
#[derive(Debug, Clone)]
pub enum AppEvent {
    StatusChanged(ApiStatus),
    Progress(String),
    DesignReady {
        data_url: String,
        prompt: String,
    },
    DesignFailed(String),
    ChatReply(String),
    ChatFailed(String),
    MoodReady(MoodReport),
    MoodFailed(String),
    SpotEditReady {
        data_url: String,
        prompt: String,
        spot: SpotPoint,
    },
    SpotEditFailed(String),
}
