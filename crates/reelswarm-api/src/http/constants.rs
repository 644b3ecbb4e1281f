pub(crate) const HEADER_REQUEST_ID: &str = "x-request-id";
pub(crate) const HEADER_LAST_EVENT_ID: &str = "last-event-id";
pub(crate) const SSE_KEEP_ALIVE_SECS: u64 = 15;
pub(crate) const STREAM_CHUNK_BYTES: usize = 64 * 1024;

pub(crate) const PROBLEM_CONTENT_TYPE: &str = "application/problem+json";
pub(crate) const PROBLEM_INTERNAL: &str = "https://reelswarm.dev/problems/internal";
pub(crate) const PROBLEM_BAD_REQUEST: &str = "https://reelswarm.dev/problems/bad-request";
pub(crate) const PROBLEM_ENGINE_UNAVAILABLE: &str =
    "https://reelswarm.dev/problems/engine-unavailable";
pub(crate) const PROBLEM_NOT_FOUND: &str = "https://reelswarm.dev/problems/not-found";
pub(crate) const PROBLEM_NOT_READY: &str = "https://reelswarm.dev/problems/not-ready";
pub(crate) const PROBLEM_RANGE: &str = "https://reelswarm.dev/problems/range-not-satisfiable";
pub(crate) const PROBLEM_SERVICE_UNAVAILABLE: &str =
    "https://reelswarm.dev/problems/service-unavailable";

pub(crate) const EVENT_KIND_WHITELIST: &[&str] = &[
    "session_started",
    "state_changed",
    "file_selected",
    "progress",
    "playback_bound",
    "playback_failed",
];
