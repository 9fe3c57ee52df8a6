//! Task protocol wire shapes shared by the engine and the mock backend.
//!
//! - [`frame`]: push-channel frames (`type` + `payload`) sent on `/ws/tasks/{id}`.
//! - [`poll`]: request/response bodies for task creation and the naive polling endpoints.
//! - [`status`]: the task status snapshot carried by both transports.
//!
//! Every inbound shape is deserialized leniently (missing fields default) so a partially
//! filled payload still decodes; only structurally wrong JSON is a decode error.

pub mod frame;
pub mod poll;
pub mod status;

pub use frame::{PushFrame, ResultChunkPayload, StatusPayload};
pub use poll::{
    ComputePiRequest, CreateTaskResponse, DocumentAnalysisRequest, NaiveComputePiRequest,
    NaiveDocumentAnalysisRequest, NaiveTaskResponse, ResultResponse, Snippet, SnippetLocation,
    SnippetsResponse,
};
pub use status::{TaskProgress, TaskState, TaskStatus};

/// Keepalive text the client sends on the push channel. Servers ignore it.
pub const KEEPALIVE_TEXT: &str = "ping";
