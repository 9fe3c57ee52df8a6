//! Task kinds and their collaborator endpoints.
//!
//! Each kind is created twice: once for the push transport and once, with the push task id,
//! on the deliberately simpler "naive" backend path that the polling sessions read.

use serde_json::Value;
use task_event::{
    ComputePiRequest, DocumentAnalysisRequest, NaiveComputePiRequest,
    NaiveDocumentAnalysisRequest,
};
use url::Url;

use crate::error::EngineError;

/// Directory the backend resolves URL-only documents into.
pub const DOCUMENT_DIR: &str = "/data/books";
const DEFAULT_DOCUMENT_NAME: &str = "document.txt";

/// Shape of the polling result endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResultShape {
    /// `{ partial_result, done }`: the whole result so far on every fetch.
    Snapshot,
    /// `{ snippets, last_id }`: items after the `after` cursor.
    Cursor,
}

/// Endpoint paths relative to the API base.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskEndpoints {
    pub create: &'static str,
    pub naive_create: &'static str,
    pub progress: &'static str,
    pub result: &'static str,
}

#[derive(Clone, Debug, PartialEq)]
pub enum TaskSpec {
    ComputePi {
        digits: u32,
    },
    DocumentAnalysis {
        document_path: Option<String>,
        document_url: Option<String>,
        keywords: Vec<String>,
    },
}

impl TaskSpec {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::ComputePi { .. } => "compute_pi",
            Self::DocumentAnalysis { .. } => "document_analysis",
        }
    }

    pub fn endpoints(&self) -> TaskEndpoints {
        match self {
            Self::ComputePi { .. } => TaskEndpoints {
                create: "/calculate_pi",
                naive_create: "/naive/calculate_pi",
                progress: "/naive/check_progress",
                result: "/naive/task_result",
            },
            Self::DocumentAnalysis { .. } => TaskEndpoints {
                create: "/tasks/document-analysis",
                naive_create: "/naive/document-analysis",
                progress: "/naive/document-analysis/status",
                result: "/naive/document-analysis/snippets",
            },
        }
    }

    pub fn result_shape(&self) -> ResultShape {
        match self {
            Self::ComputePi { .. } => ResultShape::Snapshot,
            Self::DocumentAnalysis { .. } => ResultShape::Cursor,
        }
    }

    /// Rejects tasks the backend cannot run.
    pub fn validate(&self) -> Result<(), EngineError> {
        match self {
            Self::ComputePi { digits } => {
                if *digits == 0 {
                    return Err(EngineError::InvalidTask("digits must be at least 1".into()));
                }
            }
            Self::DocumentAnalysis {
                document_path,
                document_url,
                keywords,
            } => {
                if resolve_document_path(document_path.as_deref(), document_url.as_deref())
                    .is_none()
                {
                    return Err(EngineError::InvalidTask(
                        "document path or URL is required".into(),
                    ));
                }
                if keywords.iter().all(|k| k.trim().is_empty()) {
                    return Err(EngineError::InvalidTask("keywords are required".into()));
                }
            }
        }
        Ok(())
    }

    /// Body for the push-task creation call.
    pub fn create_body(&self) -> Result<Value, EngineError> {
        let body = match self {
            Self::ComputePi { digits } => serde_json::to_value(ComputePiRequest { n: *digits })?,
            Self::DocumentAnalysis { .. } => serde_json::to_value(self.document_request()?)?,
        };
        Ok(body)
    }

    /// Body for the poll-task creation call, carrying the push task id.
    pub fn naive_create_body(&self, task_id: &str) -> Result<Value, EngineError> {
        let body = match self {
            Self::ComputePi { digits } => serde_json::to_value(NaiveComputePiRequest {
                digits: *digits,
                task_id: task_id.to_string(),
            })?,
            Self::DocumentAnalysis { .. } => {
                serde_json::to_value(NaiveDocumentAnalysisRequest {
                    task_id: task_id.to_string(),
                    request: self.document_request()?,
                })?
            }
        };
        Ok(body)
    }

    fn document_request(&self) -> Result<DocumentAnalysisRequest, EngineError> {
        let Self::DocumentAnalysis {
            document_path,
            document_url,
            keywords,
        } = self
        else {
            return Err(EngineError::InvalidTask("not a document task".into()));
        };
        let path = resolve_document_path(document_path.as_deref(), document_url.as_deref())
            .ok_or_else(|| EngineError::InvalidTask("document path or URL is required".into()))?;
        Ok(DocumentAnalysisRequest {
            document_path: path,
            document_url: document_url.clone().filter(|u| !u.trim().is_empty()),
            keywords: keywords
                .iter()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty())
                .collect(),
        })
    }
}

/// Explicit path wins; otherwise the URL's file name under [`DOCUMENT_DIR`].
///
/// `None` when neither is usable (no path and no parsable URL).
pub fn resolve_document_path(path: Option<&str>, url: Option<&str>) -> Option<String> {
    if let Some(p) = path.map(str::trim).filter(|p| !p.is_empty()) {
        return Some(p.to_string());
    }
    let url = Url::parse(url.map(str::trim).filter(|u| !u.is_empty())?).ok()?;
    let name = url
        .path_segments()
        .and_then(|mut segments| segments.next_back())
        .filter(|s| !s.is_empty())
        .unwrap_or(DEFAULT_DOCUMENT_NAME)
        .to_string();
    Some(format!("{}/{}", DOCUMENT_DIR, name))
}

/// Splits a comma-separated keyword list, dropping blanks.
pub fn parse_keywords(input: &str) -> Vec<String> {
    input
        .split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}
