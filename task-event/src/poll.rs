//! Request/response bodies for task creation and the naive (polling) endpoints.

use serde::{Deserialize, Serialize};
use serde_json::Value;

// -----------------------------------------------------------------------------
// Task creation
// -----------------------------------------------------------------------------

/// `POST /calculate_pi` body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ComputePiRequest {
    pub n: u32,
}

/// `POST /naive/calculate_pi` body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NaiveComputePiRequest {
    pub digits: u32,
    pub task_id: String,
}

/// `POST /tasks/document-analysis` body.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DocumentAnalysisRequest {
    pub document_path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub document_url: Option<String>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// `POST /naive/document-analysis` body: the push request plus the push task id.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NaiveDocumentAnalysisRequest {
    pub task_id: String,
    #[serde(flatten)]
    pub request: DocumentAnalysisRequest,
}

/// Push-task creation response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreateTaskResponse {
    pub id: String,
}

/// Poll-task creation response.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct NaiveTaskResponse {
    pub task_id: String,
}

// -----------------------------------------------------------------------------
// Result fetches
// -----------------------------------------------------------------------------

/// Cumulative-snapshot result: everything produced so far.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultResponse {
    #[serde(default)]
    pub partial_result: Value,
    #[serde(default)]
    pub done: bool,
}

impl ResultResponse {
    /// Snapshot text. Strings pass through; null is empty; anything else is its JSON text.
    pub fn snapshot_text(&self) -> String {
        match &self.partial_result {
            Value::String(s) => s.clone(),
            Value::Null => String::new(),
            other => other.to_string(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SnippetLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
}

/// One keyword hit. Pushed chunks carry `location.line`; the cursor endpoint carries `line`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Snippet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub keyword: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snippet: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SnippetLocation>,
}

impl Snippet {
    /// `[line N] keyword: snippet`, with `?` for an unknown line.
    pub fn display_line(&self) -> String {
        let line = self
            .line
            .or_else(|| self.location.as_ref().and_then(|l| l.line))
            .map(|n| n.to_string())
            .unwrap_or_else(|| "?".to_string());
        let keyword = self.keyword.as_deref().unwrap_or("keyword");
        let text = self.snippet.as_deref().unwrap_or("");
        format!("[line {}] {}: {}", line, keyword, text)
    }
}

/// Cursor page: snippets after the requested id.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SnippetsResponse {
    #[serde(default)]
    pub snippets: Vec<Snippet>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_id: Option<u64>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn naive_document_request_flattens_push_request() {
        let body = NaiveDocumentAnalysisRequest {
            task_id: "t1".to_string(),
            request: DocumentAnalysisRequest {
                document_path: "/data/books/a.txt".to_string(),
                document_url: None,
                keywords: vec!["whale".to_string()],
            },
        };
        let value = serde_json::to_value(&body).unwrap();
        assert_eq!(
            value,
            json!({"task_id":"t1","document_path":"/data/books/a.txt","keywords":["whale"]})
        );
    }

    #[test]
    fn snapshot_text_serializes_non_string_results() {
        let r: ResultResponse = serde_json::from_value(json!({"partial_result":"3.14"})).unwrap();
        assert_eq!(r.snapshot_text(), "3.14");
        assert!(!r.done);
        let r: ResultResponse =
            serde_json::from_value(json!({"partial_result":{"a":1},"done":true})).unwrap();
        assert_eq!(r.snapshot_text(), r#"{"a":1}"#);
        assert_eq!(ResultResponse::default().snapshot_text(), "");
    }

    #[test]
    fn snippet_display_prefers_flat_line_then_location() {
        let flat: Snippet =
            serde_json::from_value(json!({"id":3,"line":12,"keyword":"sea","snippet":"the sea"}))
                .unwrap();
        assert_eq!(flat.display_line(), "[line 12] sea: the sea");
        let nested: Snippet =
            serde_json::from_value(json!({"keyword":"sea","snippet":"x","location":{"line":7}}))
                .unwrap();
        assert_eq!(nested.display_line(), "[line 7] sea: x");
        assert_eq!(Snippet::default().display_line(), "[line ?] keyword: ");
    }

    #[test]
    fn snippets_page_tolerates_missing_cursor() {
        let page: SnippetsResponse = serde_json::from_value(json!({"snippets":[]})).unwrap();
        assert!(page.snippets.is_empty());
        assert_eq!(page.last_id, None);
    }
}
