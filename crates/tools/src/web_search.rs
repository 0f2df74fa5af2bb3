//! Web search tool: DuckDuckGo Instant Answer API.
//!
//! Returns the instant answer (when there is one) followed by related
//! topics, each as a single readable line.

use async_trait::async_trait;
use jarvis_core::error::ToolError;
use jarvis_core::schema::{ParamType, ParameterSchema};
use jarvis_core::tool::Tool;
use serde::Deserialize;
use serde_json::{Map, Value, json};
use tracing::debug;

const MAX_RESULTS: u64 = 10;

pub struct WebSearchTool {
    client: reqwest::Client,
    search_url: String,
}

impl WebSearchTool {
    pub fn new(client: reqwest::Client, search_url: &str) -> Self {
        Self {
            client,
            search_url: search_url.to_string(),
        }
    }

    fn failed(&self, reason: impl Into<String>) -> ToolError {
        ToolError::ExecutionFailed {
            tool_name: self.name().to_string(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "search_web"
    }

    fn description(&self) -> &str {
        "Search the web for current information. Returns short summaries with links."
    }

    fn schema(&self) -> ParameterSchema {
        ParameterSchema::new()
            .required("query", ParamType::String, "What to look up")
            .optional(
                "num_results",
                ParamType::Integer,
                "How many results to return",
                Some(json!(5)),
            )
    }

    async fn invoke(&self, arguments: Map<String, Value>) -> Result<Value, ToolError> {
        let query = arguments
            .get("query")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .trim()
            .to_string();
        if query.is_empty() {
            return Err(ToolError::InvalidArguments {
                tool: self.name().into(),
                field: "query".into(),
                reason: "query must not be empty".into(),
            });
        }
        let limit = arguments
            .get("num_results")
            .and_then(Value::as_u64)
            .unwrap_or(5)
            .clamp(1, MAX_RESULTS) as usize;

        let response = self
            .client
            .get(&self.search_url)
            .query(&[
                ("q", query.as_str()),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ])
            .send()
            .await
            .map_err(|e| self.failed(format!("search request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(self.failed(format!("search service returned {}", response.status())));
        }

        let body: InstantAnswer = response
            .json()
            .await
            .map_err(|e| self.failed(format!("unreadable search response: {e}")))?;

        let results = collect_results(&body, limit);
        debug!(query = %query, count = results.len(), "Web search completed");

        if results.is_empty() {
            return Ok(Value::String(format!("No results found for '{query}'")));
        }
        Ok(json!(results))
    }
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct InstantAnswer {
    #[serde(default)]
    heading: String,
    #[serde(default)]
    abstract_text: String,
    #[serde(default, rename = "AbstractURL")]
    abstract_url: String,
    #[serde(default)]
    answer: Value,
    #[serde(default)]
    related_topics: Vec<RelatedTopic>,
}

/// Either a topic or a named group of topics.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RelatedTopic {
    Topic {
        #[serde(rename = "Text")]
        text: String,
        #[serde(rename = "FirstURL", default)]
        first_url: String,
    },
    Group {
        #[serde(rename = "Topics")]
        topics: Vec<RelatedTopic>,
    },
}

fn with_link(text: &str, url: &str) -> String {
    if url.is_empty() {
        text.to_string()
    } else {
        format!("{text} ({url})")
    }
}

fn flatten_topics<'a>(topics: &'a [RelatedTopic], out: &mut Vec<(&'a str, &'a str)>) {
    for topic in topics {
        match topic {
            RelatedTopic::Topic { text, first_url } => out.push((text.as_str(), first_url.as_str())),
            RelatedTopic::Group { topics } => flatten_topics(topics, out),
        }
    }
}

/// Turn an Instant Answer body into at most `limit` result lines.
fn collect_results(body: &InstantAnswer, limit: usize) -> Vec<String> {
    let mut results = Vec::new();

    if let Some(answer) = body.answer.as_str().filter(|a| !a.is_empty()) {
        results.push(answer.to_string());
    }

    if !body.abstract_text.is_empty() {
        let text = if body.heading.is_empty() {
            body.abstract_text.clone()
        } else {
            format!("{}: {}", body.heading, body.abstract_text)
        };
        results.push(with_link(&text, &body.abstract_url));
    }

    let mut topics = Vec::new();
    flatten_topics(&body.related_topics, &mut topics);
    results.extend(
        topics
            .into_iter()
            .filter(|(text, _)| !text.is_empty())
            .map(|(text, url)| with_link(text, url)),
    );

    results.truncate(limit);
    results
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> InstantAnswer {
        serde_json::from_value(json!({
            "Heading": "Python (programming language)",
            "AbstractText": "Python is a high-level, general-purpose programming language.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Python_(programming_language)",
            "Answer": "",
            "RelatedTopics": [
                {"Text": "Python 3.13 - latest stable release", "FirstURL": "https://duckduckgo.com/Python_3.13"},
                {"Name": "See also", "Topics": [
                    {"Text": "CPython - reference implementation", "FirstURL": "https://duckduckgo.com/CPython"}
                ]}
            ]
        }))
        .unwrap()
    }

    #[test]
    fn schema_defaults_num_results() {
        let tool = WebSearchTool::new(reqwest::Client::new(), "http://search");
        let schema = tool.schema();
        let spec = schema.get("num_results").unwrap();
        assert!(!spec.required);
        assert_eq!(spec.default, Some(json!(5)));
    }

    #[test]
    fn abstract_comes_first_then_topics() {
        let results = collect_results(&sample(), 5);
        assert_eq!(results.len(), 3);
        assert!(results[0].starts_with("Python (programming language): Python is"));
        assert!(results[1].contains("Python 3.13"));
        assert_eq!(
            results[2],
            "CPython - reference implementation (https://duckduckgo.com/CPython)"
        );
    }

    #[test]
    fn limit_truncates_results() {
        assert_eq!(collect_results(&sample(), 1).len(), 1);
    }

    #[test]
    fn empty_body_has_no_results() {
        assert!(collect_results(&InstantAnswer::default(), 5).is_empty());
    }

    #[test]
    fn direct_answer_is_included() {
        let body: InstantAnswer =
            serde_json::from_value(json!({"Answer": "42", "RelatedTopics": []})).unwrap();
        assert_eq!(collect_results(&body, 5), vec!["42".to_string()]);
    }

    #[tokio::test]
    async fn empty_query_rejected_before_network() {
        let tool = WebSearchTool::new(reqwest::Client::new(), "http://127.0.0.1:9");
        let mut args = Map::new();
        args.insert("query".into(), json!(""));
        assert!(matches!(tool.invoke(args).await, Err(ToolError::InvalidArguments { .. })));
    }
}
