// SPDX-License-Identifier: MIT

use crate::adk::error::ToolError;
use crate::adk::tool::{parse_input, Tool};
use async_trait::async_trait;
use once_cell::sync::Lazy;
use reqwest::{Client, Url};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

const API_URL: &str = "https://api.duckduckgo.com/";
pub const DEFAULT_MAX_RESULTS: usize = 10;

static DUCKDUCKGO_SCHEMA: Lazy<Value> = Lazy::new(|| {
    json!({
        "type": "object",
        "properties": {
            "query": {
                "type": "string",
                "description": "The search query"
            }
        },
        "required": ["query"]
    })
});

#[derive(Debug, Deserialize)]
struct SearchArgs {
    query: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub description: String,
}

/// Web search through the DuckDuckGo instant-answer API; needs no API key
pub struct DuckDuckGoSearchTool {
    client: Client,
    max_results: usize,
}

impl DuckDuckGoSearchTool {
    pub fn new(max_results: usize) -> Self {
        Self {
            client: Client::new(),
            max_results,
        }
    }
}

impl Default for DuckDuckGoSearchTool {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RESULTS)
    }
}

/// Collect results from an instant-answer response, abstract first
pub fn parse_instant_answer(body: &Value, max_results: usize) -> Vec<SearchResult> {
    let mut results = Vec::new();

    let abstract_text = body["AbstractText"].as_str().unwrap_or_default();
    if !abstract_text.is_empty() {
        results.push(SearchResult {
            title: body["Heading"].as_str().unwrap_or_default().to_string(),
            url: body["AbstractURL"].as_str().unwrap_or_default().to_string(),
            description: abstract_text.to_string(),
        });
    }

    if let Some(topics) = body["RelatedTopics"].as_array() {
        collect_topics(topics, &mut results);
    }

    results.truncate(max_results);
    results
}

/// Topic groups nest their entries under `Topics`
fn collect_topics(topics: &[Value], results: &mut Vec<SearchResult>) {
    for topic in topics {
        if let Some(nested) = topic["Topics"].as_array() {
            collect_topics(nested, results);
            continue;
        }
        let (Some(text), Some(url)) = (topic["Text"].as_str(), topic["FirstURL"].as_str()) else {
            continue;
        };
        let title = text.split(" - ").next().unwrap_or(text);
        results.push(SearchResult {
            title: title.to_string(),
            url: url.to_string(),
            description: text.to_string(),
        });
    }
}

#[async_trait]
impl Tool for DuckDuckGoSearchTool {
    fn name(&self) -> &str {
        "duckduckgo"
    }

    fn description(&self) -> &str {
        "Search for online trends, news, current events, real-time information, or research topics."
    }

    fn schema(&self) -> &Value {
        &DUCKDUCKGO_SCHEMA
    }

    async fn execute(&self, input: Value) -> Result<Value, ToolError> {
        let args: SearchArgs = parse_input(input)?;
        if args.query.trim().is_empty() {
            return Err(ToolError::InputValidation("query must not be empty".to_string()));
        }

        let url = Url::parse_with_params(
            API_URL,
            &[
                ("q", args.query.as_str()),
                ("format", "json"),
                ("no_html", "1"),
                ("skip_disambig", "1"),
            ],
        )
        .map_err(|e| ToolError::Execution(e.to_string()))?;

        log::debug!("DuckDuckGo query: {}", args.query);
        let resp = self.client.get(url).send().await?;
        if !resp.status().is_success() {
            return Err(ToolError::Execution(format!(
                "DuckDuckGo returned {}",
                resp.status()
            )));
        }

        // The API answers with content-type application/x-javascript
        let text = resp.text().await?;
        let body: Value = serde_json::from_str(&text)?;
        let results = parse_instant_answer(&body, self.max_results);
        log::info!("DuckDuckGo returned {} results", results.len());

        Ok(json!({ "query": args.query, "results": results }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_response() -> Value {
        json!({
            "Heading": "Rust (programming language)",
            "AbstractText": "Rust is a general-purpose programming language.",
            "AbstractURL": "https://en.wikipedia.org/wiki/Rust_(programming_language)",
            "RelatedTopics": [
                {
                    "Text": "Cargo - The Rust package manager.",
                    "FirstURL": "https://duckduckgo.com/Cargo"
                },
                {
                    "Name": "See also",
                    "Topics": [
                        {
                            "Text": "Ferris - Unofficial mascot.",
                            "FirstURL": "https://duckduckgo.com/Ferris"
                        },
                        { "Result": "entry without text" }
                    ]
                },
                {
                    "Text": "Mozilla",
                    "FirstURL": "https://duckduckgo.com/Mozilla"
                }
            ]
        })
    }

    #[test]
    fn test_parse_abstract_and_topics() {
        let results = parse_instant_answer(&sample_response(), 10);

        let titles: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["Rust (programming language)", "Cargo", "Ferris", "Mozilla"]
        );
        assert_eq!(results[1].description, "Cargo - The Rust package manager.");
        assert_eq!(results[2].url, "https://duckduckgo.com/Ferris");
    }

    #[test]
    fn test_parse_caps_results() {
        let results = parse_instant_answer(&sample_response(), 2);
        assert_eq!(results.len(), 2);
        assert_eq!(results[1].title, "Cargo");
    }

    #[test]
    fn test_parse_empty_response() {
        let results = parse_instant_answer(&json!({"AbstractText": "", "RelatedTopics": []}), 5);
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_rejects_invalid_input() {
        let tool = DuckDuckGoSearchTool::default();

        let err = tool.execute(json!({})).await.unwrap_err();
        assert!(matches!(err, ToolError::InputValidation(_)));

        let err = tool.execute(json!({"query": "  "})).await.unwrap_err();
        assert!(matches!(err, ToolError::InputValidation(_)));
    }
}
