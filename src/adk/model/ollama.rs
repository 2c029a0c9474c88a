// SPDX-License-Identifier: MIT

//! Ollama Model - local chat API implementation

use super::{Content, GenerationConfig, Model, Part, ROLE_MODEL, ROLE_TOOL};
use crate::adk::error::ModelError;
use crate::adk::tool::Tool;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::env;
use std::sync::Arc;

pub const DEFAULT_BASE_URL: &str = "http://localhost:11434";
pub const DEFAULT_MODEL: &str = "granite3.1-dense:8b";

/// Chat model served by an Ollama instance
pub struct OllamaChatModel {
    client: Client,
    model_name: String,
    base_url: String,
}

impl OllamaChatModel {
    /// Create a new OllamaChatModel
    ///
    /// Uses `OLLAMA_BASE_URL` when set, otherwise the local default.
    pub fn new(model_name: impl Into<String>) -> Self {
        let base_url = env::var("OLLAMA_BASE_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        Self::with_base_url(model_name, base_url)
    }

    /// Create a model using `OLLAMA_MODEL`, falling back to [`DEFAULT_MODEL`]
    pub fn from_env() -> Self {
        let model_name = env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        Self::new(model_name)
    }

    pub fn with_base_url(model_name: impl Into<String>, base_url: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model_name: model_name.into(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    pub fn model_name(&self) -> &str {
        &self.model_name
    }

    /// Convert internal Content to Ollama messages
    ///
    /// A single Content may expand to several messages: every function
    /// response becomes its own `tool` message.
    fn content_to_messages(content: &Content) -> Vec<Value> {
        let role = match content.role.as_str() {
            ROLE_MODEL => "assistant",
            other => other,
        };

        let responses: Vec<Value> = content
            .parts
            .iter()
            .filter_map(|part| match part {
                Part::FunctionResponse { name, response } => Some(json!({
                    "role": ROLE_TOOL,
                    "tool_name": name,
                    "content": serde_json::to_string(response).unwrap_or_default()
                })),
                _ => None,
            })
            .collect();
        if !responses.is_empty() {
            return responses;
        }

        let mut text = String::new();
        let mut tool_calls = Vec::new();
        for part in &content.parts {
            match part {
                Part::Text(t) => text.push_str(t),
                Part::FunctionCall { name, args } => tool_calls.push(json!({
                    "function": { "name": name, "arguments": args }
                })),
                Part::Thinking(_) | Part::FunctionResponse { .. } => {}
            }
        }

        let mut message = json!({ "role": role, "content": text });
        if !tool_calls.is_empty() {
            message["tool_calls"] = json!(tool_calls);
        }
        vec![message]
    }

    fn tools_to_ollama_format(tools: &[Arc<dyn Tool>]) -> Vec<Value> {
        tools
            .iter()
            .map(|t| {
                json!({
                    "type": "function",
                    "function": {
                        "name": t.name(),
                        "description": t.description(),
                        "parameters": t.schema()
                    }
                })
            })
            .collect()
    }

    fn build_request(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Value {
        let messages: Vec<Value> = history.iter().flat_map(Self::content_to_messages).collect();

        let mut body = json!({
            "model": self.model_name,
            "messages": messages,
            "stream": false
        });

        if let Some(cfg) = config {
            let mut options = serde_json::Map::new();
            if let Some(temp) = cfg.temperature {
                options.insert("temperature".to_string(), json!(temp));
            }
            if let Some(max_tokens) = cfg.max_output_tokens {
                options.insert("num_predict".to_string(), json!(max_tokens));
            }
            if let Some(top_p) = cfg.top_p {
                options.insert("top_p".to_string(), json!(top_p));
            }
            if let Some(top_k) = cfg.top_k {
                options.insert("top_k".to_string(), json!(top_k));
            }
            if !options.is_empty() {
                body["options"] = Value::Object(options);
            }
            if let Some(schema) = &cfg.response_schema {
                body["format"] = schema.clone();
            }
        }

        if let Some(tools) = tools {
            if !tools.is_empty() {
                body["tools"] = json!(Self::tools_to_ollama_format(tools));
            }
        }

        body
    }

    /// Parse an Ollama chat response into Content
    fn parse_response(response: &Value) -> Result<Content, ModelError> {
        let message = response
            .get("message")
            .ok_or_else(|| ModelError::InvalidResponse("missing message".to_string()))?;

        let mut parts = Vec::new();

        if let Some(thinking) = message["thinking"].as_str() {
            if !thinking.is_empty() {
                parts.push(Part::Thinking(thinking.to_string()));
            }
        }

        if let Some(content) = message["content"].as_str() {
            if !content.is_empty() {
                parts.push(Part::Text(content.to_string()));
            }
        }

        if let Some(tool_calls) = message["tool_calls"].as_array() {
            for tc in tool_calls {
                let name = tc["function"]["name"].as_str().ok_or_else(|| {
                    ModelError::InvalidResponse("tool call without function name".to_string())
                })?;
                // Some models send arguments as an encoded JSON string
                let args = match &tc["function"]["arguments"] {
                    Value::String(s) => serde_json::from_str(s).map_err(|e| {
                        ModelError::InvalidResponse(format!(
                            "arguments of tool call {} are not valid JSON: {}",
                            name, e
                        ))
                    })?,
                    Value::Null => json!({}),
                    other => other.clone(),
                };
                parts.push(Part::FunctionCall {
                    name: name.to_string(),
                    args,
                });
            }
        }

        Ok(Content {
            role: ROLE_MODEL.to_string(),
            parts,
        })
    }
}

#[async_trait]
impl Model for OllamaChatModel {
    async fn generate_content(
        &self,
        history: &[Content],
        config: Option<&GenerationConfig>,
        tools: Option<&[Arc<dyn Tool>]>,
    ) -> Result<Content, ModelError> {
        let url = format!("{}/api/chat", self.base_url);
        let body = self.build_request(history, config, tools);

        log::debug!(
            "Ollama request body: {}",
            serde_json::to_string_pretty(&body).unwrap_or_default()
        );

        let resp = self.client.post(&url).json(&body).send().await?;

        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await?;
            return Err(ModelError::Api {
                provider: "Ollama".to_string(),
                status: status.as_u16(),
                message,
            });
        }

        let resp_json: Value = resp.json().await?;
        log::debug!("Ollama response: {}", resp_json);

        Self::parse_response(&resp_json)
    }
}
