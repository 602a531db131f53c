use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::classifier::{ComplexityTier, Domain};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
            tool_call_id: None,
            tool_calls: None,
        }
    }
}

/// A tool call produced by a model. `arguments` is the raw JSON buffer as
/// received (possibly assembled from streamed fragments); `parsed` is set
/// only once the buffer parses as valid JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    pub arguments: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parsed: Option<Value>,
    #[serde(default)]
    pub risk: crate::risk::RiskTier,
}

impl ToolCall {
    pub fn new(id: impl Into<String>, name: impl Into<String>, arguments: impl Into<String>) -> Self {
        let arguments = arguments.into();
        let parsed = serde_json::from_str(&arguments).ok();
        Self {
            id: id.into(),
            name: name.into(),
            arguments,
            parsed,
            risk: crate::risk::RiskTier::Low,
        }
    }
}

/// Declared schema for a tool the model may call. `parameters` is a JSON
/// Schema object in the same shape providers accept.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSchema {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// A caller-supplied classification. Hints are trusted verbatim and skip
/// the classifier entirely.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ClassificationHint {
    pub tier: ComplexityTier,
    pub domain: Option<Domain>,
}

/// One routable request. Immutable once handed to the executor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Query {
    pub id: String,
    pub messages: Vec<Message>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSchema>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<ClassificationHint>,
    #[serde(default)]
    pub force_direct: bool,
}

impl Query {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            messages,
            tools: None,
            max_tokens: None,
            temperature: None,
            hint: None,
            force_direct: false,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(vec![Message::user(content)])
    }

    pub fn with_tools(mut self, tools: Vec<ToolSchema>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn with_hint(mut self, hint: ClassificationHint) -> Self {
        self.hint = Some(hint);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn force_direct(mut self) -> Self {
        self.force_direct = true;
        self
    }

    /// Concatenated text of user messages, the input to classification and
    /// semantic alignment.
    pub fn user_text(&self) -> String {
        self.messages
            .iter()
            .filter(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
            .collect::<Vec<_>>()
            .join("\n")
    }

    pub fn has_tools(&self) -> bool {
        self.tools.as_ref().is_some_and(|t| !t.is_empty())
    }

    pub fn tool_schema(&self, name: &str) -> Option<&ToolSchema> {
        self.tools
            .as_ref()
            .and_then(|tools| tools.iter().find(|t| t.name == name))
    }
}
