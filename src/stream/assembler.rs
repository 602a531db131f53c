use jsonschema::JSONSchema;
use serde_json::Value;
use std::collections::HashMap;
use tracing::warn;

use crate::query::{ToolCall, ToolSchema};

/// What one streamed fragment did to the assembly.
#[derive(Debug, Clone)]
pub enum AssemblerEvent {
    Started { id: String, name: String },
    Delta { id: String, fragment: String },
    /// The buffer parses as JSON and satisfies the declared schema.
    Completed(ToolCall),
    /// The buffer parses as JSON but violates the declared schema. Scoped
    /// to this one call; the rest of the stream is unaffected.
    SchemaViolation {
        id: String,
        name: String,
        message: String,
    },
}

struct PartialCall {
    id: String,
    name: String,
    buffer: String,
    done: bool,
}

/// Assembles streamed tool-call JSON per call position. A call completes
/// the instant its buffer parses as valid JSON matching the tool's declared
/// schema — never before.
pub struct ToolCallAssembler {
    calls: Vec<Option<PartialCall>>,
    schemas: HashMap<String, JSONSchema>,
}

impl ToolCallAssembler {
    pub fn new(tools: Option<&[ToolSchema]>) -> Self {
        let mut schemas = HashMap::new();
        for tool in tools.unwrap_or_default() {
            match JSONSchema::compile(&tool.parameters) {
                Ok(schema) => {
                    schemas.insert(tool.name.clone(), schema);
                }
                Err(e) => {
                    // An uncompilable schema cannot be enforced; arguments
                    // for this tool complete on parse alone.
                    warn!(tool = %tool.name, error = %e, "tool parameter schema does not compile");
                }
            }
        }
        Self {
            calls: Vec::new(),
            schemas,
        }
    }

    pub fn push(
        &mut self,
        index: usize,
        id: Option<String>,
        name: Option<String>,
        fragment: &str,
    ) -> Vec<AssemblerEvent> {
        let mut events = Vec::new();

        if index >= self.calls.len() {
            self.calls.resize_with(index + 1, || None);
        }
        if self.calls[index].is_none() {
            let call = PartialCall {
                id: id.unwrap_or_else(|| format!("call_{}", index)),
                name: name.unwrap_or_default(),
                buffer: String::new(),
                done: false,
            };
            events.push(AssemblerEvent::Started {
                id: call.id.clone(),
                name: call.name.clone(),
            });
            self.calls[index] = Some(call);
        }
        let call = self.calls[index].as_mut().expect("call slot just filled");
        if call.done {
            return events;
        }

        if !fragment.is_empty() {
            call.buffer.push_str(fragment);
            events.push(AssemblerEvent::Delta {
                id: call.id.clone(),
                fragment: fragment.to_string(),
            });
        }

        if let Ok(value) = serde_json::from_str::<Value>(&call.buffer) {
            call.done = true;
            match self.schemas.get(&call.name) {
                Some(schema) if !schema.is_valid(&value) => {
                    let message = schema
                        .validate(&value)
                        .err()
                        .map(|errors| {
                            errors
                                .map(|e| e.to_string())
                                .collect::<Vec<_>>()
                                .join("; ")
                        })
                        .unwrap_or_default();
                    events.push(AssemblerEvent::SchemaViolation {
                        id: call.id.clone(),
                        name: call.name.clone(),
                        message,
                    });
                }
                _ => {
                    let mut tool_call =
                        ToolCall::new(call.id.clone(), call.name.clone(), call.buffer.clone());
                    tool_call.parsed = Some(value);
                    events.push(AssemblerEvent::Completed(tool_call));
                }
            }
        }

        events
    }

    /// Calls whose buffers never parsed by the time the stream ended.
    pub fn unfinished(&self) -> Vec<(String, String)> {
        self.calls
            .iter()
            .flatten()
            .filter(|call| !call.done)
            .map(|call| (call.id.clone(), call.name.clone()))
            .collect()
    }
}
