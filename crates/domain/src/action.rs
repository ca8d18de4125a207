//! The action record returned by the state machine for each input.
//!
//! Explicit fields instead of a bag of flags in a map: the frame
//! processor guards the bookkeeping at the call site.

use serde::{Deserialize, Serialize};

use crate::tool::{ToolName, ToolRequest};

/// What the pipeline must do next.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Action {
    /// Canned utterance to synthesize directly, bypassing the LLM.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speak: Option<String>,
    /// Forward the caller's utterance to the LLM for a generated reply.
    pub needs_llm: bool,
    /// Tool to invoke before anything else.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<ToolRequest>,
    /// Fire-and-forget notification dispatched ahead of `tool`. Its
    /// result is logged, never routed to a result handler.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub alert: Option<ToolRequest>,
    /// Terminate the call after the reply.
    pub end_call: bool,
}

impl Action {
    /// Hand the utterance to the LLM; no side effects.
    pub fn llm() -> Self {
        Self {
            needs_llm: true,
            ..Self::default()
        }
    }

    /// Speak a canned line; the LLM stays out of it.
    pub fn canned(line: impl Into<String>) -> Self {
        Self {
            speak: Some(line.into()),
            ..Self::default()
        }
    }

    /// No speech, no LLM; a tool-result handler will produce the next step.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn with_tool(mut self, name: ToolName, arguments: serde_json::Value) -> Self {
        self.tool = Some(ToolRequest { name, arguments });
        self
    }

    pub fn with_alert(mut self, name: ToolName, arguments: serde_json::Value) -> Self {
        self.alert = Some(ToolRequest { name, arguments });
        self
    }

    pub fn with_llm(mut self) -> Self {
        self.needs_llm = true;
        self
    }

    pub fn ending_call(mut self) -> Self {
        self.end_call = true;
        self
    }
}
