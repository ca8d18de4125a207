//! The call-flow state graph.
//!
//! Ten vertices, classified as decision / action / terminal. The
//! state-to-tools mapping here is the structural rule that keeps tool
//! availability out of prompt text: decision states expose no tools,
//! action states expose exactly the one tool they execute, and only
//! terminal states may end the call.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::tool::ToolName;

/// A vertex in the call-flow graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum State {
    Welcome,
    Lookup,
    Safety,
    SafetyExit,
    ServiceArea,
    Discovery,
    Confirm,
    Booking,
    Done,
    Callback,
}

/// Classification of a state vertex.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StateClass {
    /// Makes routing choices without invoking a tool; exposes no tools.
    Decision,
    /// Exists solely to invoke one specific tool.
    Action,
    /// Only exit is ending the call.
    Terminal,
}

impl State {
    pub fn class(&self) -> StateClass {
        match self {
            State::Welcome
            | State::Safety
            | State::ServiceArea
            | State::Discovery
            | State::Confirm => StateClass::Decision,
            State::Lookup | State::Booking => StateClass::Action,
            State::SafetyExit | State::Done | State::Callback => StateClass::Terminal,
        }
    }

    /// The tools structurally available in this state.
    ///
    /// `ServiceArea` carries `EndCall` for the out-of-area branch only;
    /// the handler guards the condition.
    pub fn available_tools(&self) -> &'static [ToolName] {
        match self {
            State::Welcome | State::Safety | State::Discovery | State::Confirm => &[],
            State::Lookup => &[ToolName::LookupCaller],
            State::Booking => &[ToolName::BookService],
            State::ServiceArea => &[ToolName::EndCall],
            State::SafetyExit | State::Done => &[ToolName::EndCall],
            State::Callback => &[
                ToolName::CreateCallback,
                ToolName::SendSalesLeadAlert,
                ToolName::EndCall,
            ],
        }
    }

    pub fn allows_tool(&self, tool: ToolName) -> bool {
        self.available_tools().contains(&tool)
    }

    /// Outgoing edges of the flow graph. Escalation to `Callback` on
    /// counter overflow is universal and always permitted.
    pub fn can_transition_to(&self, next: State) -> bool {
        if next == State::Callback {
            return true;
        }
        match self {
            // Welcome skips straight to Safety when the caller's number
            // is unknown and there is nothing to look up.
            State::Welcome => matches!(next, State::Lookup | State::Safety),
            State::Lookup => matches!(next, State::Safety),
            State::Safety => matches!(next, State::ServiceArea | State::SafetyExit),
            State::ServiceArea => matches!(next, State::Discovery),
            State::Discovery => matches!(next, State::Confirm),
            State::Confirm => matches!(next, State::Booking),
            State::Booking => matches!(next, State::Done),
            State::SafetyExit | State::Done | State::Callback => false,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.class() == StateClass::Terminal
    }

    /// Whether this state expects a conversational reply from the caller.
    /// Used by the frame processor to decide on post-tool buffering.
    pub fn expects_conversation(&self) -> bool {
        self.class() == StateClass::Decision
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            State::Welcome => "welcome",
            State::Lookup => "lookup",
            State::Safety => "safety",
            State::SafetyExit => "safety_exit",
            State::ServiceArea => "service_area",
            State::Discovery => "discovery",
            State::Confirm => "confirm",
            State::Booking => "booking",
            State::Done => "done",
            State::Callback => "callback",
        }
    }
}

impl fmt::Display for State {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
