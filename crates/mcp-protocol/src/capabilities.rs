use serde::{Deserialize, Serialize};

/// Capabilities advertised by a server during `initialize`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tools: Option<ToolsCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompts: Option<PromptsCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resources: Option<ResourcesCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub logging: Option<LoggingCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub completions: Option<CompletionsCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<ServerTasksCapability>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolsCapability {
    #[serde(default, rename = "listChanged")]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PromptsCapability {
    #[serde(default, rename = "listChanged")]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResourcesCapability {
    #[serde(default, rename = "listChanged")]
    pub list_changed: bool,
    #[serde(default)]
    pub subscribe: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LoggingCapability {}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompletionsCapability {}

/// Which requests the server will augment with task metadata, plus
/// `tasks/list` and `tasks/cancel` support flags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServerTasksCapability {
    #[serde(default)]
    pub requests: TaskAugmentedRequests,
    #[serde(default)]
    pub list: bool,
    #[serde(default)]
    pub cancel: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskAugmentedRequests {
    #[serde(default, rename = "tools.call")]
    pub tools_call: bool,
    #[serde(default, rename = "sampling.createMessage")]
    pub sampling_create_message: bool,
    #[serde(default, rename = "elicitation.create")]
    pub elicitation_create: bool,
}

impl TaskAugmentedRequests {
    pub fn allows(&self, method: &str) -> bool {
        match method {
            "tools/call" => self.tools_call,
            "sampling/createMessage" => self.sampling_create_message,
            "elicitation/create" => self.elicitation_create,
            _ => false,
        }
    }
}

/// Capabilities advertised by a client during `initialize`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientCapabilities {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sampling: Option<SamplingCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub roots: Option<RootsCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elicitation: Option<ElicitationCapability>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tasks: Option<ClientTasksCapability>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SamplingCapability {
    /// Deprecated `thisServer`/`allServers` sampling context: accepted on the
    /// wire, surfaced as declared-only, never emitted by this runtime.
    #[serde(default)]
    pub context: bool,
    #[serde(default)]
    pub tools: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RootsCapability {
    #[serde(default, rename = "listChanged")]
    pub list_changed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ElicitationCapability {
    #[serde(default)]
    pub form: bool,
    #[serde(default)]
    pub url: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClientTasksCapability {
    #[serde(default)]
    pub list: bool,
    #[serde(default)]
    pub cancel: bool,
}

/// `{name, version}` pair attached to `initialize`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Implementation {
    pub name: String,
    pub version: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn task_augmented_requests_gate_by_method() {
        let gate = TaskAugmentedRequests {
            tools_call: true,
            sampling_create_message: false,
            elicitation_create: false,
        };
        assert!(gate.allows("tools/call"));
        assert!(!gate.allows("sampling/createMessage"));
        assert!(!gate.allows("unknown/method"));
    }
}
