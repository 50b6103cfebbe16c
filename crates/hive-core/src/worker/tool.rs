//! Abstract [`Tool`] interface and [`ToolRegistry`], grounded in
//! `worker.py`'s per-role tool maps and the `Harness` trait's
//! object-safety-plus-registry pattern in `gator-core`.
//!
//! Implementing tools (web search, shell exec, file ops, ...) is
//! explicitly out of scope for the core; this module only validates
//! names against a per-role allowlist and dispatches through the trait.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ToolError;
use crate::task::WorkerRole;

/// The result of a [`Tool::call`], per spec §6:
/// `Invoke(name, args) -> {text, structured?, errorKind?}`.
#[derive(Debug, Clone, Default)]
pub struct ToolResult {
    pub text: String,
    pub structured: Option<Value>,
}

/// An externally-implemented capability a [`super::Worker`] may invoke.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The name workers reference via `TOOL:<name>`.
    fn name(&self) -> &str;

    /// Invoke the tool with `args`, the parsed `PARAMS:` JSON object.
    async fn call(&self, args: &Value) -> Result<ToolResult, ToolError>;
}

const _: () = {
    fn _assert_object_safe(_: &dyn Tool) {}
};

/// Registered tools, looked up by name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, tool: Arc<dyn Tool>) {
        self.tools.insert(tool.name().to_string(), tool);
    }

    /// Invoke `name` with `args` if it exists and is allowed for `role`,
    /// otherwise return the appropriate [`ToolError`] without ever
    /// crashing the calling worker.
    pub async fn invoke(
        &self,
        role: WorkerRole,
        name: &str,
        args: &Value,
    ) -> Result<ToolResult, ToolError> {
        if !allowed_for_role(role, name) {
            return Err(ToolError::NotAllowed {
                tool: name.to_string(),
                role: role.to_string(),
            });
        }
        let Some(tool) = self.tools.get(name) else {
            return Err(ToolError::NotFound(name.to_string()));
        };
        tool.call(args).await
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.tools.keys().collect::<Vec<_>>())
            .finish()
    }
}

/// Role-specific tool allowlist, mirroring `worker.py::_initialize_tools`:
/// every role gets `memory_search`/`memory_store` plus a small set of
/// role-specific tools. Kept as a `match` table rather than externalized
/// configuration, the same way `gator-core` inlines its small,
/// fixed lookup tables (e.g. `state::is_valid_transition`) and reserves
/// `include_str!`-loaded TOML for genuinely large, user-editable tables
/// like its invariant presets.
fn allowed_for_role(role: WorkerRole, tool: &str) -> bool {
    if tool == "memory_search" || tool == "memory_store" {
        return true;
    }
    let role_tools: &[&str] = match role {
        WorkerRole::Researcher => &["web_search", "data_extraction"],
        WorkerRole::Executor => &["shell_execute", "file_operation", "browser_control"],
        WorkerRole::Auditor => &["code_review", "security_scan"],
        WorkerRole::Coder => &["code_generate", "code_debug", "test_generate"],
        WorkerRole::Analyst => &["data_analysis", "report_generate"],
        WorkerRole::Creative => &["content_generate", "design_concept"],
        WorkerRole::General => &[],
    };
    role_tools.contains(&tool)
}
