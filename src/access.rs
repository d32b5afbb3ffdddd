//! Caller access policy for the tool boundary.
//!
//! Resolution order: admins pass, then a per-tool allowlist, then the global
//! open-access switch. A tool with no allowlist in a closed deployment is
//! admin-only.

use crate::config::AccessConfig;
use crate::error::ToolError;

pub struct AccessPolicy {
    config: AccessConfig,
}

impl AccessPolicy {
    pub fn new(config: AccessConfig) -> Self {
        AccessPolicy { config }
    }

    pub fn check(&self, tool: &str, caller: &str) -> Result<(), ToolError> {
        if self.config.admin_callers.iter().any(|c| c == caller) {
            return Ok(());
        }
        if let Some(allowed) = self.config.tool_allowlists.get(tool) {
            if allowed.iter().any(|c| c == caller) {
                return Ok(());
            }
            // An allowlist exists and the caller is not on it
            return Err(ToolError::AccessDenied {
                tool: tool.to_string(),
            });
        }
        if self.config.open_access {
            return Ok(());
        }
        Err(ToolError::AccessDenied {
            tool: tool.to_string(),
        })
    }
}
