//! Bounded workflow recursion.
//!
//! A workflow invoking itself (or a sub-workflow) pushes a frame holding
//! the parent context and return point. Pushing past `max_depth` fails
//! with the parent context untouched; popping restores it.

use crate::context::ExecutionContext;
use crate::error::{PatternError, PatternResult};
use serde::{Deserialize, Serialize};
use tracing::debug;

/// One recursion stack frame
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecursionFrame {
    pub depth: usize,
    pub parent_context: ExecutionContext,
    pub return_point: String,
    pub workflow_id: String,
}

/// Enforces the recursion depth bound
#[derive(Debug, Clone)]
pub struct RecursionManager {
    pub max_depth: usize,
}

impl Default for RecursionManager {
    fn default() -> Self {
        Self { max_depth: 100 }
    }
}

impl RecursionManager {
    pub fn new(max_depth: usize) -> Self {
        Self { max_depth }
    }

    /// Push a frame for a recursive invocation. `current` is None for the
    /// root call.
    pub fn push_frame(
        &self,
        current: Option<&RecursionFrame>,
        workflow_id: &str,
        return_point: &str,
        context: &ExecutionContext,
    ) -> PatternResult<RecursionFrame> {
        let depth = current.map(|f| f.depth + 1).unwrap_or(0);
        if depth >= self.max_depth {
            return Err(PatternError::MaxRecursionExceeded(self.max_depth));
        }
        debug!(workflow_id, depth, "recursion frame pushed");
        Ok(RecursionFrame {
            depth,
            parent_context: context.clone(),
            return_point: return_point.to_string(),
            workflow_id: workflow_id.to_string(),
        })
    }

    /// Pop a frame, restoring the parent context
    pub fn pop_frame(&self, frame: RecursionFrame) -> ExecutionContext {
        debug!(
            workflow_id = %frame.workflow_id,
            depth = frame.depth,
            "recursion frame popped"
        );
        frame.parent_context
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn push_increments_depth() {
        let manager = RecursionManager::default();
        let ctx = ExecutionContext::new();
        let root = manager.push_frame(None, "wf-1", "start", &ctx).unwrap();
        assert_eq!(root.depth, 0);

        let child = manager
            .push_frame(Some(&root), "wf-1", "after-call", &ctx)
            .unwrap();
        assert_eq!(child.depth, 1);
    }

    #[test]
    fn exceeding_max_depth_fails_with_parent_untouched() {
        let manager = RecursionManager::new(3);
        let mut ctx = ExecutionContext::new();
        ctx.set("budget", json!(42));

        let mut frame = manager.push_frame(None, "wf-1", "p0", &ctx).unwrap();
        for i in 1..3 {
            frame = manager
                .push_frame(Some(&frame), "wf-1", &format!("p{i}"), &ctx)
                .unwrap();
        }

        let err = manager
            .push_frame(Some(&frame), "wf-1", "p3", &ctx)
            .unwrap_err();
        assert!(matches!(err, PatternError::MaxRecursionExceeded(3)));
        // Parent context unchanged by the failed push
        assert_eq!(ctx.get("budget"), Some(&json!(42)));
        assert_eq!(frame.depth, 2);
    }

    #[test]
    fn pop_restores_parent_context() {
        let manager = RecursionManager::default();
        let mut parent_ctx = ExecutionContext::new();
        parent_ctx.set("caller_var", json!("kept"));

        let frame = manager
            .push_frame(None, "wf-sub", "resume-here", &parent_ctx)
            .unwrap();

        // The recursive call mutates its own context freely
        let mut child_ctx = ExecutionContext::new();
        child_ctx.set("scratch", json!(99));

        let restored = manager.pop_frame(frame);
        assert_eq!(restored.get("caller_var"), Some(&json!("kept")));
        assert!(restored.get("scratch").is_none());
    }
}
