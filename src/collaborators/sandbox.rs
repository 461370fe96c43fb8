use crate::error::CollaboratorError;
use async_trait::async_trait;

/// Result of a `coding` step: the snippet executed plus its output.
#[derive(Debug, Clone)]
pub struct SandboxSolution {
    pub source_code: String,
    pub output: String,
}

#[async_trait]
pub trait CodeSandbox: Send + Sync {
    async fn solve(&self, issue: &str, context: &str) -> Result<SandboxSolution, CollaboratorError>;
}

/// Default when no sandbox is configured: the `coding` action is accepted
/// by the scheduler like any other, but fails fast rather than hanging —
/// the scheduler treats this the same as any other collaborator error and
/// continues with a diary note.
pub struct UnavailableSandbox;

#[async_trait]
impl CodeSandbox for UnavailableSandbox {
    async fn solve(&self, _issue: &str, _context: &str) -> Result<SandboxSolution, CollaboratorError> {
        Err(CollaboratorError::Sandbox(
            "no code sandbox is configured".into(),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unavailable_sandbox_always_errors() {
        let sandbox = UnavailableSandbox;
        assert!(sandbox.solve("issue", "ctx").await.is_err());
    }
}
