use async_trait::async_trait;
use raftline_core::{Command, CommandResult, Result, StateMachine};

/// Disabled-backend mode: the applier still advances `lastApplied`
/// and resolves completion handles, but no command is ever actually
/// executed against a real back end.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullStateMachine;

#[async_trait]
impl StateMachine for NullStateMachine {
    async fn apply(&self, _command: &Command) -> Result<CommandResult> {
        Ok(CommandResult::None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use raftline_core::CommandType;

    #[tokio::test]
    async fn always_resolves_with_none() {
        let sm = NullStateMachine;
        let result = sm
            .apply(&Command::new(CommandType::NewBid, Bytes::new()))
            .await
            .unwrap();
        assert!(matches!(result, CommandResult::None));
    }
}
