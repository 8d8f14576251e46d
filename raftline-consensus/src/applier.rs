use std::sync::Arc;

use raftline_core::{Command, RaftlineError, RequestRouter, Result, StateMachine};

use crate::state::NodeState;

/// Drive `lastApplied` toward `commitIndex`, invoking the external state
/// machine in strictly increasing index order, resolving each entry's
/// completion handle, and notifying the request router.
///
/// Idempotent across repeated triggers: a call with `lastApplied ==
/// commitIndex` is a no-op. An `UnknownCommand` result from the back end
/// is a fatal programmer error and aborts the batch; any other
/// back-end error is fed to the submitter's completion handle and the
/// applier continues.
pub async fn run(
    state: &mut NodeState,
    state_machine: &Arc<dyn StateMachine>,
    router: &Arc<dyn RequestRouter>,
) -> Result<()> {
    loop {
        if state.volatile.last_applied.0 >= state.volatile.commit_index.0 {
            return Ok(());
        }
        let next = state.volatile.last_applied.next();
        let (command_type, payload) = match state.persistent.log.entry_at(next) {
            Some(entry) => (entry.command_type, entry.payload.clone()),
            None => return Ok(()),
        };

        let command = Command::new(command_type, payload);
        let result = state_machine.apply(&command).await;
        let fatal = matches!(&result, Err(RaftlineError::UnknownCommand(_)));

        if let Ok(value) = &result {
            router.on_commit(next, value.clone());
        }
        if let Some(entry) = state.persistent.log.entry_at_mut(next) {
            if let Some(handle) = entry.completion_handle.take() {
                let _ = handle.send(result);
            }
        }
        state.volatile.last_applied = next;

        if fatal {
            tracing::error!(index = %next, "unknown command type reached the applier");
            return Err(RaftlineError::UnknownCommand(format!(
                "unknown command type at index {next}"
            )));
        }
    }
}
