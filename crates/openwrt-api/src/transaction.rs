// Commit-or-revert state machine
//
//   Committing ──ok──▶ Committed
//       │
//      err
//       ▼
//   RevertingAfterFailedCommit ──ok──▶ Reverted
//       │
//      err
//       ▼
//   RevertFailed
//
// `revert` runs only out of `RevertingAfterFailedCommit`, and that state is
// entered only from a failed commit. Both terminal failure states surface
// the commit error; `RevertFailed` carries the revert error alongside it.

use std::future::Future;

use tracing::{debug, warn};

use crate::error::{Error, TransactionError};

enum TransactionState {
    Committing,
    Committed,
    RevertingAfterFailedCommit { commit: Error },
    Reverted { commit: Error },
    RevertFailed { commit: Error, revert: Error },
}

/// Drive one commit-or-revert over `sections`.
///
/// `commit` runs exactly once. `revert` runs exactly once if the commit
/// failed, and never otherwise.
pub(crate) async fn run<C, CF, R, RF>(sections: &[&str], commit: C, revert: R) -> Result<(), Error>
where
    C: Fn() -> CF,
    CF: Future<Output = Result<(), Error>>,
    R: Fn() -> RF,
    RF: Future<Output = Result<(), Error>>,
{
    let mut state = TransactionState::Committing;
    loop {
        state = match state {
            TransactionState::Committing => match commit().await {
                Ok(()) => TransactionState::Committed,
                Err(commit) => {
                    warn!(?sections, error = %commit, "commit failed, reverting pending changes");
                    TransactionState::RevertingAfterFailedCommit { commit }
                }
            },
            TransactionState::RevertingAfterFailedCommit { commit } => match revert().await {
                Ok(()) => TransactionState::Reverted { commit },
                Err(revert) => TransactionState::RevertFailed { commit, revert },
            },
            TransactionState::Committed => {
                debug!(?sections, "changes committed");
                return Ok(());
            }
            TransactionState::Reverted { commit } => {
                return Err(TransactionError::new(sections, commit, None).into());
            }
            TransactionState::RevertFailed { commit, revert } => {
                warn!(?sections, error = %revert, "revert failed, pending changes left on device");
                return Err(TransactionError::new(sections, commit, Some(revert)).into());
            }
        };
    }
}
