use fail::fail_point;

use crate::bail;
use crate::error::{ErrorKind, SyncResult};

/// Fails the batch commit before anything is written.
pub const COMMIT_BEFORE_BATCH: &str = "commit.before_batch";

/// Fails a mirror event before it reaches the warehouse.
pub const MIRROR_BEFORE_APPLY: &str = "mirror.before_apply";

/// Returns an error when the named failpoint is active.
///
/// The failpoint parameter selects the error kind: `commit` (default) or `warehouse`.
pub fn sync_fail_point(name: &str) -> SyncResult<()> {
    fail_point!(name, |parameter| {
        let kind = match parameter.as_deref() {
            Some("warehouse") => ErrorKind::MirrorWriteFailure,
            _ => ErrorKind::CommitFailure,
        };

        bail!(
            kind,
            "An error occurred in a fail point",
            format!("The failpoint '{name}' returned an error")
        );
    });

    Ok(())
}
