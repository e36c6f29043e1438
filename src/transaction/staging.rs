//! Per-file staging decisions.
//!
//! A put either opens the destination for add, opens it for edit after a
//! no-merge sync, or is skipped because the file exists and overwrite is off.
//! Nothing is submitted here.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::store::{ChangelistId, DepotPath, HeadState, RemoteError, RemoteStore};
use crate::transaction::error::{CopyError, PublishResult};
use crate::transaction::workspace::Workspace;

/// how a destination is opened
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageMode {
    Add,
    Edit,
}

impl fmt::Display for StageMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageMode::Add => write!(f, "add"),
            StageMode::Edit => write!(f, "edit"),
        }
    }
}

/// result of one put
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Staged(StageMode),
    /// the destination exists and overwrite was off
    Skipped,
}

/// a put that was opened against the changelist
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StagedOperation {
    pub source: PathBuf,
    pub destination: DepotPath,
    pub mode: StageMode,
    pub overwrite: bool,
}

/// decide how to open a destination; None means skip
pub fn resolve_mode(head: &HeadState, overwrite: bool) -> Option<StageMode> {
    match (head.exists(), overwrite) {
        (true, false) => None,
        (true, true) => Some(StageMode::Edit),
        (false, _) => Some(StageMode::Add),
    }
}

/// copy `source` to `target`, creating parent directories
///
/// returns the number of bytes copied.
pub fn copy_payload(source: &Path, target: &Path) -> Result<u64, CopyError> {
    if let Some(dir) = target.parent() {
        std::fs::create_dir_all(dir).map_err(|e| CopyError::MissingParent {
            dir: dir.to_path_buf(),
            source: e,
        })?;
    }

    let io_err = |e: io::Error| CopyError::Io {
        from: source.to_path_buf(),
        to: target.to_path_buf(),
        source: e,
    };

    let mut reader = File::open(source).map_err(io_err)?;
    let mut writer = File::create(target).map_err(io_err)?;
    let copied = io::copy(&mut reader, &mut writer).map_err(io_err)?;
    writer.sync_all().map_err(io_err)?;
    Ok(copied)
}

/// Stage one put against the changelist.
///
/// returns None when the put was skipped.
pub fn stage<S: RemoteStore>(
    store: &S,
    workspace: &Workspace,
    change: ChangelistId,
    source: &Path,
    destination: &DepotPath,
    overwrite: bool,
) -> PublishResult<Option<StagedOperation>> {
    let head = store.head_state(destination)?;

    let Some(mode) = resolve_mode(&head, overwrite) else {
        info!(
            workspace = %workspace.name(),
            path = %destination,
            "destination exists and overwrite is off; skipping"
        );
        return Ok(None);
    };

    let local = workspace.local_path(destination).ok_or_else(|| {
        RemoteError::request(format!(
            "{} is outside the workspace view {}",
            destination,
            workspace.view()
        ))
    })?;

    let bytes = copy_payload(source, &local)?;

    let targets = std::slice::from_ref(destination);
    match mode {
        StageMode::Add => store.stage_add(targets, change)?,
        StageMode::Edit => {
            store.sync_no_merge(targets)?;
            store.stage_edit(targets, change)?;
        }
    }

    debug!(
        workspace = %workspace.name(),
        change = %change,
        path = %destination,
        mode = %mode,
        bytes,
        "staged file"
    );

    Ok(Some(StagedOperation {
        source: source.to_path_buf(),
        destination: destination.clone(),
        mode,
        overwrite,
    }))
}
