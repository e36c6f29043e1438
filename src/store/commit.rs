//! Commit creation and history traversal
//!
//! commits are the atomic units of change in the depot:
//! - each submitted changelist becomes exactly one commit on main
//! - administrative deletes are commits too
//! - a file's revisions are the commits that changed its blob
//!
//! this module handles commit creation, history walking and per-file history.

use chrono::{DateTime, TimeZone, Utc};
use git2::{Repository, Revwalk, Sort, Tree};

use crate::store::blob::{BlobId, BlobMetadata};
use crate::store::error::{RemoteError, RemoteResult};
use crate::store::tree::{blob_id_at, create_initial_tree};
use crate::store::types::{ChangelistId, CommitId, DepotPath, FileAction, GitSignature, TreeId};

/// information about a commit
#[derive(Debug, Clone)]
pub struct CommitInfo {
    pub id: CommitId,
    pub tree_id: TreeId,
    pub parent_ids: Vec<CommitId>,
    pub message: String,
    pub author_name: String,
    pub author_email: String,
    pub timestamp: DateTime<Utc>,
}

impl CommitInfo {
    /// create CommitInfo from a git2::Commit
    pub(crate) fn from_git2(commit: &git2::Commit<'_>) -> Self {
        let author = commit.author();
        let time = commit.time();
        let timestamp = Utc
            .timestamp_opt(time.seconds(), 0)
            .single()
            .unwrap_or_else(Utc::now);

        Self {
            id: CommitId::new(commit.id()),
            tree_id: TreeId::new(commit.tree_id()),
            parent_ids: commit.parent_ids().map(CommitId::new).collect(),
            message: commit.message().unwrap_or("").to_string(),
            author_name: author.name().unwrap_or("unknown").to_string(),
            author_email: author.email().unwrap_or("unknown@unknown").to_string(),
            timestamp,
        }
    }

    /// get the first (or only) parent
    pub fn first_parent(&self) -> Option<CommitId> {
        self.parent_ids.first().copied()
    }

    /// get a short summary of the commit (first line of message)
    pub fn summary(&self) -> &str {
        self.message.lines().next().unwrap_or(&self.message)
    }
}

/// builder for creating commits with a fluent interface
///
/// never moves a ref; callers publish the commit with
/// `RefManager::update_main_if_unchanged`.
pub struct CommitBuilder<'a> {
    repo: &'a Repository,
    tree_id: Option<TreeId>,
    parents: Vec<CommitId>,
    message: String,
    signature: GitSignature,
}

impl<'a> CommitBuilder<'a> {
    /// create a new CommitBuilder
    pub fn new(repo: &'a Repository) -> Self {
        Self {
            repo,
            tree_id: None,
            parents: Vec::new(),
            message: String::new(),
            signature: GitSignature::depot(),
        }
    }

    /// set the tree for this commit
    pub fn tree(mut self, tree_id: TreeId) -> Self {
        self.tree_id = Some(tree_id);
        self
    }

    /// add a parent commit
    pub fn parent(mut self, parent: CommitId) -> Self {
        self.parents.push(parent);
        self
    }

    /// set the commit message
    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// set the author/committer signature
    pub fn signature(mut self, signature: GitSignature) -> Self {
        self.signature = signature;
        self
    }

    /// create the commit and return its ID
    pub fn commit(self) -> RemoteResult<CommitId> {
        let tree_id = self.tree_id.ok_or_else(|| RemoteError::CorruptedData {
            path: String::new(),
            reason: "commit requires a tree".to_string(),
        })?;

        let tree = self.repo.find_tree(tree_id.raw())?;
        let sig = self.signature.to_git2_signature()?;

        // collect parent commits
        let parent_commits: Vec<git2::Commit<'_>> = self
            .parents
            .iter()
            .map(|id| self.repo.find_commit(id.raw()))
            .collect::<Result<_, _>>()?;

        let parent_refs: Vec<&git2::Commit<'_>> = parent_commits.iter().collect();

        let oid = self
            .repo
            .commit(None, &sig, &sig, &self.message, &tree, &parent_refs)?;

        Ok(CommitId::new(oid))
    }
}

/// get information about a commit
pub fn get_commit(repo: &Repository, id: CommitId) -> RemoteResult<CommitInfo> {
    let commit = repo.find_commit(id.raw())?;
    Ok(CommitInfo::from_git2(&commit))
}

/// get the tree snapshot at a specific commit
pub fn get_tree_at_commit(repo: &Repository, commit_id: CommitId) -> RemoteResult<Tree<'_>> {
    let commit = repo.find_commit(commit_id.raw())?;
    Ok(commit.tree()?)
}

/// create the root commit of a new depot
pub fn create_initial_commit(repo: &Repository, signature: &GitSignature) -> RemoteResult<CommitId> {
    let tree_id = create_initial_tree(repo)?;

    CommitBuilder::new(repo)
        .tree(tree_id)
        .message(CommitMessage::initial())
        .signature(signature.clone())
        .commit()
}

/// iterate over commit history starting from a commit
pub struct HistoryIterator<'repo> {
    repo: &'repo Repository,
    revwalk: Revwalk<'repo>,
}

impl<'repo> HistoryIterator<'repo> {
    /// create a new history iterator
    pub fn new(repo: &'repo Repository, start: CommitId) -> RemoteResult<Self> {
        let mut revwalk = repo.revwalk()?;
        revwalk.set_sorting(Sort::TIME | Sort::TOPOLOGICAL)?;
        revwalk.push(start.raw())?;

        Ok(Self { repo, revwalk })
    }

    /// only follow first parents
    pub fn first_parent_only(mut self) -> Self {
        self.revwalk.simplify_first_parent().ok();
        self
    }
}

impl<'repo> Iterator for HistoryIterator<'repo> {
    type Item = RemoteResult<CommitInfo>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.revwalk.next()? {
            Ok(oid) => match self.repo.find_commit(oid) {
                Ok(commit) => Some(Ok(CommitInfo::from_git2(&commit))),
                Err(e) => Some(Err(RemoteError::Git(e))),
            },
            Err(e) => Some(Err(RemoteError::Git(e))),
        }
    }
}

/// one revision of a depot file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileRevision {
    /// revision number, counting from 1
    pub revision: u32,
    pub commit: CommitId,
    pub action: FileAction,
    pub time: DateTime<Utc>,
    /// None for deletions
    pub blob: Option<BlobId>,
    pub size: Option<u64>,
    pub author: String,
    pub summary: String,
}

/// every revision of `path` reachable from `start`, oldest first
///
/// a commit is a revision of the file when the blob at `path` differs
/// from the blob in the commit's first parent.
pub fn file_history(
    repo: &Repository,
    start: CommitId,
    path: &DepotPath,
) -> RemoteResult<Vec<FileRevision>> {
    let mut newest_first = Vec::new();

    for info in HistoryIterator::new(repo, start)?.first_parent_only() {
        let info = info?;
        let tree = repo.find_tree(info.tree_id.raw())?;
        let current = blob_id_at(&tree, path)?;

        let previous = match info.first_parent() {
            Some(parent) => blob_id_at(&get_tree_at_commit(repo, parent)?, path)?,
            None => None,
        };

        let action = match (previous, current) {
            (None, Some(_)) => FileAction::Add,
            (Some(old), Some(new)) if old != new => FileAction::Edit,
            (Some(_), None) => FileAction::Delete,
            _ => continue,
        };

        let size = match current {
            Some(blob) => Some(BlobMetadata::load(repo, blob)?.size as u64),
            None => None,
        };

        newest_first.push((info, action, current, size));
    }

    let revisions = newest_first
        .into_iter()
        .rev()
        .enumerate()
        .map(|(i, (info, action, blob, size))| FileRevision {
            revision: i as u32 + 1,
            commit: info.id,
            action,
            time: info.timestamp,
            blob,
            size,
            summary: info.summary().to_string(),
            author: info.author_name,
        })
        .collect();

    Ok(revisions)
}

/// message formatting for depot operations
pub struct CommitMessage;

impl CommitMessage {
    /// message of the root commit
    pub fn initial() -> String {
        "[depot] initialize".to_string()
    }

    /// message for a submitted changelist
    pub fn submit(change: ChangelistId, description: &str) -> String {
        format!("[change {}] {}", change, description)
    }

    /// message for an administrative delete
    pub fn delete(path: &DepotPath) -> String {
        format!("[delete] {}", path)
    }
}
