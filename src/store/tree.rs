//! tree operations for the depot file hierarchy.
//!
//! in git, a tree is a directory. the depot root tree holds one directory per
//! depot (`//depot/...` lives under `depot/`), and file revisions are blobs.
//! git trees are immutable, so every change rebuilds the chain of trees from
//! the changed leaf up to the root.

use std::path::Path;

use git2::{ErrorCode, FileMode, ObjectType, Oid, Repository, Tree};

use crate::store::blob::BlobId;
use crate::store::error::{RemoteError, RemoteResult};
use crate::store::types::{DepotPath, DirListing, TreeId};

/// look up the blob stored at a depot path
///
/// returns None when nothing is there, or when the path names a directory.
pub fn blob_id_at(tree: &Tree<'_>, path: &DepotPath) -> RemoteResult<Option<BlobId>> {
    match tree.get_path(Path::new(path.tree_path())) {
        Ok(entry) if entry.kind() == Some(ObjectType::Blob) => Ok(Some(BlobId::new(entry.id()))),
        Ok(_) => Ok(None),
        Err(e) if e.code() == ErrorCode::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// list the files and subdirectories directly under a depot directory
///
/// a missing directory lists as empty; a path naming a file is an error.
pub fn list_dir(repo: &Repository, tree: &Tree<'_>, dir: &DepotPath) -> RemoteResult<DirListing> {
    let entry = match tree.get_path(Path::new(dir.tree_path())) {
        Ok(entry) => entry,
        Err(e) if e.code() == ErrorCode::NotFound => return Ok(DirListing::default()),
        Err(e) => return Err(e.into()),
    };

    if entry.kind() != Some(ObjectType::Tree) {
        return Err(RemoteError::request(format!("{} is a file, not a directory", dir)));
    }

    let subtree = repo.find_tree(entry.id())?;
    let mut listing = DirListing::default();
    for child in subtree.iter() {
        let Some(name) = child.name() else { continue };
        match child.kind() {
            Some(ObjectType::Blob) => listing.files.push(name.to_string()),
            Some(ObjectType::Tree) => listing.dirs.push(name.to_string()),
            _ => {}
        }
    }
    Ok(listing)
}

/// A path-based tree builder for making changes.
///
/// this accumulates changes and produces a new root tree when finished.
/// the source tree is left untouched.
///
/// # Usage Pattern
///
/// ```ignore
/// let mut mutator = PathMutator::from_tree(repo, &tree);
/// mutator.upsert(&path, blob_id)?;
/// mutator.remove(&other)?;
/// let new_tree_id = mutator.write()?;
/// ```
pub struct PathMutator<'repo> {
    repo: &'repo Repository,
    /// current root; None until the first tree is written for an empty depot
    root: Option<Oid>,
}

impl<'repo> PathMutator<'repo> {
    /// create a new PathMutator from an existing tree
    pub fn from_tree(repo: &'repo Repository, tree: &Tree<'_>) -> Self {
        Self {
            repo,
            root: Some(tree.id()),
        }
    }

    /// create a new PathMutator for an empty tree
    pub fn empty(repo: &'repo Repository) -> Self {
        Self { repo, root: None }
    }

    /// insert or replace the file at `path`
    ///
    /// intermediate directories are created as needed. fails if a file
    /// sits where a directory is needed.
    pub fn upsert(&mut self, path: &DepotPath, blob_id: BlobId) -> RemoteResult<()> {
        let base = self.root.map(|id| self.repo.find_tree(id)).transpose()?;
        let segments: Vec<&str> = path.segments().collect();
        let new_root = upsert_at(self.repo, base.as_ref(), &segments, blob_id.raw(), path)?;
        self.root = Some(new_root);
        Ok(())
    }

    /// remove the file at `path`, pruning directories left empty
    pub fn remove(&mut self, path: &DepotPath) -> RemoteResult<()> {
        let base = match self.root {
            Some(id) => self.repo.find_tree(id)?,
            None => return Err(RemoteError::NotFound(path.clone())),
        };

        if blob_id_at(&base, path)?.is_none() {
            return Err(RemoteError::NotFound(path.clone()));
        }

        let segments: Vec<&str> = path.segments().collect();
        self.root = remove_at(self.repo, &base, &segments)?;
        Ok(())
    }

    /// write all changes and return the new root tree ID
    pub fn write(self) -> RemoteResult<TreeId> {
        match self.root {
            Some(id) => Ok(TreeId::new(id)),
            None => Ok(TreeId::new(self.repo.treebuilder(None)?.write()?)),
        }
    }
}

fn upsert_at(
    repo: &Repository,
    base: Option<&Tree<'_>>,
    segments: &[&str],
    blob: Oid,
    full_path: &DepotPath,
) -> RemoteResult<Oid> {
    let mut builder = repo.treebuilder(base)?;

    match segments {
        [] => return Err(RemoteError::request(format!("empty path: {}", full_path))),
        [name] => {
            if let Some(existing) = base.and_then(|t| t.get_name(name)) {
                if existing.kind() == Some(ObjectType::Tree) {
                    return Err(RemoteError::request(format!(
                        "{} is a directory in the depot",
                        full_path
                    )));
                }
            }
            builder.insert(*name, blob, FileMode::Blob.into())?;
        }
        [dir, rest @ ..] => {
            let child = match base.and_then(|t| t.get_name(dir)) {
                Some(entry) if entry.kind() == Some(ObjectType::Tree) => {
                    Some(repo.find_tree(entry.id())?)
                }
                Some(_) => {
                    return Err(RemoteError::request(format!(
                        "cannot create {}: '{}' is a file",
                        full_path, dir
                    )))
                }
                None => None,
            };
            let child_id = upsert_at(repo, child.as_ref(), rest, blob, full_path)?;
            builder.insert(*dir, child_id, FileMode::Tree.into())?;
        }
    }

    Ok(builder.write()?)
}

/// returns None when the tree became empty
fn remove_at(repo: &Repository, base: &Tree<'_>, segments: &[&str]) -> RemoteResult<Option<Oid>> {
    let mut builder = repo.treebuilder(Some(base))?;

    match segments {
        [] => {}
        [name] => builder.remove(*name)?,
        [dir, rest @ ..] => {
            let entry = base.get_name(dir).ok_or_else(|| RemoteError::CorruptedData {
                path: (*dir).to_string(),
                reason: "directory vanished during removal".to_string(),
            })?;
            let child = repo.find_tree(entry.id())?;
            match remove_at(repo, &child, rest)? {
                Some(child_id) => {
                    builder.insert(*dir, child_id, FileMode::Tree.into())?;
                }
                None => builder.remove(*dir)?,
            }
        }
    }

    if builder.len() == 0 {
        Ok(None)
    } else {
        Ok(Some(builder.write()?))
    }
}

/// helper function to create the empty root tree of a fresh depot
pub fn create_initial_tree(repo: &Repository) -> RemoteResult<TreeId> {
    PathMutator::empty(repo).write()
}
