//! core type-safe wrappers for depot paths, workspaces and changelists.

use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use git2::Oid;
use serde::{Deserialize, Serialize};

/// git commit identifier
///
/// the inner Oid is only accessible within the crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CommitId(pub(crate) Oid);

impl CommitId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    /// raw Oid (for internal use only)
    pub(crate) fn raw(&self) -> Oid {
        self.0
    }

    /// parse CommitId from a hex string
    pub fn from_hex(hex: &str) -> Result<Self, git2::Error> {
        Oid::from_str(hex).map(CommitId)
    }

    /// short form of the commit ID
    pub fn short(&self) -> String {
        self.0.to_string()[..7].to_string()
    }
}

impl fmt::Display for CommitId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// git blob identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BlobId(pub(crate) Oid);

impl BlobId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    pub(crate) fn raw(&self) -> Oid {
        self.0
    }
}

impl fmt::Display for BlobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// git tree identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TreeId(pub(crate) Oid);

impl TreeId {
    pub(crate) fn new(oid: Oid) -> Self {
        Self(oid)
    }

    pub(crate) fn raw(&self) -> Oid {
        self.0
    }
}

impl fmt::Display for TreeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A validated path in depot notation, e.g. `//depot/acme/widgets/1.0/widgets.jar`.
///
/// Depot paths always start with the `//` root marker and contain at least
/// one segment (the depot name). Wildcards and revision specifiers are
/// rejected so a path always names exactly one file or directory.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DepotPath(String);

impl DepotPath {
    /// marker every depot path starts with
    pub const ROOT_MARKER: &'static str = "//";

    /// characters with special meaning to the depot
    const RESERVED_CHARS: &'static [char] = &['*', '@', '#', '%'];

    /// create a new DepotPath, validating the input
    pub fn new(path: impl Into<String>) -> Result<Self, InvalidNameError> {
        let path = path.into();
        Self::validate(&path)?;
        Ok(Self(path))
    }

    fn validate(path: &str) -> Result<(), InvalidNameError> {
        let rest = path
            .strip_prefix(Self::ROOT_MARKER)
            .ok_or_else(|| InvalidNameError::InvalidPath(path.to_string()))?;

        if rest.is_empty() {
            return Err(InvalidNameError::Empty);
        }

        for segment in rest.split('/') {
            if segment.is_empty() || segment == "." || segment == ".." || segment == "..." {
                return Err(InvalidNameError::InvalidPath(path.to_string()));
            }
            if let Some(position) = segment.find(Self::RESERVED_CHARS) {
                let char = segment[position..].chars().next().unwrap_or('*');
                return Err(InvalidNameError::InvalidCharacter { char, position });
            }
        }

        Ok(())
    }

    /// the path without the root marker, as used inside git trees
    pub fn tree_path(&self) -> &str {
        &self.0[Self::ROOT_MARKER.len()..]
    }

    /// the path segments, depot name first
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.tree_path().split('/')
    }

    /// number of segments
    pub fn depth(&self) -> usize {
        self.segments().count()
    }

    /// the depot name (first segment)
    pub fn depot(&self) -> &str {
        self.segments().next().unwrap_or_default()
    }

    /// the last segment
    pub fn file_name(&self) -> &str {
        self.tree_path().rsplit('/').next().unwrap_or_default()
    }

    /// the path made of the first `count` segments
    pub fn prefix(&self, count: usize) -> Option<DepotPath> {
        if count == 0 || count > self.depth() {
            return None;
        }
        let joined = self.segments().take(count).collect::<Vec<_>>().join("/");
        Some(Self(format!("{}{}", Self::ROOT_MARKER, joined)))
    }

    /// append a single segment
    pub fn join(&self, name: &str) -> Result<DepotPath, InvalidNameError> {
        Self::new(format!("{}/{}", self.0, name))
    }

    /// check whether `self` lies strictly below `root`
    pub fn is_under(&self, root: &DepotPath) -> bool {
        self.relative_to(root).is_some()
    }

    /// the segments after `root`, joined by `/`
    ///
    /// returns None if `self` is not strictly below `root`.
    pub fn relative_to(&self, root: &DepotPath) -> Option<&str> {
        let rest = self.0.strip_prefix(root.as_str())?;
        let rest = rest.strip_prefix('/')?;
        if rest.is_empty() {
            None
        } else {
            Some(rest)
        }
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DepotPath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for DepotPath {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for DepotPath {
    type Error = InvalidNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<DepotPath> for String {
    fn from(path: DepotPath) -> Self {
        path.0
    }
}

impl std::str::FromStr for DepotPath {
    type Err = InvalidNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// A validated workspace (client) name.
///
/// workspace names appear in depot notation (`//name/...`), so they are
/// limited to characters that never need quoting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct WorkspaceName(String);

impl WorkspaceName {
    /// create a new WorkspaceName, validating the input
    pub fn new(name: impl Into<String>) -> Result<Self, InvalidNameError> {
        let name = name.into();
        Self::validate(&name)?;
        Ok(Self(name))
    }

    fn validate(name: &str) -> Result<(), InvalidNameError> {
        if name.is_empty() {
            return Err(InvalidNameError::Empty);
        }

        if name.len() > 128 {
            return Err(InvalidNameError::TooLong(name.len()));
        }

        for (i, c) in name.chars().enumerate() {
            if !c.is_ascii_alphanumeric() && c != '_' && c != '-' && c != '.' {
                return Err(InvalidNameError::InvalidCharacter { char: c, position: i });
            }
        }

        Ok(())
    }

    /// replace everything a workspace name can't hold with `-`
    pub fn sanitize(raw: &str) -> String {
        raw.chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == '.' {
                    c
                } else {
                    '-'
                }
            })
            .collect()
    }

    /// get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkspaceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl TryFrom<String> for WorkspaceName {
    type Error = InvalidNameError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<WorkspaceName> for String {
    fn from(name: WorkspaceName) -> Self {
        name.0
    }
}

/// changelist number assigned by the depot
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChangelistId(pub u64);

impl fmt::Display for ChangelistId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The single view entry of a workspace.
///
/// Maps `<depot_root>/...` on the depot side to `//<workspace>/...` on the
/// client side. Only the subtree being published is mapped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ViewMapping {
    pub depot_root: DepotPath,
    pub workspace: WorkspaceName,
}

impl ViewMapping {
    /// number of leading segments kept in the mapped root
    pub const ROOT_SEGMENTS: usize = 2;

    /// compute the narrowest useful mapping for a publish destination
    ///
    /// keeps the first two segments (`//depot/org`) of the destination, or
    /// only the depot name when the file sits directly below it.
    pub fn for_destination(
        destination: &DepotPath,
        workspace: WorkspaceName,
    ) -> Result<Self, InvalidNameError> {
        let depth = destination.depth();
        if depth < 2 {
            return Err(InvalidNameError::InvalidPath(destination.to_string()));
        }
        let keep = Self::ROOT_SEGMENTS.min(depth - 1);
        let depot_root = destination
            .prefix(keep)
            .ok_or_else(|| InvalidNameError::InvalidPath(destination.to_string()))?;
        Ok(Self {
            depot_root,
            workspace,
        })
    }

    /// left-hand side of the view entry
    pub fn depot_side(&self) -> String {
        format!("{}/...", self.depot_root)
    }

    /// right-hand side of the view entry
    pub fn client_side(&self) -> String {
        format!("//{}/...", self.workspace)
    }

    /// check whether a depot path is visible through this view
    pub fn contains(&self, path: &DepotPath) -> bool {
        path.is_under(&self.depot_root)
    }

    /// workspace-relative location of a depot path
    pub fn local_relative(&self, path: &DepotPath) -> Option<PathBuf> {
        path.relative_to(&self.depot_root)
            .map(|rest| rest.split('/').collect::<PathBuf>())
    }
}

impl fmt::Display for ViewMapping {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.depot_side(), self.client_side())
    }
}

/// Everything the depot needs to register a workspace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkspaceSpec {
    pub name: WorkspaceName,
    pub owner: String,
    /// local root directory the workspace files live in
    pub root: PathBuf,
    pub view: ViewMapping,
    pub created_at: DateTime<Utc>,
}

impl WorkspaceSpec {
    /// local file that mirrors a depot path, if the path is in view
    pub fn local_path(&self, path: &DepotPath) -> Option<PathBuf> {
        self.view
            .local_relative(path)
            .map(|relative| self.root.join(relative))
    }
}

/// the last action recorded against a depot file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileAction {
    Add,
    Edit,
    Delete,
}

impl fmt::Display for FileAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileAction::Add => write!(f, "add"),
            FileAction::Edit => write!(f, "edit"),
            FileAction::Delete => write!(f, "delete"),
        }
    }
}

/// Head-revision state of a depot path.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct HeadState {
    /// None when the depot has never seen the path
    pub last_action: Option<FileAction>,
    pub head_time: Option<DateTime<Utc>>,
    /// size in bytes of the head revision (None when deleted or missing)
    pub size: Option<u64>,
    /// head revision number, counting from 1
    pub revision: Option<u32>,
}

impl HeadState {
    /// state of a path the depot has never seen
    pub fn missing() -> Self {
        Self::default()
    }

    /// a file exists only if it has a last action and that action isn't a delete
    pub fn exists(&self) -> bool {
        matches!(self.last_action, Some(action) if action != FileAction::Delete)
    }
}

/// Per-file outcome of a submit, as reported by the depot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum SubmitStatus {
    /// the file was submitted
    Valid,
    /// the file was submitted; the depot attached a note (e.g. unchanged content)
    Info { message: String },
    /// the file was rejected
    Error { message: String },
}

/// one entry of a submit result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileResult {
    pub path: DepotPath,
    #[serde(flatten)]
    pub status: SubmitStatus,
}

impl FileResult {
    pub fn valid(path: DepotPath) -> Self {
        Self {
            path,
            status: SubmitStatus::Valid,
        }
    }

    pub fn info(path: DepotPath, message: impl Into<String>) -> Self {
        Self {
            path,
            status: SubmitStatus::Info {
                message: message.into(),
            },
        }
    }

    pub fn error(path: DepotPath, message: impl Into<String>) -> Self {
        Self {
            path,
            status: SubmitStatus::Error {
                message: message.into(),
            },
        }
    }
}

/// lifecycle status of a changelist
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangelistStatus {
    Pending,
    Submitted,
}

impl fmt::Display for ChangelistStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChangelistStatus::Pending => write!(f, "pending"),
            ChangelistStatus::Submitted => write!(f, "submitted"),
        }
    }
}

/// summary row returned when listing changelists
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangelistSummary {
    pub id: ChangelistId,
    pub status: ChangelistStatus,
    pub owner: String,
    pub workspace: WorkspaceName,
    pub description: String,
}

/// immediate children of a depot directory
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct DirListing {
    pub files: Vec<String>,
    pub dirs: Vec<String>,
}

impl DirListing {
    /// file names followed by directory names
    pub fn names(&self) -> Vec<String> {
        self.files.iter().chain(self.dirs.iter()).cloned().collect()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty() && self.dirs.is_empty()
    }
}

/// git signature (author/committer info)
#[derive(Debug, Clone)]
pub struct GitSignature {
    pub name: String,
    pub email: String,
}

impl GitSignature {
    /// create a new signature
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }

    /// signature used for depot housekeeping commits
    pub fn depot() -> Self {
        Self::new("depot", "depot@localhost")
    }

    /// signature for commits submitted on behalf of a depot user
    pub fn for_user(user: &str) -> Self {
        Self::new(user, format!("{}@depot", user))
    }

    /// convert to git2::Signature
    pub(crate) fn to_git2_signature(&self) -> Result<git2::Signature<'static>, git2::Error> {
        git2::Signature::now(&self.name, &self.email)
    }
}

impl Default for GitSignature {
    fn default() -> Self {
        Self::depot()
    }
}

/// error type for invalid names (depot paths, workspaces)
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InvalidNameError {
    Empty,
    TooLong(usize),
    InvalidCharacter { char: char, position: usize },
    InvalidPath(String),
}

impl fmt::Display for InvalidNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "name cannot be empty"),
            Self::TooLong(len) => write!(f, "name too long: {} characters", len),
            Self::InvalidCharacter { char, position } => {
                write!(f, "invalid character '{}' at position {}", char, position)
            }
            Self::InvalidPath(path) => write!(f, "invalid depot path: '{}'", path),
        }
    }
}

impl std::error::Error for InvalidNameError {}
