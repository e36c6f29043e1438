//! Resource metadata for depot paths.

use chrono::{DateTime, Utc};

use crate::store::{DepotPath, HeadState};

/// What the depot knows about one path at head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Resource {
    pub name: DepotPath,
    pub exists: bool,
    /// None when the path was never submitted
    pub last_modified: Option<DateTime<Utc>>,
    /// 0 for missing or deleted files
    pub content_length: u64,
}

impl Resource {
    /// Build from the head state of `name`.
    pub fn from_head(name: DepotPath, head: &HeadState) -> Self {
        let exists = head.exists();
        Self {
            name,
            exists,
            last_modified: head.head_time,
            content_length: if exists { head.size.unwrap_or(0) } else { 0 },
        }
    }

    /// a resource the depot has no record of
    pub fn missing(name: DepotPath) -> Self {
        Self::from_head(name, &HeadState::missing())
    }

    /// resources are never on the local file system
    pub fn is_local(&self) -> bool {
        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::FileAction;

    fn path() -> DepotPath {
        DepotPath::new("//depot/acme/w.jar").unwrap()
    }

    #[test]
    fn test_from_head() {
        let now = Utc::now();
        let head = HeadState {
            last_action: Some(FileAction::Edit),
            head_time: Some(now),
            size: Some(42),
            revision: Some(3),
        };
        let resource = Resource::from_head(path(), &head);
        assert!(resource.exists);
        assert_eq!(resource.content_length, 42);
        assert_eq!(resource.last_modified, Some(now));
        assert!(!resource.is_local());
    }

    #[test]
    fn test_deleted_and_missing() {
        let deleted = HeadState {
            last_action: Some(FileAction::Delete),
            head_time: Some(Utc::now()),
            size: Some(10),
            revision: Some(2),
        };
        let resource = Resource::from_head(path(), &deleted);
        assert!(!resource.exists);
        assert_eq!(resource.content_length, 0);
        assert!(resource.last_modified.is_some());

        let missing = Resource::missing(path());
        assert!(!missing.exists);
        assert_eq!(missing.last_modified, None);
    }
}
