use std::collections::{HashMap, HashSet};

use super::Folder;

/// Uid of the implicit root folder. It is never stored, always visible, and
/// owns every element without a folder.
pub const GENERAL_FOLDER_UID: &str = "general";
pub const GENERAL_FOLDER_TITLE: &str = "General";

/// Immutable index over the folders one identity can see in one org.
#[derive(Debug, Clone)]
pub struct FolderTree {
    org_id: i64,
    folders: HashMap<String, Folder>,
    children: HashMap<String, Vec<String>>,
}

impl FolderTree {
    pub fn new(org_id: i64, folders: Vec<Folder>) -> Self {
        let folders: HashMap<String, Folder> = folders
            .into_iter()
            .filter(|f| f.org_id == org_id && f.uid != GENERAL_FOLDER_UID)
            .map(|f| (f.uid.clone(), f))
            .collect();

        // Folders whose parent is not visible hang off the root
        let mut children: HashMap<String, Vec<String>> = HashMap::new();
        for folder in folders.values() {
            let parent = match folder.parent_uid.as_deref() {
                Some(p) if folders.contains_key(p) => p.to_string(),
                _ => GENERAL_FOLDER_UID.to_string(),
            };
            children.entry(parent).or_default().push(folder.uid.clone());
        }
        for uids in children.values_mut() {
            uids.sort_by(|a, b| {
                let (fa, fb) = (&folders[a], &folders[b]);
                fa.title.to_lowercase().cmp(&fb.title.to_lowercase()).then_with(|| a.cmp(b))
            });
        }

        Self {
            org_id,
            folders,
            children,
        }
    }

    pub fn org_id(&self) -> i64 {
        self.org_id
    }

    pub fn contains(&self, uid: &str) -> bool {
        is_general(uid) || self.folders.contains_key(uid)
    }

    pub fn get(&self, uid: &str) -> Option<&Folder> {
        self.folders.get(uid)
    }

    pub fn title(&self, uid: &str) -> Option<&str> {
        if is_general(uid) {
            return Some(GENERAL_FOLDER_TITLE);
        }
        self.folders.get(uid).map(|f| f.title.as_str())
    }

    /// Parent uid; `None` for the root and for unknown folders
    pub fn parent(&self, uid: &str) -> Option<&str> {
        let folder = self.folders.get(uid)?;
        match folder.parent_uid.as_deref() {
            Some(p) if self.folders.contains_key(p) => Some(p),
            _ => Some(GENERAL_FOLDER_UID),
        }
    }

    /// Ancestors nearest first, stopping before the root. Tolerates cycles in
    /// the stored parent links.
    pub fn ancestors(&self, uid: &str) -> Vec<&str> {
        let mut out = Vec::new();
        let mut seen: HashSet<&str> = HashSet::new();
        let mut current = uid;
        seen.insert(current);

        while let Some(parent) = self.parent(current) {
            if is_general(parent) || !seen.insert(parent) {
                break;
            }
            out.push(parent);
            current = parent;
        }
        out
    }

    pub fn children(&self, uid: &str) -> &[String] {
        let key = if uid.is_empty() { GENERAL_FOLDER_UID } else { uid };
        self.children.get(key).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn folders(&self) -> impl Iterator<Item = &Folder> {
        self.folders.values()
    }

    pub fn len(&self) -> usize {
        self.folders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.folders.is_empty()
    }
}

/// Library elements stored without a folder live in General
pub fn is_general(uid: &str) -> bool {
    uid.is_empty() || uid == GENERAL_FOLDER_UID
}

#[cfg(test)]
mod tests {
    use super::*;

    fn folder(uid: &str, title: &str, parent: Option<&str>) -> Folder {
        Folder::new(1, uid, title, parent)
    }

    fn sample() -> FolderTree {
        FolderTree::new(
            1,
            vec![
                folder("ops", "Ops", None),
                folder("db", "Databases", Some("ops")),
                folder("pg", "Postgres", Some("db")),
                folder("apps", "apps", None),
                Folder::new(2, "other-org", "Other", None),
            ],
        )
    }

    #[test]
    fn contains_and_title() {
        let tree = sample();
        assert!(tree.contains("pg"));
        assert!(tree.contains(GENERAL_FOLDER_UID));
        assert!(tree.contains(""));
        assert!(!tree.contains("other-org"));
        assert!(!tree.contains("missing"));

        assert_eq!(tree.title("db"), Some("Databases"));
        assert_eq!(tree.title(""), Some(GENERAL_FOLDER_TITLE));
        assert_eq!(tree.title("missing"), None);
        assert_eq!(tree.len(), 4);
    }

    #[test]
    fn ancestors_are_nearest_first() {
        let tree = sample();
        assert_eq!(tree.ancestors("pg"), vec!["db", "ops"]);
        assert!(tree.ancestors("ops").is_empty());
        assert!(tree.ancestors("missing").is_empty());
    }

    #[test]
    fn children_are_sorted_by_title() {
        let tree = sample();
        assert_eq!(tree.children(GENERAL_FOLDER_UID), &["apps".to_string(), "ops".to_string()]);
        assert_eq!(tree.children("ops"), &["db".to_string()]);
        assert!(tree.children("pg").is_empty());
    }

    #[test]
    fn invisible_parent_attaches_to_root() {
        let tree = FolderTree::new(1, vec![folder("child", "Child", Some("hidden"))]);
        assert_eq!(tree.parent("child"), Some(GENERAL_FOLDER_UID));
        assert_eq!(tree.children(GENERAL_FOLDER_UID), &["child".to_string()]);
    }

    #[test]
    fn parent_cycles_terminate() {
        let tree = FolderTree::new(
            1,
            vec![folder("a", "A", Some("b")), folder("b", "B", Some("a"))],
        );
        assert_eq!(tree.ancestors("a"), vec!["b"]);
    }
}
