#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::Utc;
use serde_json::json;

use library_elements::accesscontrol::{AccessControl, AccessControlError, Evaluator, OrgRole, SignedInUser};
use library_elements::config::LibraryConfig;
use library_elements::context::RequestContext;
use library_elements::folder::{
    visible_folders, Folder, FolderDirectory, FolderError, FolderTreeCache, GetFoldersQuery,
};
use library_elements::libraryelements::{
    ElementKind, LibraryElement, LibraryElementService, LibraryElementStore, MemoryLibraryElementStore, MetaUser,
    NewLibraryElement,
};

pub const ORG: i64 = 1;
pub const OTHER_ORG: i64 = 2;

/// Folder source that counts how often it is asked
#[derive(Default)]
pub struct CountingDirectory {
    folders: Vec<Folder>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl CountingDirectory {
    pub fn new(folders: Vec<Folder>) -> Arc<Self> {
        Arc::new(Self {
            folders,
            ..Default::default()
        })
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl FolderDirectory for CountingDirectory {
    async fn get_folders(&self, ctx: &RequestContext, query: GetFoldersQuery<'_>) -> Result<Vec<Folder>, FolderError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        ctx.ensure_active()?;
        if self.failing.load(Ordering::SeqCst) {
            return Err(FolderError::NotFound("folder listing unavailable".into()));
        }
        let folders = self.folders.iter().filter(|f| f.org_id == query.org_id).cloned().collect();
        Ok(visible_folders(query.user, folders))
    }
}

/// Answer for one scripted evaluation
#[derive(Debug, Clone, Copy)]
pub enum Step {
    Allow,
    Deny,
    Fail,
}

/// Access control that replays a fixed sequence of answers, then allows
#[derive(Default)]
pub struct ScriptedAccess {
    steps: Mutex<VecDeque<Step>>,
    calls: AtomicUsize,
}

impl ScriptedAccess {
    pub fn new(steps: impl IntoIterator<Item = Step>) -> Self {
        Self {
            steps: Mutex::new(steps.into_iter().collect()),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl AccessControl for ScriptedAccess {
    async fn evaluate(
        &self,
        _ctx: &RequestContext,
        _user: &SignedInUser,
        evaluator: &Evaluator,
    ) -> Result<bool, AccessControlError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let step = self.steps.lock().unwrap().pop_front().unwrap_or(Step::Allow);
        match step {
            Step::Allow => Ok(true),
            Step::Deny => Ok(false),
            Step::Fail => Err(AccessControlError::resolution(
                evaluator.scopes().first().copied().unwrap_or_default(),
                "scripted failure",
            )),
        }
    }
}

pub fn user(role: OrgRole) -> SignedInUser {
    SignedInUser::new(ORG, 10, "user-10", role).with_name("Test User")
}

pub fn ctx(user: SignedInUser, request_id: &str) -> RequestContext {
    RequestContext::new(user).with_request_id(request_id)
}

/// Nested folders: team-a > team-a-sub, plus team-b, and one folder in another org
pub fn sample_folders() -> Vec<Folder> {
    vec![
        Folder::new(ORG, "team-a", "Team A", None),
        Folder::new(ORG, "team-a-sub", "Team A Sub", Some("team-a")),
        Folder::new(ORG, "team-b", "Team B", None),
        Folder::new(OTHER_ORG, "elsewhere", "Elsewhere", None),
    ]
}

/// In-memory store, counting folder source and a service wired with real
/// scope resolution
pub struct Fixture {
    pub directory: Arc<CountingDirectory>,
    pub folders: Arc<FolderTreeCache>,
    pub store: Arc<MemoryLibraryElementStore>,
    pub service: LibraryElementService,
}

impl Fixture {
    pub fn new() -> Self {
        Self::with_folders(sample_folders())
    }

    pub fn with_folders(folders: Vec<Folder>) -> Self {
        let directory = CountingDirectory::new(folders);
        let folder_cache = Arc::new(FolderTreeCache::new(directory.clone()));
        let store = Arc::new(MemoryLibraryElementStore::new());
        let service = LibraryElementService::with_scoped_access(store.clone(), Arc::clone(&folder_cache));
        Self {
            directory,
            folders: folder_cache,
            store,
            service,
        }
    }

    pub fn with_service_config(mut self, config: LibraryConfig) -> Self {
        self.service = self.service.with_config(config);
        self
    }

    /// Stores a panel directly, bypassing permission checks
    pub async fn panel(&self, org_id: i64, folder_uid: Option<&str>, name: &str, panel_type: &str) -> LibraryElement {
        self.store
            .insert(NewLibraryElement {
                org_id,
                folder_uid: folder_uid.map(str::to_string),
                uid: name.to_lowercase().replace(' ', "-"),
                name: name.to_string(),
                kind: ElementKind::Panel,
                element_type: panel_type.to_string(),
                description: format!("{} description", name),
                model: json!({ "type": panel_type, "title": name }),
                created: Utc::now(),
                created_by: MetaUser {
                    id: 1,
                    name: "seed".to_string(),
                },
            })
            .await
            .expect("seed panel")
    }
}
