//! The cache facade.
//!
//! [`RepoCache`] coordinates the interner, diff parser, lane engine and
//! commit store behind one reentrant mutex. Every public operation holds
//! the lock for its full duration; internal steps work on `&mut
//! CacheState` directly, so the reentrancy is only needed to let a
//! listener thread re-query from inside its `cache_updated` handling
//! without deadlocking against itself.
//!
//! All queries return owned values, never references into the locked
//! state.

use std::cell::RefCell;
use std::collections::BTreeMap;

use chrono::Utc;
use crossbeam_channel::{unbounded, Receiver, Sender};
use parking_lot::{Mutex, ReentrantMutex};
use tracing::{debug, trace};

use crate::cache::refs::{RefType, References};
use crate::diff::{DiffParser, FileNamesLoader, FileStatus, NamePool, RevisionFiles};
use crate::graph::{CommitInfo, CommitStore, Lane, Lanes};
use crate::types::{Sha, Subtree, WipRevisionInfo};

/// Payload-free change notification. Listeners re-query the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheEvent {
    Updated,
}

/// Shared, thread-safe commit graph cache.
pub struct RepoCache {
    state: ReentrantMutex<RefCell<CacheState>>,
    subscribers: Mutex<Vec<Sender<CacheEvent>>>,
}

#[derive(Default)]
struct CacheState {
    store: CommitStore,
    lanes: Lanes,
    names: NamePool,
    revision_files: BTreeMap<(Sha, Sha), RevisionFiles>,
    references: BTreeMap<Sha, References>,
    remote_tags: BTreeMap<String, Sha>,
    subtrees: Vec<Subtree>,
    untracked: Vec<String>,
}

impl Default for RepoCache {
    fn default() -> Self {
        Self::new()
    }
}

impl RepoCache {
    pub fn new() -> Self {
        Self {
            state: ReentrantMutex::new(RefCell::new(CacheState::default())),
            subscribers: Mutex::new(Vec::new()),
        }
    }

    /// Register a listener for [`CacheEvent`]s.
    pub fn subscribe(&self) -> Receiver<CacheEvent> {
        let (tx, rx) = unbounded();
        self.subscribers.lock().push(tx);
        rx
    }

    fn emit(&self) {
        self.subscribers
            .lock()
            .retain(|tx| tx.send(CacheEvent::Updated).is_ok());
    }

    /// Rebuild the cache from a WIP snapshot and a newest-first history.
    ///
    /// Invalid entries (empty or reserved sha) are skipped without
    /// consuming a row. Emits `cache_updated` on completion.
    pub fn setup(&self, wip: &WipRevisionInfo, commits: Vec<CommitInfo>) {
        {
            let guard = self.state.lock();
            guard.borrow_mut().setup(wip, commits);
        }
        self.emit();
    }

    /// Regenerate the WIP row. Rejected until the first setup completes.
    pub fn update_wip(&self, wip: &WipRevisionInfo) -> bool {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        if state.store.is_configured() {
            state.insert_wip(wip);
            true
        } else {
            false
        }
    }

    pub fn set_untracked_files(&self, files: Vec<String>) {
        let guard = self.state.lock();
        guard.borrow_mut().untracked = files;
    }

    /// Store the file change set between two revisions.
    ///
    /// Returns whether the cache changed: identical re-inserts are no-ops
    /// so listeners are not notified in a storm.
    pub fn insert_revision_file(&self, parent: &Sha, child: &Sha, rf: RevisionFiles) -> bool {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        state.insert_revision_file(parent, child, rf)
    }

    pub fn get_revision_file(&self, parent: &Sha, child: &Sha) -> Option<RevisionFiles> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state
            .revision_files
            .get(&(parent.clone(), child.clone()))
            .cloned()
    }

    pub fn contains_revision_file(&self, parent: &Sha, child: &Sha) -> bool {
        let guard = self.state.lock();
        let state = guard.borrow();
        state
            .revision_files
            .contains_key(&(parent.clone(), child.clone()))
    }

    /// Parse one raw diff buffer into a file change record.
    pub fn parse_diff(&self, buf: &str) -> RevisionFiles {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();
        DiffParser::new(&mut state.names).parse(buf)
    }

    pub fn commit_by_row(&self, row: usize) -> Option<CommitInfo> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.store.by_row(row).cloned()
    }

    /// Lookup by full sha or unambiguous prefix.
    pub fn commit_by_sha(&self, prefix: &str) -> Option<CommitInfo> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.store.by_sha(prefix).cloned()
    }

    pub fn commit_position(&self, prefix: &str) -> Option<usize> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.store.position_of(prefix)
    }

    /// Find-next / find-previous over the searchable commit projection.
    pub fn search_commit(&self, text: &str, start: usize, reverse: bool) -> Option<CommitInfo> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.store.search(text, start, reverse).cloned()
    }

    /// Number of rows, WIP included.
    pub fn count(&self) -> usize {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.store.count()
    }

    /// Does the working tree carry any change beyond untracked files?
    pub fn pending_local_changes(&self) -> bool {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.pending_local_changes()
    }

    pub fn insert_reference(&self, sha: &Sha, kind: RefType, name: &str) {
        let guard = self.state.lock();
        let mut state = guard.borrow_mut();

        debug!(sha = %sha, name, "adding a reference");
        state.references.entry(sha.clone()).or_default().add(kind, name);
    }

    pub fn has_references(&self, sha: &Sha) -> bool {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.references.get(sha).is_some_and(|r| !r.is_empty())
    }

    pub fn get_references(&self, sha: &Sha, kind: RefType) -> Vec<String> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state
            .references
            .get(sha)
            .map(|r| r.get(kind))
            .unwrap_or_default()
    }

    pub fn clear_references(&self) {
        let guard = self.state.lock();
        guard.borrow_mut().references.clear();
    }

    /// Detach `branch` from whichever commit carries it and re-attach it
    /// under `sha`.
    pub fn reload_current_branch(&self, branch: &str, sha: &Sha) {
        let guard = self.state.lock();
        guard.borrow_mut().reload_current_branch(branch, sha);
    }

    /// All references of one kind, ordered by sha.
    pub fn get_branches(&self, kind: RefType) -> Vec<(Sha, Vec<String>)> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state
            .references
            .iter()
            .map(|(sha, refs)| (sha.clone(), refs.get(kind)))
            .collect()
    }

    /// Replace the remote tag map. Emits `cache_updated`.
    pub fn update_tags(&self, remote_tags: BTreeMap<String, Sha>) {
        {
            let guard = self.state.lock();
            guard.borrow_mut().remote_tags = remote_tags;
        }
        self.emit();
    }

    /// Tag name → sha, compiled from the references map for local tags or
    /// taken from the stored remote map.
    pub fn get_tags(&self, kind: RefType) -> BTreeMap<String, Sha> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.get_tags(kind)
    }

    pub fn add_subtrees(&self, subtrees: Vec<Subtree>) {
        let guard = self.state.lock();
        guard.borrow_mut().subtrees.extend(subtrees);
    }

    pub fn get_subtrees(&self) -> Vec<String> {
        let guard = self.state.lock();
        let state = guard.borrow();
        state.subtrees.iter().map(|s| s.name.clone()).collect()
    }
}

impl CacheState {
    fn setup(&mut self, wip: &WipRevisionInfo, commits: Vec<CommitInfo>) {
        let total = commits.len() + 1;
        debug!(total, "configuring the cache");

        self.names.clear();
        self.revision_files.clear();
        self.lanes.clear();
        self.store.begin_setup(total);

        debug!("adding the wip revision");
        self.insert_wip(wip);

        debug!("adding committed revisions");
        let mut row = 1;
        for commit in commits {
            if commit.is_valid() {
                self.insert_commit(commit, row);
                row += 1;
            }
        }

        self.store.finish_setup();
    }

    fn insert_commit(&mut self, mut commit: CommitInfo, row: usize) {
        let lanes = self.calculate_lanes(&commit);
        commit.set_lanes(lanes);
        self.store.insert(commit, row);
    }

    /// Synthesize and install the WIP pseudo-commit at row 0.
    fn insert_wip(&mut self, wip: &WipRevisionInfo) {
        let parent = &wip.parent_sha;
        debug!(parent = %parent, "updating the wip revision");

        let rf = self.work_dir_rev_file(&wip.diff_index, &wip.diff_index_cached);
        let log = if rf.count() == self.untracked.len() {
            "No local changes"
        } else {
            "Local changes"
        };
        self.insert_revision_file(&Sha::zero(), parent, rf);

        let parents = if parent.is_empty() {
            Vec::new()
        } else {
            vec![parent.clone()]
        };
        let mut wip_commit =
            CommitInfo::new(Sha::zero(), parents, None, "-", Utc::now(), "-", log);

        let lanes = self.calculate_lanes(&wip_commit);
        wip_commit.set_lanes(lanes);

        // the WIP row must never change lane geometry mid-session
        if let Some(prev) = self.store.wip() {
            wip_commit.set_lanes(prev.lanes().to_vec());
        }

        self.store.put_wip(wip_commit);
    }

    fn calculate_lanes(&mut self, commit: &CommitInfo) -> Vec<Lane> {
        let sha = commit.sha();
        trace!(sha = %sha, "updating lanes");

        if self.lanes.is_empty() {
            self.lanes.init(sha);
        }

        let (is_fork, is_discontinuity) = self.lanes.is_fork(sha);
        let is_merge = commit.parents_count() > 1;

        if is_discontinuity {
            self.lanes.change_active_lane(sha); // keeps the prior boundary state
        }
        if is_fork {
            self.lanes.set_fork(sha);
        }
        if is_merge {
            self.lanes.set_merge(commit.parents());
        }
        if commit.parents_count() == 0 {
            self.lanes.set_initial();
        }

        let row = self.lanes.snapshot();
        self.reset_lanes(commit, is_fork);
        row
    }

    fn reset_lanes(&mut self, commit: &CommitInfo, is_fork: bool) {
        self.lanes.next_parent(commit.first_parent());

        if commit.parents_count() > 1 {
            self.lanes.after_merge();
        }
        if is_fork {
            self.lanes.after_fork();
        }
        if self.lanes.is_branch() {
            self.lanes.after_branch();
        }
    }

    fn insert_revision_file(&mut self, parent: &Sha, child: &Sha, rf: RevisionFiles) -> bool {
        let both_set = !parent.is_empty() && !child.is_empty();
        let is_wip = parent.is_zero();

        if !(both_set || is_wip) {
            return false;
        }

        let key = (parent.clone(), child.clone());
        if self.revision_files.get(&key) == Some(&rf) {
            return false;
        }

        debug!(parent = %parent, child = %child, "storing the revision files");
        self.revision_files.insert(key, rf);
        true
    }

    /// Build the WIP file change set from the working-tree and staged
    /// diffs plus the untracked list.
    fn work_dir_rev_file(&mut self, diff_index: &str, diff_index_cached: &str) -> RevisionFiles {
        let mut loader = FileNamesLoader::default();
        let mut rf = RevisionFiles::new();

        DiffParser::new(&mut self.names).parse_into(diff_index, &mut loader, &mut rf);
        rf.set_only_modified(false);

        // the files/statuses/merge_parent lists are indexed identically, so
        // a path the diff already listed must not grow the status lists
        let Self { names, untracked, .. } = self;
        for path in untracked.iter() {
            if rf.files().iter().any(|f| f == path) {
                continue;
            }
            names.append(path, &mut loader);
            names.flush(&mut loader, &mut rf);
            rf.push_status(FileStatus::UNKNOWN);
            rf.push_merge_parent(1);
        }

        let mut staged = RevisionFiles::new();
        DiffParser::new(&mut self.names).parse_into(diff_index_cached, &mut loader, &mut staged);

        for i in 0..rf.count() {
            let Some(file) = rf.file(i) else { continue };
            let Some(j) = staged.files().iter().position(|f| f == file) else {
                continue;
            };

            if staged.status_cmp(j, FileStatus::CONFLICT) {
                rf.append_status(i, FileStatus::CONFLICT);
            } else if rf.status_cmp(i, FileStatus::MODIFIED)
                && !rf.status_cmp(i, FileStatus::IN_INDEX)
            {
                rf.append_status(i, FileStatus::PARTIALLY_CACHED);
            }
        }

        rf
    }

    fn pending_local_changes(&self) -> bool {
        let Some(wip) = self.store.wip() else {
            return false;
        };

        let parent = wip.parent(0).cloned().unwrap_or_default();
        match self.revision_files.get(&(Sha::zero(), parent)) {
            Some(rf) => rf.count() > self.untracked.len(),
            None => false,
        }
    }

    fn reload_current_branch(&mut self, branch: &str, sha: &Sha) {
        let holder = self
            .references
            .iter()
            .find(|(_, refs)| refs.contains(RefType::LocalBranch, branch))
            .map(|(sha, _)| sha.clone());

        if let Some(holder) = holder {
            if let Some(refs) = self.references.get_mut(&holder) {
                refs.remove(RefType::LocalBranch, branch);
                if refs.is_empty() {
                    self.references.remove(&holder);
                }
            }
        }

        self.references
            .entry(sha.clone())
            .or_default()
            .add(RefType::LocalBranch, branch);
    }

    fn get_tags(&self, kind: RefType) -> BTreeMap<String, Sha> {
        if kind == RefType::LocalTag {
            let mut tags = BTreeMap::new();
            for (sha, refs) in &self.references {
                for tag in refs.get(RefType::LocalTag) {
                    tags.insert(tag, sha.clone());
                }
            }
            tags
        } else {
            self.remote_tags.clone()
        }
    }
}
