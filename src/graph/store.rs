//! Commit ownership and lookup.
//!
//! The store is the single owner of every [`CommitInfo`]. The ordered row
//! vector is a parallel access path into the same records (row 0 is
//! reserved for the WIP entry), and child back-edges are kept as shas so
//! they never extend a commit's lifetime.
//!
//! Commits arrive newest-first, so a commit is usually inserted before its
//! parents: edges to not-yet-seen parents wait in a pending multimap and
//! drain when the parent shows up. Once ingest finishes, a pending edge
//! whose parent *is* stored would mean a failed drain; edges to commits
//! outside the loaded history window are expected and kept.

use std::collections::BTreeMap;

use crate::graph::commit::CommitInfo;
use crate::types::Sha;

/// Owner of the commit graph: sha-keyed records plus the ordered rows.
#[derive(Debug, Default)]
pub struct CommitStore {
    commits: BTreeMap<Sha, CommitInfo>,
    rows: Vec<Option<Sha>>,
    pending_children: BTreeMap<Sha, Vec<Sha>>,
    configured: bool,
}

impl CommitStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Has the first full setup completed?
    pub fn is_configured(&self) -> bool {
        self.configured
    }

    /// Reset for a fresh ingest of `total` rows (including the WIP row).
    ///
    /// This is a full rebuild: re-running setup over a rewritten history
    /// must not leave stale rows behind.
    pub fn begin_setup(&mut self, total: usize) {
        self.configured = false;
        self.commits.clear();
        self.pending_children.clear();
        self.rows.clear();
        self.rows.resize(total, None);
    }

    /// Mark ingest complete; from here on only the WIP row may change.
    pub fn finish_setup(&mut self) {
        debug_assert!(
            self.pending_children.keys().all(|sha| !self.commits.contains_key(sha)),
            "pending child-edges failed to drain into a stored commit"
        );
        self.configured = true;
    }

    pub fn clear(&mut self) {
        self.configured = false;
        self.commits.clear();
        self.pending_children.clear();
        self.rows.clear();
    }

    /// Number of rows, WIP included.
    pub fn count(&self) -> usize {
        self.rows.len()
    }

    /// Install a commit at `row`. Ignored once setup has finished; a
    /// rewritten history goes through `begin_setup` again.
    pub fn insert(&mut self, mut commit: CommitInfo, row: usize) {
        if self.configured {
            return;
        }
        if commit.sha().is_empty() || commit.sha().is_zero() {
            debug_assert!(false, "real commits must carry a real sha");
            return;
        }
        if row >= self.rows.len() {
            debug_assert!(false, "row {row} out of range");
            return;
        }

        // the WIP names its parent before that parent is ingested
        if let Some(wip) = self.commits.get(Sha::zero().as_str()) {
            if wip.parent(0) == Some(commit.sha()) {
                commit.add_child(Sha::zero());
            }
        }

        let sha = commit.sha().clone();

        if let Some(children) = self.pending_children.remove(&sha) {
            for child in children {
                commit.add_child(child);
            }
        }

        for parent in commit.parents() {
            self.pending_children
                .entry(parent.clone())
                .or_default()
                .push(sha.clone());
        }

        self.commits.insert(sha.clone(), commit);
        self.rows[row] = Some(sha);
    }

    /// Install or replace the WIP entry at row 0. Allowed at any time.
    pub fn put_wip(&mut self, wip: CommitInfo) {
        if self.rows.is_empty() {
            self.rows.push(None);
        }

        let sha = wip.sha().clone();
        self.commits.insert(sha.clone(), wip);
        self.rows[0] = Some(sha);
    }

    pub fn wip(&self) -> Option<&CommitInfo> {
        self.commits.get(Sha::zero().as_str())
    }

    pub fn by_row(&self, row: usize) -> Option<&CommitInfo> {
        self.rows
            .get(row)?
            .as_ref()
            .and_then(|sha| self.commits.get(sha))
    }

    /// Exact lookup first, then the first stored sha with a matching
    /// prefix. Ambiguous prefixes resolve in key order.
    pub fn by_sha(&self, prefix: &str) -> Option<&CommitInfo> {
        if prefix.is_empty() {
            return None;
        }

        if let Some(commit) = self.commits.get(prefix) {
            return Some(commit);
        }

        self.commits
            .iter()
            .find(|(sha, _)| sha.as_str().starts_with(prefix))
            .map(|(_, commit)| commit)
    }

    /// Row index of the first commit matching the sha prefix.
    pub fn position_of(&self, prefix: &str) -> Option<usize> {
        let sha = self.by_sha(prefix)?.sha();
        self.rows.iter().position(|r| r.as_ref() == Some(sha))
    }

    /// Cursor-style find: scan from `start` in the requested direction,
    /// wrapping to the opposite end on a miss.
    pub fn search(&self, text: &str, start: usize, reverse: bool) -> Option<&CommitInfo> {
        let total = self.rows.len();
        if total == 0 {
            return None;
        }

        let matches = |row: usize| self.by_row(row).filter(|c| c.contains(text));

        if !reverse {
            let start = start.min(total);
            (start..total).chain(0..start).find_map(matches)
        } else {
            let start = start.min(total - 1);
            (0..=start).rev().chain((start + 1..total).rev()).find_map(matches)
        }
    }

    /// Iterate stored commits in key order.
    pub fn commits(&self) -> impl Iterator<Item = &CommitInfo> {
        self.commits.values()
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn commit(sha: &str, parents: &[&str]) -> CommitInfo {
        CommitInfo::new(
            Sha::new(sha).unwrap(),
            parents.iter().map(|p| Sha::new(*p).unwrap()).collect(),
            None,
            "committer",
            Utc::now(),
            "author",
            format!("commit {sha}"),
        )
    }

    fn store_with(commits: Vec<CommitInfo>) -> CommitStore {
        let mut store = CommitStore::new();
        store.begin_setup(commits.len() + 1);
        for (i, c) in commits.into_iter().enumerate() {
            store.insert(c, i + 1);
        }
        store.finish_setup();
        store
    }

    #[test]
    fn test_child_back_edges() {
        let store = store_with(vec![
            commit("aa", &["cc"]),
            commit("bb", &["cc"]),
            commit("cc", &[]),
        ]);

        let cc = store.by_sha("cc").unwrap();
        let children: Vec<&str> = cc.children().iter().map(Sha::as_str).collect();
        assert_eq!(children, vec!["aa", "bb"]);

        // every stored parent lists its child
        for c in store.commits() {
            for p in c.parents() {
                if let Some(parent) = store.by_sha(p.as_str()) {
                    assert!(parent.children().contains(c.sha()));
                }
            }
        }
    }

    #[test]
    fn test_root_commit_registers_no_pending_edges() {
        let mut store = CommitStore::new();
        store.begin_setup(2);
        store.insert(commit("aa", &[]), 1);
        store.finish_setup();

        assert!(store.pending_children.is_empty());
    }

    #[test]
    fn test_truncated_history_keeps_unknown_parent_edges() {
        let mut store = CommitStore::new();
        store.begin_setup(2);
        store.insert(commit("aa", &["ff"]), 1); // ff beyond the window
        store.finish_setup();

        assert_eq!(store.pending_children.len(), 1);
        assert!(store.by_sha("ff").is_none());
    }

    #[test]
    fn test_prefix_lookup_first_match() {
        let store = store_with(vec![commit("abc1", &[]), commit("abc2", &[]), commit("def0", &[])]);

        assert_eq!(store.by_sha("abc2").unwrap().sha().as_str(), "abc2");
        assert_eq!(store.by_sha("abc").unwrap().sha().as_str(), "abc1");
        assert_eq!(store.by_sha("de").unwrap().sha().as_str(), "def0");
        assert!(store.by_sha("beef").is_none());
        assert!(store.by_sha("").is_none());
    }

    #[test]
    fn test_position_of() {
        let store = store_with(vec![commit("abc1", &[]), commit("def0", &[])]);

        assert_eq!(store.position_of("def"), Some(2));
        assert_eq!(store.position_of("beef"), None);
    }

    #[test]
    fn test_insert_ignored_when_configured() {
        let mut store = store_with(vec![commit("aa", &[])]);
        assert!(store.is_configured());

        store.insert(commit("bb", &[]), 1);
        assert!(store.by_sha("bb").is_none());
        assert_eq!(store.by_row(1).unwrap().sha().as_str(), "aa");
    }

    #[test]
    fn test_search_wraps_forward() {
        let store = store_with(vec![
            commit("aa", &[]), // row 1
            commit("bb", &[]), // row 2
            commit("cc", &[]), // row 3
        ]);

        let hit = store.search("commit aa", 3, false).unwrap();
        assert_eq!(hit.sha().as_str(), "aa");
    }

    #[test]
    fn test_search_reverse_wraps_to_tail() {
        let store = store_with(vec![
            commit("aa", &[]), // row 1
            commit("bb", &[]), // row 2
            commit("cc", &[]), // row 3
        ]);

        let hit = store.search("commit cc", 1, true).unwrap();
        assert_eq!(hit.sha().as_str(), "cc");
    }

    #[test]
    fn test_clear_drops_everything() {
        let mut store = store_with(vec![commit("aa", &["ff"])]);
        store.clear();

        assert_eq!(store.count(), 0);
        assert!(store.by_sha("aa").is_none());
        assert!(store.pending_children.is_empty());
        assert!(!store.is_configured());
    }

    #[test]
    fn test_search_start_past_end() {
        let store = store_with(vec![commit("aa", &[])]);

        let hit = store.search("commit aa", 99, false).unwrap();
        assert_eq!(hit.sha().as_str(), "aa");
    }
}
