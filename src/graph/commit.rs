//! Commit records.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};

use crate::graph::lanes::Lane;
use crate::types::Sha;

/// One commit as held by the cache.
///
/// `parents` preserves the producer's order; the first parent is the
/// mainline and drives the lane geometry of merges. `children` is the
/// lazily populated back-edge index: it holds shas only, resolved through
/// the owning store, so back-references never extend a commit's lifetime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitInfo {
    sha: Sha,
    parents: Vec<Sha>,
    boundary: Option<char>,
    committer: String,
    author: String,
    committed_at: DateTime<Utc>,
    short_log: String,
    long_log: String,
    is_signed: bool,
    gpg_key: Option<String>,
    lanes: Vec<Lane>,
    children: BTreeSet<Sha>,
}

impl CommitInfo {
    pub fn new(
        sha: Sha,
        parents: Vec<Sha>,
        boundary: Option<char>,
        committer: impl Into<String>,
        committed_at: DateTime<Utc>,
        author: impl Into<String>,
        log: impl Into<String>,
    ) -> Self {
        Self {
            sha,
            parents,
            boundary,
            committer: committer.into(),
            author: author.into(),
            committed_at,
            short_log: log.into(),
            long_log: String::new(),
            is_signed: false,
            gpg_key: None,
            lanes: Vec::new(),
            children: BTreeSet::new(),
        }
    }

    /// set the message body (everything after the summary line)
    pub fn with_long_log(mut self, long_log: impl Into<String>) -> Self {
        self.long_log = long_log.into();
        self
    }

    /// mark the commit as GPG-signed with the given key
    pub fn with_signature(mut self, gpg_key: impl Into<String>) -> Self {
        self.is_signed = true;
        self.gpg_key = Some(gpg_key.into());
        self
    }

    pub fn sha(&self) -> &Sha {
        &self.sha
    }

    /// A commit the cache will accept: a non-empty sha that is not the
    /// reserved WIP sentinel.
    pub fn is_valid(&self) -> bool {
        !self.sha.is_empty() && !self.sha.is_zero()
    }

    pub fn is_wip(&self) -> bool {
        self.sha.is_zero()
    }

    /// shallow-clone boundary commits are marked with `-`
    pub fn is_boundary(&self) -> bool {
        self.boundary == Some('-')
    }

    pub fn parents_count(&self) -> usize {
        self.parents.len()
    }

    pub fn parent(&self, idx: usize) -> Option<&Sha> {
        self.parents.get(idx)
    }

    pub fn first_parent(&self) -> Option<&Sha> {
        self.parents.first()
    }

    pub fn parents(&self) -> &[Sha] {
        &self.parents
    }

    pub fn is_merge(&self) -> bool {
        self.parents.len() > 1
    }

    pub fn committer(&self) -> &str {
        &self.committer
    }

    pub fn author(&self) -> &str {
        &self.author
    }

    pub fn committed_at(&self) -> DateTime<Utc> {
        self.committed_at
    }

    pub fn short_log(&self) -> &str {
        &self.short_log
    }

    pub fn long_log(&self) -> &str {
        &self.long_log
    }

    pub fn full_log(&self) -> String {
        format!("{}\n\n{}", self.short_log, self.long_log.trim())
    }

    pub fn is_signed(&self) -> bool {
        self.is_signed
    }

    pub fn gpg_key(&self) -> Option<&str> {
        self.gpg_key.as_deref()
    }

    /// The searchable projection: sha prefix plus substring on log, author
    /// and committer, all case-folded.
    pub fn contains(&self, text: &str) -> bool {
        let text = text.to_lowercase();

        self.sha.as_str().starts_with(&text)
            || self.short_log.to_lowercase().contains(&text)
            || self.author.to_lowercase().contains(&text)
            || self.committer.to_lowercase().contains(&text)
    }

    pub fn lanes(&self) -> &[Lane] {
        &self.lanes
    }

    pub fn lane(&self, idx: usize) -> Option<Lane> {
        self.lanes.get(idx).copied()
    }

    pub fn set_lanes(&mut self, lanes: Vec<Lane>) {
        self.lanes = lanes;
    }

    /// Index of the column this commit's node sits in.
    pub fn active_lane(&self) -> Option<usize> {
        self.lanes.iter().position(|l| l.is_active())
    }

    pub fn add_child(&mut self, child: Sha) {
        self.children.insert(child);
    }

    pub fn children(&self) -> &BTreeSet<Sha> {
        &self.children
    }

    pub fn has_children(&self) -> bool {
        !self.children.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn commit(sha: &str, log: &str) -> CommitInfo {
        CommitInfo::new(
            Sha::new(sha).unwrap(),
            Vec::new(),
            None,
            "committer",
            Utc::now(),
            "author",
            log,
        )
    }

    #[test]
    fn test_validity() {
        assert!(commit("abc123", "msg").is_valid());
        assert!(!commit("", "msg").is_valid());

        let wip = CommitInfo::new(Sha::zero(), Vec::new(), None, "-", Utc::now(), "-", "");
        assert!(!wip.is_valid());
        assert!(wip.is_wip());
    }

    #[test]
    fn test_contains_is_case_folded() {
        let c = commit("abc123", "Fix the Widget");

        assert!(c.contains("AB")); // sha prefix
        assert!(c.contains("widget"));
        assert!(c.contains("AUTHOR"));
        assert!(!c.contains("missing"));
        assert!(!c.contains("c123")); // sha matches by prefix only
    }

    #[test]
    fn test_full_log() {
        let c = commit("abc", "summary").with_long_log("body\n");
        assert_eq!(c.full_log(), "summary\n\nbody");
    }

    #[test]
    fn test_signature() {
        let unsigned = commit("abc", "msg");
        assert!(!unsigned.is_signed());
        assert_eq!(unsigned.gpg_key(), None);

        let signed = commit("abc", "msg").with_signature("0badc0de");
        assert!(signed.is_signed());
        assert_eq!(signed.gpg_key(), Some("0badc0de"));
    }

    #[test]
    fn test_children_are_a_set() {
        let mut c = commit("abc", "msg");
        c.add_child(Sha::new("def").unwrap());
        c.add_child(Sha::new("def").unwrap());
        assert_eq!(c.children().len(), 1);
        assert!(c.has_children());
    }
}
