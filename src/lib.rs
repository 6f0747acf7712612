//! RevCache - an in-memory commit graph cache for Git history viewers
//!
//! The cache ingests a newest-first commit history plus a synthetic
//! work-in-progress row, assigns each commit the lane vector a
//! railway-style history diagram needs, parses raw diff output into
//! per-revision file change sets (rename/copy detection included) and
//! answers queries behind one reentrant lock. It is entirely volatile:
//! nothing is persisted, and it never talks to a repository itself.
//!
//! # Example
//!
//! ```
//! use chrono::Utc;
//! use revcache::cache::RepoCache;
//! use revcache::graph::CommitInfo;
//! use revcache::types::{Sha, WipRevisionInfo};
//!
//! let cache = RepoCache::new();
//!
//! let head = CommitInfo::new(
//!     Sha::new("a1b2c3").unwrap(),
//!     Vec::new(),
//!     None,
//!     "dev",
//!     Utc::now(),
//!     "dev",
//!     "initial commit",
//! );
//! let wip = WipRevisionInfo {
//!     parent_sha: Sha::new("a1b2c3").unwrap(),
//!     ..Default::default()
//! };
//!
//! cache.setup(&wip, vec![head]);
//! assert_eq!(cache.count(), 2);
//! assert!(cache.commit_by_sha("a1b").is_some());
//! ```

pub mod cache;
pub mod diff;
pub mod graph;
pub mod types;
