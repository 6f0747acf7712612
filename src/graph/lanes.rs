//! Streaming lane assignment for the railway-style history graph.
//!
//! The engine consumes commits newest-first and keeps one column per line
//! of development. Each column tracks the sha it expects next (`targets`);
//! when a commit arrives, the columns waiting for it collapse into a fork
//! node, extra parents of a merge open new columns, and the row is
//! snapshotted as the commit's lane vector before the state advances.
//!
//! Per-commit transition order is fixed:
//! 1. `is_fork` (also reports a discontinuity of the active column),
//! 2. `change_active_lane` on discontinuity,
//! 3. `set_fork` / `set_merge` / `set_initial` as applicable,
//! 4. snapshot,
//! 5. `next_parent`, then `after_merge` / `after_fork` / `after_branch`
//!    compaction.

use crate::types::Sha;

/// Glyph class of one column slot in one row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Lane {
    Empty,
    /// The commit's own column.
    Active,
    /// A line of development passing through this row.
    NotActive,
    /// Node of a fork and/or merge commit.
    MergeFork,
    MergeForkLeft,
    MergeForkRight,
    /// A merge source joining the node from the side.
    Join,
    JoinLeft,
    JoinRight,
    /// First row of a lane opened for an extra merge parent.
    Head,
    HeadLeft,
    HeadRight,
    /// Last row of a lane collapsing into a fork node.
    Tail,
    TailLeft,
    TailRight,
    /// A passing lane crossed by a horizontal connector.
    Cross,
    CrossEmpty,
    /// Root commit marker.
    Initial,
    /// First row of a newly discovered branch tip.
    Branch,
    /// Shallow-history boundary variants.
    Boundary,
    BoundaryCommit,
    BoundaryLeft,
    BoundaryRight,
}

impl Lane {
    pub fn is_head(self) -> bool {
        matches!(self, Lane::Head | Lane::HeadLeft | Lane::HeadRight)
    }

    pub fn is_tail(self) -> bool {
        matches!(self, Lane::Tail | Lane::TailLeft | Lane::TailRight)
    }

    pub fn is_join(self) -> bool {
        matches!(self, Lane::Join | Lane::JoinLeft | Lane::JoinRight)
    }

    pub fn is_boundary(self) -> bool {
        matches!(
            self,
            Lane::Boundary | Lane::BoundaryCommit | Lane::BoundaryLeft | Lane::BoundaryRight
        )
    }

    /// Node glyphs: the slots a commit itself can occupy in its row.
    pub fn is_merge(self) -> bool {
        matches!(self, Lane::MergeFork | Lane::MergeForkLeft | Lane::MergeForkRight)
            || self.is_boundary()
    }

    pub fn is_active(self) -> bool {
        matches!(self, Lane::Active | Lane::Initial | Lane::Branch) || self.is_merge()
    }

    /// A slot a new lane may be routed through.
    pub fn is_free(self) -> bool {
        matches!(self, Lane::NotActive | Lane::Cross) || self.is_join()
    }
}

/// The streaming lane state machine.
#[derive(Debug)]
pub struct Lanes {
    active: usize,
    kinds: Vec<Lane>,
    targets: Vec<Option<Sha>>,
    boundary: bool,
    // node glyph set, swapped when tracking a boundary commit
    node: Lane,
    node_left: Lane,
    node_right: Lane,
}

impl Default for Lanes {
    fn default() -> Self {
        Self::new()
    }
}

impl Lanes {
    pub fn new() -> Self {
        Self {
            active: 0,
            kinds: Vec::new(),
            targets: Vec::new(),
            boundary: false,
            node: Lane::MergeFork,
            node_left: Lane::MergeForkLeft,
            node_right: Lane::MergeForkRight,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Number of columns currently tracked.
    pub fn width(&self) -> usize {
        self.kinds.len()
    }

    pub fn clear(&mut self) {
        self.kinds.clear();
        self.targets.clear();
    }

    /// Start tracking with a single branch column expecting `sha`.
    pub fn init(&mut self, sha: &Sha) {
        self.clear();
        self.active = 0;
        self.set_boundary(false);
        self.add(Lane::Branch, Some(sha.clone()), self.active);
    }

    fn set_boundary(&mut self, boundary: bool) {
        self.node = if boundary { Lane::BoundaryCommit } else { Lane::MergeFork };
        self.node_left = if boundary { Lane::BoundaryLeft } else { Lane::MergeForkLeft };
        self.node_right = if boundary { Lane::BoundaryRight } else { Lane::MergeForkRight };
        self.boundary = boundary;

        if boundary {
            self.add(Lane::Boundary, None, self.active);
        }
    }

    /// Does any column wait for `sha` more than once? The second flag
    /// reports a discontinuity: the column waiting for `sha` is not the
    /// active one (including the case where none waits for it yet).
    pub fn is_fork(&self, sha: &Sha) -> (bool, bool) {
        let pos = self.find_target(sha, 0);
        let discontinuity = pos != Some(self.active);

        match pos {
            None => (false, discontinuity), // new branch tip
            Some(pos) => (self.find_target(sha, pos + 1).is_some(), discontinuity),
        }
    }

    /// Migrate the active column to the one waiting for `sha`, opening a
    /// branch column when none does.
    pub fn change_active_lane(&mut self, sha: &Sha) {
        let t = &mut self.kinds[self.active];
        *t = if *t == Lane::Initial || t.is_boundary() {
            Lane::Empty
        } else {
            Lane::NotActive
        };

        match self.find_target(sha, 0) {
            Some(idx) => {
                self.kinds[idx] = Lane::Active;
                self.active = idx;
            }
            None => {
                self.active = self.add(Lane::Branch, Some(sha.clone()), self.active);
            }
        }
    }

    /// Collapse every column waiting for `sha` into tails around the node.
    pub fn set_fork(&mut self, sha: &Sha) {
        let mut idx = self.find_target(sha, 0);
        let range_start = idx.unwrap_or(self.active);
        let mut range_end = range_start;

        while let Some(i) = idx {
            range_end = i;
            self.kinds[i] = Lane::Tail;
            idx = self.find_target(sha, i + 1);
        }

        self.kinds[self.active] = self.node;

        if self.kinds[range_start] == self.node {
            self.kinds[range_start] = self.node_left;
        }
        if self.kinds[range_end] == self.node {
            self.kinds[range_end] = self.node_right;
        }
        if self.kinds[range_start] == Lane::Tail {
            self.kinds[range_start] = Lane::TailLeft;
        }
        if self.kinds[range_end] == Lane::Tail {
            self.kinds[range_end] = Lane::TailRight;
        }

        for i in range_start + 1..range_end {
            match self.kinds[i] {
                Lane::NotActive => self.kinds[i] = Lane::Cross,
                Lane::Empty => self.kinds[i] = Lane::CrossEmpty,
                _ => {}
            }
        }
    }

    /// Route every extra parent of a merge into the node, opening head
    /// columns for parents no column waits for. `set_fork` runs first.
    pub fn set_merge(&mut self, parents: &[Sha]) {
        if self.boundary {
            return; // treated as a plain active line
        }

        let t = self.kinds[self.active];
        let was_fork = t == self.node;
        let was_fork_left = t == self.node_left;
        let was_fork_right = t == self.node_right;
        let mut start_join_was_cross = false;
        let mut end_join_was_cross = false;

        self.kinds[self.active] = self.node;

        let mut range_start = self.active;
        let mut range_end = self.active;

        for parent in parents.iter().skip(1) {
            match self.find_target(parent, 0) {
                Some(idx) => {
                    if idx > range_end {
                        range_end = idx;
                        end_join_was_cross = self.kinds[idx] == Lane::Cross;
                    }
                    if idx < range_start {
                        range_start = idx;
                        start_join_was_cross = self.kinds[idx] == Lane::Cross;
                    }
                    self.kinds[idx] = Lane::Join;
                }
                None => {
                    range_end = self.add(Lane::Head, Some(parent.clone()), range_end + 1);
                }
            }
        }

        if self.kinds[range_start] == self.node && !was_fork && !was_fork_right {
            self.kinds[range_start] = self.node_left;
        }
        if self.kinds[range_end] == self.node && !was_fork && !was_fork_left {
            self.kinds[range_end] = self.node_right;
        }
        if self.kinds[range_start] == Lane::Join && !start_join_was_cross {
            self.kinds[range_start] = Lane::JoinLeft;
        }
        if self.kinds[range_end] == Lane::Join && !end_join_was_cross {
            self.kinds[range_end] = Lane::JoinRight;
        }
        if self.kinds[range_start] == Lane::Head {
            self.kinds[range_start] = Lane::HeadLeft;
        }
        if self.kinds[range_end] == Lane::Head {
            self.kinds[range_end] = Lane::HeadRight;
        }

        for i in range_start + 1..range_end {
            match self.kinds[i] {
                Lane::NotActive => self.kinds[i] = Lane::Cross,
                Lane::Empty => self.kinds[i] = Lane::CrossEmpty,
                Lane::TailLeft | Lane::TailRight => self.kinds[i] = Lane::Tail,
                _ => {}
            }
        }
    }

    /// Mark the active column as a root commit.
    pub fn set_initial(&mut self) {
        let t = self.kinds[self.active];
        if !self.is_node(t) {
            self.kinds[self.active] = if self.boundary { Lane::Boundary } else { Lane::Initial };
        }
    }

    /// Point the active column at the commit's first parent.
    pub fn next_parent(&mut self, sha: Option<&Sha>) {
        self.targets[self.active] = if self.boundary { None } else { sha.cloned() };
    }

    pub fn after_merge(&mut self) {
        if self.boundary {
            return; // reset later by change_active_lane
        }

        for t in &mut self.kinds {
            if t.is_head() || t.is_join() || *t == Lane::Cross {
                *t = Lane::NotActive;
            } else if *t == Lane::CrossEmpty {
                *t = Lane::Empty;
            } else if matches!(*t, Lane::MergeFork | Lane::MergeForkLeft | Lane::MergeForkRight) {
                *t = Lane::Active;
            }
        }
    }

    pub fn after_fork(&mut self) {
        for i in 0..self.kinds.len() {
            let t = self.kinds[i];
            if t == Lane::Cross {
                self.kinds[i] = Lane::NotActive;
            } else if t.is_tail() || t == Lane::CrossEmpty {
                self.kinds[i] = Lane::Empty;
            }
            if !self.boundary && self.is_node(self.kinds[i]) {
                self.kinds[i] = Lane::Active;
            }
        }

        // compact trailing empty columns
        while self.kinds.last() == Some(&Lane::Empty) {
            self.kinds.pop();
            self.targets.pop();
        }
    }

    pub fn is_branch(&self) -> bool {
        self.kinds[self.active] == Lane::Branch
    }

    pub fn after_branch(&mut self) {
        self.kinds[self.active] = Lane::Active;
    }

    /// Deep copy of the current row.
    pub fn snapshot(&self) -> Vec<Lane> {
        self.kinds.clone()
    }

    fn is_node(&self, t: Lane) -> bool {
        t == self.node || t == self.node_left || t == self.node_right
    }

    fn find_target(&self, sha: &Sha, from: usize) -> Option<usize> {
        self.targets
            .iter()
            .skip(from)
            .position(|t| t.as_ref() == Some(sha))
            .map(|i| i + from)
    }

    /// Claim the first empty column at or after `pos`, appending a new one
    /// when none is free.
    fn add(&mut self, kind: Lane, target: Option<Sha>, pos: usize) -> usize {
        if pos < self.kinds.len() {
            if let Some(idx) = self.kinds.iter().skip(pos).position(|k| *k == Lane::Empty) {
                let idx = idx + pos;
                self.kinds[idx] = kind;
                self.targets[idx] = target;
                return idx;
            }
        }

        self.kinds.push(kind);
        self.targets.push(target);
        self.kinds.len() - 1
    }
}
