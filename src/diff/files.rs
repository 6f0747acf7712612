//! Per-revision file change records.

use serde::{Deserialize, Serialize};

bitflags::bitflags! {
    /// Change state of one file in a revision, as a bitmask.
    ///
    /// A file can carry several bits at once, e.g. a staged modification is
    /// `MODIFIED | IN_INDEX`, a conflicted one `MODIFIED | CONFLICT`.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FileStatus: u16 {
        const MODIFIED = 1;
        const DELETED = 2;
        const NEW = 4;
        const CONFLICT = 8;
        /// Not under version control.
        const UNKNOWN = 16;
        /// The change is staged in the index.
        const IN_INDEX = 32;
        /// Modified in the working tree on top of a staged change.
        const PARTIALLY_CACHED = 64;
    }
}

impl Serialize for FileStatus {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.bits().serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for FileStatus {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u16::deserialize(deserializer)?;
        Self::from_bits(bits)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid FileStatus bits: {bits:#x}")))
    }
}

/// File change set of one revision: parallel lists of paths, status masks
/// and the 1-based merge parent each entry belongs to.
///
/// `ext_statuses[i]` carries the rename/copy description for entry `i` and
/// may be shorter than the other lists; indices past the last rename/copy
/// have no entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionFiles {
    files: Vec<String>,
    statuses: Vec<FileStatus>,
    merge_parent: Vec<u32>,
    ext_statuses: Vec<String>,
    only_modified: bool,
}

impl Default for RevisionFiles {
    fn default() -> Self {
        Self::new()
    }
}

impl RevisionFiles {
    pub fn new() -> Self {
        Self {
            files: Vec::new(),
            statuses: Vec::new(),
            merge_parent: Vec::new(),
            ext_statuses: Vec::new(),
            only_modified: true,
        }
    }

    /// Number of distinct files in the record.
    pub fn count(&self) -> usize {
        self.files.len()
    }

    pub fn files(&self) -> &[String] {
        &self.files
    }

    pub fn file(&self, idx: usize) -> Option<&str> {
        self.files.get(idx).map(String::as_str)
    }

    pub(crate) fn push_file(&mut self, path: String) {
        self.files.push(path);
    }

    pub fn statuses(&self) -> &[FileStatus] {
        &self.statuses
    }

    /// true iff entry `idx` carries all bits of `flag`
    pub fn status_cmp(&self, idx: usize, flag: FileStatus) -> bool {
        self.statuses.get(idx).is_some_and(|s| s.contains(flag))
    }

    /// Append a new entry with the given status mask.
    pub fn push_status(&mut self, flag: FileStatus) {
        self.statuses.push(flag);
    }

    /// OR extra bits into an existing entry.
    pub fn append_status(&mut self, idx: usize, flag: FileStatus) {
        if let Some(status) = self.statuses.get_mut(idx) {
            *status |= flag;
        }
    }

    /// Decode one raw diff status letter into a new entry.
    ///
    /// `staged` marks changes already recorded in the index.
    pub fn push_status_flag(&mut self, flag: char, staged: bool) {
        match flag {
            'M' | 'T' => {
                self.statuses.push(FileStatus::MODIFIED);
                if staged {
                    self.append_status(self.statuses.len() - 1, FileStatus::IN_INDEX);
                }
            }
            'U' => {
                self.statuses.push(FileStatus::MODIFIED | FileStatus::CONFLICT);
                self.only_modified = false;
            }
            'D' => {
                self.statuses.push(FileStatus::DELETED);
                self.only_modified = false;
                if staged {
                    self.append_status(self.statuses.len() - 1, FileStatus::IN_INDEX);
                }
            }
            'A' => {
                self.statuses.push(FileStatus::NEW);
                self.only_modified = false;
                if staged {
                    self.append_status(self.statuses.len() - 1, FileStatus::IN_INDEX);
                }
            }
            '?' => {
                self.statuses.push(FileStatus::UNKNOWN);
                self.only_modified = false;
            }
            _ => self.statuses.push(FileStatus::MODIFIED),
        }
    }

    pub fn merge_parents(&self) -> &[u32] {
        &self.merge_parent
    }

    pub fn push_merge_parent(&mut self, parent: u32) {
        self.merge_parent.push(parent);
    }

    /// Rename/copy description for entry `idx`, if any.
    pub fn ext_status(&self, idx: usize) -> Option<&str> {
        self.ext_statuses.get(idx).map(String::as_str)
    }

    /// Attach a rename/copy description to the latest entry.
    pub fn append_ext_status(&mut self, info: String) {
        let last = self.statuses.len().saturating_sub(1);
        self.ext_statuses.resize(last, String::new());
        self.ext_statuses.push(info);
    }

    pub fn only_modified(&self) -> bool {
        self.only_modified
    }

    pub fn set_only_modified(&mut self, only_modified: bool) {
        self.only_modified = only_modified;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_flag_decoding() {
        let mut rf = RevisionFiles::new();

        rf.push_status_flag('M', false);
        rf.push_status_flag('M', true);
        rf.push_status_flag('U', false);
        rf.push_status_flag('D', false);
        rf.push_status_flag('A', true);
        rf.push_status_flag('?', false);
        rf.push_status_flag('X', false); // unrecognized falls back to modified

        assert_eq!(rf.statuses()[0], FileStatus::MODIFIED);
        assert_eq!(rf.statuses()[1], FileStatus::MODIFIED | FileStatus::IN_INDEX);
        assert_eq!(rf.statuses()[2], FileStatus::MODIFIED | FileStatus::CONFLICT);
        assert_eq!(rf.statuses()[3], FileStatus::DELETED);
        assert_eq!(rf.statuses()[4], FileStatus::NEW | FileStatus::IN_INDEX);
        assert_eq!(rf.statuses()[5], FileStatus::UNKNOWN);
        assert_eq!(rf.statuses()[6], FileStatus::MODIFIED);
        assert!(!rf.only_modified());
    }

    #[test]
    fn test_only_modified_tracking() {
        let mut rf = RevisionFiles::new();
        assert!(rf.only_modified());

        rf.push_status_flag('M', true);
        assert!(rf.only_modified()); // staged modification is still "only modified"

        rf.push_status_flag('A', false);
        assert!(!rf.only_modified());
    }

    #[test]
    fn test_ext_status_alignment() {
        let mut rf = RevisionFiles::new();

        rf.push_status_flag('M', false); // entry 0, no ext status
        rf.push_status(FileStatus::NEW); // entry 1, renamed dest
        rf.append_ext_status("a.c --> b.c (90%)".to_string());

        assert_eq!(rf.ext_status(0), Some(""));
        assert_eq!(rf.ext_status(1), Some("a.c --> b.c (90%)"));
        assert_eq!(rf.ext_status(2), None);
    }

    #[test]
    fn test_status_cmp_out_of_range() {
        let rf = RevisionFiles::new();
        assert!(!rf.status_cmp(5, FileStatus::MODIFIED));
    }

    #[test]
    fn test_distinct_bits() {
        let all = [
            FileStatus::MODIFIED,
            FileStatus::DELETED,
            FileStatus::NEW,
            FileStatus::CONFLICT,
            FileStatus::UNKNOWN,
            FileStatus::IN_INDEX,
            FileStatus::PARTIALLY_CACHED,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in &all[i + 1..] {
                assert!((*a & *b).is_empty());
            }
        }
    }
}
