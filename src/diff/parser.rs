//! Raw diff header decoding.
//!
//! The input is the newline-separated header output of `git diff-index`
//! and `git diff-tree`: every file change is a line starting with `:`,
//! combined merge entries start with `::`, and any other line separates
//! the output of consecutive merge parents.
//!
//! The single-parent fast path relies on the fixed-width layout of that
//! output: `:<mode> <mode> <sha> <sha> <flag>\t<path>` puts a tab at byte
//! 98 and the path at byte 99; rename and copy entries carry a similarity
//! score instead of the single flag letter and are tab-split from byte 97.
//! These offsets are load-bearing; lines that do not fit either shape are
//! discarded rather than guessed at.

use crate::diff::files::{FileStatus, RevisionFiles};
use crate::diff::names::{FileNamesLoader, NamePool};

/// Byte offset of the `\t` that separates metadata from the path in a
/// single-parent entry.
const FAST_PATH_TAB: usize = 98;
/// Byte offset where the extended (rename/copy) status fields begin.
const EXT_STATUS_START: usize = 97;

/// Decoder for raw diff buffers. Borrows the cache's name pool so every
/// parsed path is interned.
pub struct DiffParser<'a> {
    names: &'a mut NamePool,
}

impl<'a> DiffParser<'a> {
    pub fn new(names: &'a mut NamePool) -> Self {
        Self { names }
    }

    /// Parse a complete buffer into a fresh record and flush it.
    pub fn parse(&mut self, buf: &str) -> RevisionFiles {
        let mut loader = FileNamesLoader::default();
        let mut rf = RevisionFiles::new();

        self.parse_into(buf, &mut loader, &mut rf);
        rf
    }

    /// Parse `buf` into `rf`, interning names through `loader`.
    ///
    /// The loader is flushed into `rf` before returning, so one call binds
    /// exactly one target record.
    pub fn parse_into(&mut self, buf: &str, loader: &mut FileNamesLoader, rf: &mut RevisionFiles) {
        let mut par_num = 1u32;

        for line in buf.split('\n').filter(|l| !l.is_empty()) {
            if !line.starts_with(':') {
                // parent separator in merge output
                par_num += 1;
                continue;
            }

            if let Some(rest) = line.strip_prefix("::") {
                self.parse_combined_merge(rest, loader, rf, par_num);
            } else if line.as_bytes().get(FAST_PATH_TAB) == Some(&b'\t') {
                self.parse_fast_path(line, loader, rf, par_num);
            } else {
                self.parse_ext_status(line, loader, rf, par_num);
            }
        }

        self.names.flush(loader, rf);
    }

    /// Combined merge entry. Rename/copy information is not trustworthy
    /// here (no original name, no similarity), so the file is recorded as
    /// plainly modified.
    fn parse_combined_merge(
        &mut self,
        rest: &str,
        loader: &mut FileNamesLoader,
        rf: &mut RevisionFiles,
        par_num: u32,
    ) {
        let Some(name) = rest.rsplit('\t').next().filter(|n| !n.is_empty()) else {
            return;
        };

        self.names.append(name, loader);
        rf.push_status(FileStatus::MODIFIED);
        rf.push_merge_parent(par_num);
    }

    /// Single-parent entry with the tab at its fixed offset.
    fn parse_fast_path(
        &mut self,
        line: &str,
        loader: &mut FileNamesLoader,
        rf: &mut RevisionFiles,
        par_num: u32,
    ) {
        let fields: Vec<&str> = line[..FAST_PATH_TAB].split(' ').collect();
        if fields.len() < 5 {
            return;
        }

        let dst_sha = fields[3];
        let mut staged = !dst_sha.starts_with("000000");

        let Some(flag) = fields[4].chars().next() else {
            return;
        };
        if flag == 'D' {
            staged = !staged;
        }

        self.names.append(&line[FAST_PATH_TAB + 1..], loader);
        rf.push_status_flag(flag, staged);
        rf.push_merge_parent(par_num);
    }

    /// Rename or copy entry: `R<nn>`/`C<nn>`, original and destination,
    /// tab-separated from the fixed offset. Lines with a different field
    /// count are discarded.
    fn parse_ext_status(
        &mut self,
        line: &str,
        loader: &mut FileNamesLoader,
        rf: &mut RevisionFiles,
        par_num: u32,
    ) {
        if line.len() <= EXT_STATUS_START || !line.is_char_boundary(EXT_STATUS_START) {
            return;
        }

        let fields: Vec<&str> = line[EXT_STATUS_START..]
            .split('\t')
            .filter(|f| !f.is_empty())
            .collect();
        let (kind, orig, dest) = match fields[..] {
            [kind, orig, dest] => (kind, orig, dest),
            _ => return,
        };

        let Some(letter) = kind.chars().next() else {
            return;
        };
        let similarity: u32 = kind[letter.len_utf8()..].parse().unwrap_or(0);
        let info = format!("{orig} --> {dest} ({similarity}%)");

        // the destination shows up as a new file
        self.names.append(dest, loader);
        rf.push_merge_parent(par_num);
        rf.push_status(FileStatus::NEW);
        rf.append_ext_status(info.clone());

        // a rename additionally deletes the original
        if letter == 'R' {
            self.names.append(orig, loader);
            rf.push_merge_parent(par_num);
            rf.push_status(FileStatus::DELETED);
            rf.append_ext_status(info);
        }

        rf.set_only_modified(false);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Build a fast-path line: 15 bytes of modes, two 40-char shas and the
    /// flag put the tab at byte 98.
    fn fast_line(flag: char, dst_sha_prefix: &str, file: &str) -> String {
        let src = "a".repeat(40);
        let mut dst = dst_sha_prefix.to_string();
        dst.push_str(&"b".repeat(40 - dst.len()));
        format!(":100644 100644 {src} {dst} {flag}\t{file}")
    }

    fn ext_line(kind: &str, orig: &str, dest: &str) -> String {
        let src = "a".repeat(40);
        let dst = "b".repeat(40);
        format!(":100644 100644 {src} {dst} {kind}\t{orig}\t{dest}")
    }

    #[test]
    fn test_fast_path_modified() {
        let mut pool = NamePool::new();
        let line = fast_line('M', "deadbe", "src/main.rs");

        let rf = DiffParser::new(&mut pool).parse(&line);

        assert_eq!(rf.files(), &["src/main.rs".to_string()]);
        assert_eq!(rf.statuses()[0], FileStatus::MODIFIED | FileStatus::IN_INDEX);
        assert_eq!(rf.merge_parents(), &[1]);
    }

    #[test]
    fn test_fast_path_unstaged_zero_sha() {
        let mut pool = NamePool::new();
        let line = fast_line('M', "000000", "a.txt");

        let rf = DiffParser::new(&mut pool).parse(&line);

        assert_eq!(rf.statuses()[0], FileStatus::MODIFIED);
        assert!(!rf.status_cmp(0, FileStatus::IN_INDEX));
    }

    #[test]
    fn test_deletion_inverts_staged_bit() {
        let mut pool = NamePool::new();
        // deleted in the working tree: dst blob is all zeros, which after
        // the inversion marks the deletion as staged
        let line = fast_line('D', "000000", "gone.txt");

        let rf = DiffParser::new(&mut pool).parse(&line);

        assert_eq!(rf.statuses()[0], FileStatus::DELETED | FileStatus::IN_INDEX);
        assert!(!rf.only_modified());
    }

    #[test]
    fn test_rename_emits_new_and_deleted() {
        let mut pool = NamePool::new();
        let line = ext_line("R85", "old.c", "new.c");

        let rf = DiffParser::new(&mut pool).parse(&line);

        assert_eq!(rf.files(), &["new.c".to_string(), "old.c".to_string()]);
        assert_eq!(rf.statuses()[0], FileStatus::NEW);
        assert_eq!(rf.statuses()[1], FileStatus::DELETED);
        assert_eq!(rf.ext_status(0), Some("old.c --> new.c (85%)"));
        assert_eq!(rf.ext_status(1), Some("old.c --> new.c (85%)"));
        assert!(!rf.only_modified());
    }

    #[test]
    fn test_copy_emits_only_new() {
        let mut pool = NamePool::new();
        let line = ext_line("C100", "base.h", "copy.h");

        let rf = DiffParser::new(&mut pool).parse(&line);

        assert_eq!(rf.files(), &["copy.h".to_string()]);
        assert_eq!(rf.statuses()[0], FileStatus::NEW);
        assert_eq!(rf.ext_status(0), Some("base.h --> copy.h (100%)"));
    }

    #[test]
    fn test_malformed_ext_status_discarded() {
        let mut pool = NamePool::new();
        let src = "a".repeat(40);
        let dst = "b".repeat(40);
        // two tab fields instead of three
        let line = format!(":100644 100644 {src} {dst} R85\tonly-one.c");

        let rf = DiffParser::new(&mut pool).parse(&line);

        assert_eq!(rf.count(), 0);
    }

    #[test]
    fn test_combined_merge_forces_modified() {
        let mut pool = NamePool::new();
        let src = "a".repeat(40);
        let dst = "b".repeat(40);
        let line = format!("::100644 100644 100644 {src} {src} {dst} MM\tsrc/conflict.rs");

        let rf = DiffParser::new(&mut pool).parse(&line);

        assert_eq!(rf.files(), &["src/conflict.rs".to_string()]);
        assert_eq!(rf.statuses()[0], FileStatus::MODIFIED);
    }

    #[test]
    fn test_parent_separator_increments_merge_parent() {
        let mut pool = NamePool::new();
        let buf = format!(
            "{}\n{}\n{}",
            fast_line('M', "deadbe", "first.rs"),
            "abcdef0123", // separator: a sha line between parent blocks
            fast_line('M', "deadbe", "second.rs"),
        );

        let rf = DiffParser::new(&mut pool).parse(&buf);

        assert_eq!(rf.merge_parents(), &[1, 2]);
    }

    #[test]
    fn test_files_reconstructable_from_pool() {
        let mut pool = NamePool::new();
        let buf = format!(
            "{}\n{}",
            fast_line('M', "deadbe", "src/a.rs"),
            fast_line('A', "deadbe", "src/b.rs"),
        );

        let rf = DiffParser::new(&mut pool).parse(&buf);

        for file in rf.files() {
            let rebuilt = pool
                .dir_names()
                .iter()
                .flat_map(|d| pool.file_names().iter().map(move |n| format!("{d}{n}")))
                .any(|p| p == *file);
            assert!(rebuilt, "{file} not reconstructable");
        }
    }
}
