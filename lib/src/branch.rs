//! A single persistent, file-backed sequence of headers.
//!
//! Grounded on the `Blockchain` class in
//! `original_source/lib/blockchain.py`: `path`/`calculate_size`/`read_header`/
//! `write`/`save_header`. A `Branch` only knows about its own file; stitching
//! branches into a forest, walking to a parent for heights below a branch's
//! checkpoint, and reorganizing are `ChainStore`'s job (see `store.rs`).

use crate::error::{CoreError, Result};
use crate::params;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Byte offset, within a branch starting at `checkpoint`, of the header at
/// `height`. Headers before `BUBBLES_ACTIVATION_HEIGHT` occupy 1487-byte
/// slots, those at or after occupy 543-byte slots, packed contiguously so a
/// branch straddling the fork still has a dense file.
pub fn offset(checkpoint: i64, height: i64) -> i64 {
    let fork = params::BUBBLES_ACTIVATION_HEIGHT;
    let pre = height.min(fork) - checkpoint.min(fork);
    let post = (height - checkpoint.max(fork)).max(0);
    pre * params::HDR_LEN as i64 + post * params::HDR_POST_FORK_LEN as i64
}

/// Inverse of `offset`: how many whole headers fit in `file_len` bytes
/// starting at `checkpoint`.
pub fn calculate_size(checkpoint: i64, file_len: i64) -> i64 {
    let fork = params::BUBBLES_ACTIVATION_HEIGHT;
    if checkpoint >= fork {
        return file_len / params::HDR_POST_FORK_LEN as i64;
    }
    let pre_capacity = (fork - checkpoint) * params::HDR_LEN as i64;
    let pre_part = file_len.min(pre_capacity);
    let post_part = (file_len - pre_part).max(0);
    pre_part / params::HDR_LEN as i64 + post_part / params::HDR_POST_FORK_LEN as i64
}

pub fn root_path(datadir: &Path) -> PathBuf {
    datadir.join("blockchain_headers")
}

pub fn fork_path(datadir: &Path, parent_checkpoint: i64, checkpoint: i64) -> PathBuf {
    datadir
        .join("forks")
        .join(format!("fork_{}_{}", parent_checkpoint, checkpoint))
}

struct BranchInner {
    file: File,
    path: PathBuf,
    parent_id: Option<i64>,
    checkpoint: i64,
    size: i64,
}

/// A branch's header count, checkpoint and parent id, guarded by one lock
/// together with its open file handle, per the single-writer/multi-reader
/// model: readers snapshot size then seek+read without yielding the lock,
/// writers hold it across the full write including `fsync`.
pub struct Branch {
    inner: Mutex<BranchInner>,
}

impl Branch {
    /// Open (creating if absent) the file for a branch at `path`, whose
    /// size is re-derived from the file's actual length rather than
    /// trusted from any stored metadata.
    pub fn open(path: PathBuf, parent_id: Option<i64>, checkpoint: i64) -> Result<Branch> {
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&path)?;
        let file_len = file.metadata()?.len() as i64;
        let size = calculate_size(checkpoint, file_len);
        Ok(Branch {
            inner: Mutex::new(BranchInner {
                file,
                path,
                parent_id,
                checkpoint,
                size,
            }),
        })
    }

    pub fn checkpoint(&self) -> i64 {
        self.inner.lock().unwrap().checkpoint
    }

    pub fn parent_id(&self) -> Option<i64> {
        self.inner.lock().unwrap().parent_id
    }

    pub fn path(&self) -> PathBuf {
        self.inner.lock().unwrap().path.clone()
    }

    pub fn size(&self) -> i64 {
        self.inner.lock().unwrap().size
    }

    /// Height of the last header this branch holds; `checkpoint - 1` if
    /// empty, matching the root's pre-genesis state.
    pub fn height(&self) -> i64 {
        let inner = self.inner.lock().unwrap();
        inner.checkpoint + inner.size - 1
    }

    /// The raw wire bytes at `height`, or `None` for a sparse all-zero
    /// slot. Returns `HeaderNotFound` for a height outside this branch's
    /// own range (below `checkpoint` or above `height()`); the caller
    /// (`ChainStore`) is responsible for walking to the parent below
    /// `checkpoint`.
    pub fn read_at_height(&self, height: i64) -> Result<Option<Vec<u8>>> {
        let mut inner = self.inner.lock().unwrap();
        if height < inner.checkpoint {
            return Err(CoreError::HeaderNotFound(height));
        }
        if height > inner.checkpoint + inner.size - 1 {
            return Ok(None);
        }
        let off = offset(inner.checkpoint, height);
        let len = params::header_size(height);
        let mut buf = vec![0u8; len];
        inner.file.seek(SeekFrom::Start(off as u64))?;
        inner.file.read_exact(&mut buf)?;
        if buf.iter().all(|&b| b == 0) {
            Ok(None)
        } else {
            Ok(Some(buf))
        }
    }

    /// `r+b`-style write: seek to `offset`, optionally truncate first,
    /// write `data`, `fsync`, then refresh the cached header count from
    /// the file's new length.
    pub fn write(&self, data: &[u8], byte_offset: i64, truncate: bool) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if truncate {
            inner.file.set_len(byte_offset as u64)?;
        }
        inner.file.seek(SeekFrom::Start(byte_offset as u64))?;
        inner.file.write_all(data)?;
        inner.file.sync_all()?;
        let file_len = inner.file.metadata()?.len() as i64;
        inner.size = calculate_size(inner.checkpoint, file_len);
        Ok(())
    }

    /// Header-aligned convenience over `write`: appends/overwrites a single
    /// header at `height`, truncating anything that used to follow it.
    pub fn save_header(&self, height: i64, data: &[u8]) -> Result<()> {
        let checkpoint = self.checkpoint();
        let off = offset(checkpoint, height);
        self.write(data, off, true)
    }

    /// Replaces this branch's entire file content by writing `content` to a
    /// side file in the same directory, `fsync`ing it, and renaming it over
    /// the branch's current path. Used by `ChainStore::swap_with_parent`,
    /// where a crash between the two files' overwrites must never leave
    /// either one partially truncated: the old file stays intact and
    /// readable right up until the atomic rename lands the new one in its
    /// place, unlike a `set_len`-then-`write_all` in place.
    pub fn replace_contents(&self, content: &[u8]) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        let tmp_path = {
            let mut name = inner
                .path
                .file_name()
                .expect("branch path always has a file name")
                .to_os_string();
            name.push(".swap-tmp");
            inner.path.with_file_name(name)
        };
        {
            let mut tmp = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&tmp_path)?;
            tmp.write_all(content)?;
            tmp.sync_all()?;
        }
        std::fs::rename(&tmp_path, &inner.path)?;
        let reopened = OpenOptions::new()
            .read(true)
            .write(true)
            .open(&inner.path)?;
        inner.size = calculate_size(inner.checkpoint, content.len() as i64);
        inner.file = reopened;
        Ok(())
    }

    /// Bytes `[byte_offset, byte_offset+len)`, used by `swap_with_parent`
    /// to move a branch's suffix wholesale.
    pub fn read_range(&self, byte_offset: i64, len: i64) -> Result<Vec<u8>> {
        let mut inner = self.inner.lock().unwrap();
        let mut buf = vec![0u8; len as usize];
        inner.file.seek(SeekFrom::Start(byte_offset as u64))?;
        inner.file.read_exact(&mut buf)?;
        Ok(buf)
    }

    pub fn file_len(&self) -> Result<i64> {
        let inner = self.inner.lock().unwrap();
        Ok(inner.file.metadata()?.len() as i64)
    }

    /// Swap this branch's `(parent_id, checkpoint, size)` triple with
    /// `other`'s and rename the underlying file to `new_path`. Used by
    /// `ChainStore::swap_with_parent` once the file *contents* have already
    /// been exchanged on disk; this only updates in-memory bookkeeping and
    /// the path, so callers must persist content before calling this.
    pub fn adopt_identity(&self, parent_id: Option<i64>, checkpoint: i64, size: i64, new_path: PathBuf) -> Result<()> {
        let mut inner = self.inner.lock().unwrap();
        if inner.path != new_path {
            std::fs::rename(&inner.path, &new_path)?;
            inner.path = new_path;
        }
        inner.parent_id = parent_id;
        inner.checkpoint = checkpoint;
        inner.size = size;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn offset_is_zero_at_the_checkpoint() {
        assert_eq!(offset(100, 100), 0);
    }

    #[test]
    fn offset_spans_the_fork_boundary() {
        let cp = params::BUBBLES_ACTIVATION_HEIGHT - 2;
        assert_eq!(offset(cp, cp), 0);
        assert_eq!(offset(cp, cp + 1), params::HDR_LEN as i64);
        assert_eq!(offset(cp, cp + 2), 2 * params::HDR_LEN as i64);
        assert_eq!(
            offset(cp, cp + 3),
            2 * params::HDR_LEN as i64 + params::HDR_POST_FORK_LEN as i64
        );
    }

    #[test]
    fn offset_strictly_monotonic_in_height() {
        let cp = params::BUBBLES_ACTIVATION_HEIGHT - 5;
        let mut last = offset(cp, cp);
        for h in (cp + 1)..(cp + 20) {
            let o = offset(cp, h);
            assert!(o > last);
            last = o;
        }
    }

    #[test]
    fn calculate_size_inverts_offset() {
        let cp = params::BUBBLES_ACTIVATION_HEIGHT - 3;
        for count in 0..10 {
            let height = cp + count;
            let len = offset(cp, height) + params::header_size(height.max(cp)) as i64;
            assert_eq!(calculate_size(cp, len), count + 1);
        }
    }

    #[test]
    fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let branch = Branch::open(dir.path().join("blockchain_headers"), None, 0).unwrap();
        let header = vec![0xAB; params::HDR_LEN];
        branch.save_header(0, &header).unwrap();
        assert_eq!(branch.size(), 1);
        assert_eq!(branch.height(), 0);
        assert_eq!(branch.read_at_height(0).unwrap(), Some(header));
    }

    #[test]
    fn sparse_zero_slot_reads_as_none() {
        let dir = tempdir().unwrap();
        let branch = Branch::open(dir.path().join("blockchain_headers"), None, 0).unwrap();
        let zero_header = vec![0u8; params::HDR_LEN];
        branch.save_header(0, &zero_header).unwrap();
        assert_eq!(branch.read_at_height(0).unwrap(), None);
    }

    #[test]
    fn save_header_truncates_anything_after_it() {
        let dir = tempdir().unwrap();
        let branch = Branch::open(dir.path().join("blockchain_headers"), None, 0).unwrap();
        branch.save_header(0, &vec![1u8; params::HDR_LEN]).unwrap();
        branch.save_header(1, &vec![2u8; params::HDR_LEN]).unwrap();
        assert_eq!(branch.size(), 2);
        branch.save_header(0, &vec![3u8; params::HDR_LEN]).unwrap();
        assert_eq!(branch.size(), 1);
        assert_eq!(branch.height(), 0);
    }

    #[test]
    fn replace_contents_swaps_the_file_via_rename_and_no_side_file_survives() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("blockchain_headers");
        let branch = Branch::open(path.clone(), None, 0).unwrap();
        branch.save_header(0, &vec![1u8; params::HDR_LEN]).unwrap();

        let new_content = vec![9u8; params::HDR_LEN * 2];
        branch.replace_contents(&new_content).unwrap();

        assert_eq!(branch.size(), 2);
        assert_eq!(branch.read_range(0, new_content.len() as i64).unwrap(), new_content);
        assert!(!path.with_file_name("blockchain_headers.swap-tmp").exists());
    }
}
