use std::collections::HashMap;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, error};

use crate::core::error::{Error, ErrorKind, Result};
use crate::ehash::{hash_key, Record};

/// Filesystem block granularity; bucket files are a whole number of blocks.
pub const BLOCK_SIZE: usize = 4096;

/// Round a requested bucket capacity up to a whole number of blocks.
pub fn align_to_block(size: usize) -> usize {
    size.div_ceil(BLOCK_SIZE) * BLOCK_SIZE
}

/// A fixed-size bucket file and its in-memory state.
///
/// On disk: repeated `(u32 length_le, entry bytes)` followed by zero padding
/// up to `max_bucket_size`. In memory: the decoded entries plus a map from
/// key hash to entry position. `dirty` is set iff memory diverges from disk.
pub struct Bucket<R: Record> {
    pub path: PathBuf,
    pub max_bucket_size: usize,
    entries: Vec<R>,
    sizes: Vec<usize>,
    hash_map: HashMap<u64, usize>,
    current_size: usize,
    dirty: bool,
}

impl<R: Record> Bucket<R> {
    /// Open a bucket, reading any entries already on disk.
    pub fn open(path: PathBuf, max_bucket_size: usize) -> Result<Self> {
        let mut bucket = Bucket {
            path,
            max_bucket_size,
            entries: Vec::new(),
            sizes: Vec::new(),
            hash_map: HashMap::new(),
            current_size: 0,
            dirty: false,
        };

        if bucket.path.exists() {
            bucket.read_from_disk()?;
        } else {
            // Nothing on disk yet; the file materialises on first persist.
            bucket.dirty = true;
        }

        Ok(bucket)
    }

    /// Create a bucket that ignores any stale file at `path`.
    ///
    /// Used for split siblings: a leftover file from a previous process must
    /// not leak entries into a freshly allocated bucket.
    pub fn create(path: PathBuf, max_bucket_size: usize) -> Self {
        Bucket {
            path,
            max_bucket_size,
            entries: Vec::new(),
            sizes: Vec::new(),
            hash_map: HashMap::new(),
            current_size: 0,
            dirty: true,
        }
    }

    fn read_from_disk(&mut self) -> Result<()> {
        let mut file = File::open(&self.path)?;
        let mut len_buf = [0u8; 4];

        while self.current_size + 4 <= self.max_bucket_size {
            match file.read_exact(&mut len_buf) {
                Ok(()) => {}
                Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => break,
                Err(e) => return Err(e.into()),
            }
            let len = u32::from_le_bytes(len_buf) as usize;
            if len == 0 {
                // Zero prefix marks the start of the padding.
                break;
            }
            if self.current_size + 4 + len > self.max_bucket_size {
                return Err(Error::corrupt(format!(
                    "entry of {} bytes exceeds bucket capacity in {}",
                    len,
                    self.path.display()
                )));
            }

            let mut data = vec![0u8; len];
            file.read_exact(&mut data).map_err(|_| {
                Error::corrupt(format!("truncated entry in {}", self.path.display()))
            })?;
            let record: R = bincode::deserialize(&data)?;

            let hash = hash_key(&record.key());
            self.hash_map.insert(hash, self.entries.len());
            self.entries.push(record);
            self.sizes.push(len);
            self.current_size += 4 + len;
        }

        debug!(
            "loaded {} entries ({} bytes) from {}",
            self.entries.len(),
            self.current_size,
            self.path.display()
        );
        Ok(())
    }

    pub fn has_hash(&self, hash: u64) -> bool {
        self.hash_map.contains_key(&hash)
    }

    pub fn get(&self, hash: u64) -> Option<&R> {
        self.hash_map.get(&hash).map(|&idx| &self.entries[idx])
    }

    pub fn entries(&self) -> &[R] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Would a new entry of `encoded_len` bytes fit?
    pub fn can_fit(&self, encoded_len: usize) -> bool {
        self.current_size + 4 + encoded_len <= self.max_bucket_size
    }

    /// Would replacing the entry for `hash` with one of `encoded_len` bytes fit?
    pub fn fits_update(&self, hash: u64, encoded_len: usize) -> bool {
        match self.hash_map.get(&hash) {
            Some(&idx) => self.current_size - self.sizes[idx] + encoded_len <= self.max_bucket_size,
            None => false,
        }
    }

    /// Append a new entry. Caller has checked `can_fit` and hash uniqueness.
    pub fn append(&mut self, hash: u64, record: R, encoded_len: usize) {
        self.hash_map.insert(hash, self.entries.len());
        self.entries.push(record);
        self.sizes.push(encoded_len);
        self.current_size += 4 + encoded_len;
        self.dirty = true;
    }

    /// Replace the entry for `hash` in place.
    pub fn update(&mut self, hash: u64, record: R, encoded_len: usize) {
        if let Some(&idx) = self.hash_map.get(&hash) {
            self.current_size = self.current_size - self.sizes[idx] + encoded_len;
            self.entries[idx] = record;
            self.sizes[idx] = encoded_len;
            self.dirty = true;
        }
    }

    /// Remove the entry for `hash`; false when absent.
    pub fn remove(&mut self, hash: u64) -> bool {
        let Some(idx) = self.hash_map.remove(&hash) else {
            return false;
        };
        self.entries.remove(idx);
        let size = self.sizes.remove(idx);
        self.current_size -= 4 + size;
        // Entries above the hole shifted down one slot.
        for position in self.hash_map.values_mut() {
            if *position > idx {
                *position -= 1;
            }
        }
        self.dirty = true;
        true
    }

    /// Take every entry out for redistribution, leaving the bucket empty.
    pub fn drain(&mut self) -> Vec<(u64, R, usize)> {
        let entries = std::mem::take(&mut self.entries);
        let sizes = std::mem::take(&mut self.sizes);
        self.hash_map.clear();
        self.current_size = 0;
        self.dirty = true;

        entries
            .into_iter()
            .zip(sizes)
            .map(|(record, size)| (hash_key(&record.key()), record, size))
            .collect()
    }

    /// Write the bucket to disk if it has diverged: serialise every entry,
    /// pad with zeros to the fixed capacity, then atomically replace the
    /// file via rename.
    pub fn persist(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let tmp_path = self.path.with_extension("dat.tmp");
        let mut file = File::create(&tmp_path)?;

        let mut written = 0usize;
        for record in &self.entries {
            let data = bincode::serialize(record)?;
            if written + 4 + data.len() > self.max_bucket_size {
                return Err(Error::new(
                    ErrorKind::Internal,
                    format!("bucket overflow while persisting {}", self.path.display()),
                ));
            }
            file.write_all(&(data.len() as u32).to_le_bytes())?;
            file.write_all(&data)?;
            written += 4 + data.len();
        }

        let padding = vec![0u8; self.max_bucket_size - written];
        file.write_all(&padding)?;
        file.sync_all()?;

        fs::rename(&tmp_path, &self.path).map_err(|e| {
            Error::new(
                ErrorKind::Io,
                format!("failed to rename {} into place: {}", tmp_path.display(), e),
            )
        })?;

        self.current_size = written;
        self.dirty = false;
        debug!(
            "persisted {} entries ({} bytes) to {}",
            self.entries.len(),
            written,
            self.path.display()
        );
        Ok(())
    }
}

impl<R: Record> Drop for Bucket<R> {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.persist() {
                error!("bucket persist on drop failed: {}", e);
            }
        }
    }
}

/// Bucket file path for a directory slot.
pub fn bucket_path(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("bucket_{}.dat", index))
}
