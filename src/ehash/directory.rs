use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use log::{debug, info};
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};

use crate::core::error::{Error, ErrorKind, Result};
use crate::ehash::bucket::{align_to_block, bucket_path, Bucket};
use crate::ehash::file_lock::FileLock;
use crate::ehash::{hash_key, low_bits, Record};

/// Index into the bucket arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketId(pub usize);

/// Store statistics for monitoring.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreStats {
    pub global_depth: usize,
    pub directory_size: usize,
    pub bucket_count: usize,
    pub total_records: usize,
    pub max_bucket_size: usize,
}

/// Splitting stops here; a record set that still does not separate after
/// this many rounds hashes identically on every examined prefix, and each
/// round past the local depth doubles the directory.
const MAX_SPLIT_ROUNDS: usize = 16;

struct ArenaEntry<R: Record> {
    bucket: Arc<Mutex<Bucket<R>>>,
    local_depth: usize,
    root_index: usize,
}

struct Directory<R: Record> {
    global_depth: usize,
    /// One slot per `global_depth`-bit prefix; multiple slots may share a bucket.
    slots: Vec<BucketId>,
    /// Owning arena; directory slots refer into it by index.
    arena: Vec<ArenaEntry<R>>,
}

/// Extensible-hashing record store over block-aligned bucket files.
///
/// The directory maps the low `global_depth` bits of the key hash to a
/// bucket. A full bucket splits, doubling the directory when the bucket's
/// local depth has caught up with the global depth.
pub struct EhashStore<R: Record> {
    dir_path: PathBuf,
    max_bucket_size: usize,
    directory: RwLock<Directory<R>>,
    _lock: FileLock,
}

impl<R: Record> EhashStore<R> {
    /// Open a store rooted at `dir_path`, creating `2^initial_global_depth`
    /// buckets. `max_bucket_size` is rounded up to a whole number of blocks.
    ///
    /// Reopening only rediscovers buckets `[0, 2^initial_global_depth)`; the
    /// post-split directory shape is a single-process-lifetime property.
    pub fn open(
        dir_path: impl Into<PathBuf>,
        max_bucket_size: usize,
        initial_global_depth: usize,
    ) -> Result<Self> {
        let dir_path = dir_path.into();
        if max_bucket_size == 0 {
            return Err(Error::invalid_input("max_bucket_size must be non-zero"));
        }
        fs::create_dir_all(&dir_path)?;
        let lock = FileLock::acquire(&dir_path)?;

        let max_bucket_size = align_to_block(max_bucket_size);
        let mut arena = Vec::with_capacity(1 << initial_global_depth);
        let mut slots = Vec::with_capacity(1 << initial_global_depth);
        for i in 0..(1usize << initial_global_depth) {
            let bucket = Bucket::open(bucket_path(&dir_path, i), max_bucket_size)?;
            slots.push(BucketId(arena.len()));
            arena.push(ArenaEntry {
                bucket: Arc::new(Mutex::new(bucket)),
                local_depth: initial_global_depth,
                root_index: i,
            });
        }

        info!(
            "opened store at {} with {} buckets of {} bytes",
            dir_path.display(),
            slots.len(),
            max_bucket_size
        );

        Ok(EhashStore {
            dir_path,
            max_bucket_size,
            directory: RwLock::new(Directory {
                global_depth: initial_global_depth,
                slots,
                arena,
            }),
            _lock: lock,
        })
    }

    /// Insert a record, returning the hash of its key.
    ///
    /// A record whose key hash is already present replaces the existing
    /// entry. A full bucket is split (doubling the directory when needed)
    /// and the insert retried.
    pub fn insert(&self, record: R) -> Result<u64> {
        let key = record.key();
        let hash = hash_key(&key);
        let encoded_len = bincode::serialized_size(&record)? as usize;

        if 4 + encoded_len > self.max_bucket_size {
            return Err(Error::invalid_input(format!(
                "record of {} bytes cannot fit in a {}-byte bucket",
                encoded_len, self.max_bucket_size
            )));
        }

        let mut pending = Some(record);
        for _round in 0..MAX_SPLIT_ROUNDS {
            {
                let dir = self.directory.read();
                let slot = low_bits(hash, dir.global_depth) as usize;
                let entry = &dir.arena[dir.slots[slot].0];
                let mut bucket = entry.bucket.lock();

                if bucket.has_hash(hash) {
                    if bucket.fits_update(hash, encoded_len) {
                        if let Some(rec) = pending.take() {
                            bucket.update(hash, rec, encoded_len);
                            return Ok(hash);
                        }
                    }
                } else if bucket.can_fit(encoded_len) {
                    if let Some(rec) = pending.take() {
                        bucket.append(hash, rec, encoded_len);
                        return Ok(hash);
                    }
                }
            }

            // Bucket full: split under the directory write lock, then retry.
            let mut dir = self.directory.write();
            let slot = low_bits(hash, dir.global_depth) as usize;
            let root = dir.arena[dir.slots[slot].0].root_index;
            self.split_bucket(&mut dir, root)?;
        }

        Err(Error::invalid_input(format!(
            "bucket for hash {:#x} is unsplittable after {} rounds",
            hash, MAX_SPLIT_ROUNDS
        )))
    }

    /// Split the bucket rooted at directory slot `root`.
    fn split_bucket(&self, dir: &mut Directory<R>, root: usize) -> Result<()> {
        let id = dir.slots[root].0;
        let depth = dir.arena[id].local_depth;

        if depth == dir.global_depth {
            // Double the directory; the new upper half mirrors the lower.
            let old_size = dir.slots.len();
            for i in 0..old_size {
                let shared = dir.slots[i];
                dir.slots.push(shared);
            }
            dir.global_depth += 1;
            info!("directory doubled to global depth {}", dir.global_depth);
        }

        let depth = depth + 1;
        dir.arena[id].local_depth = depth;

        let sibling = root + (1 << (depth - 1));
        let mut new_bucket = Bucket::create(
            bucket_path(&self.dir_path, sibling),
            self.max_bucket_size,
        );

        // Redistribute on the freshly significant hash bit.
        let mut old_bucket = dir.arena[id].bucket.lock();
        let moved = old_bucket.drain();
        let total = moved.len();
        let mut kept = 0usize;
        for (entry_hash, record, size) in moved {
            if low_bits(entry_hash, depth) as usize == sibling {
                new_bucket.append(entry_hash, record, size);
            } else {
                old_bucket.append(entry_hash, record, size);
                kept += 1;
            }
        }
        drop(old_bucket);

        debug!(
            "split bucket at slot {} (depth {}): kept {}, moved {} of {}",
            root,
            depth,
            kept,
            total - kept,
            total
        );

        let new_id = BucketId(dir.arena.len());
        dir.arena.push(ArenaEntry {
            bucket: Arc::new(Mutex::new(new_bucket)),
            local_depth: depth,
            root_index: sibling,
        });

        for slot in 0..dir.slots.len() {
            if low_bits(slot as u64, depth) as usize == sibling {
                dir.slots[slot] = new_id;
            }
        }

        Ok(())
    }

    /// Remove the record whose key hashes to `hash`; false when absent.
    pub fn remove(&self, hash: u64) -> bool {
        let dir = self.directory.read();
        let slot = low_bits(hash, dir.global_depth) as usize;
        let mut bucket = dir.arena[dir.slots[slot].0].bucket.lock();
        bucket.remove(hash)
    }

    /// Look up the record whose key hashes to `hash`.
    pub fn find(&self, hash: u64) -> Option<R>
    where
        R: Clone,
    {
        let dir = self.directory.read();
        let slot = low_bits(hash, dir.global_depth) as usize;
        let bucket = dir.arena[dir.slots[slot].0].bucket.lock();
        bucket.get(hash).cloned()
    }

    /// Look up a record by its key bytes.
    pub fn find_by_key(&self, key: &[u8]) -> Option<R>
    where
        R: Clone,
    {
        self.find(hash_key(key))
    }

    /// All records in the bucket that hosts `hash`.
    pub fn get_entries(&self, hash: u64) -> Vec<R>
    where
        R: Clone,
    {
        let dir = self.directory.read();
        let slot = low_bits(hash, dir.global_depth) as usize;
        let bucket = dir.arena[dir.slots[slot].0].bucket.lock();
        bucket.entries().to_vec()
    }

    /// Flush every dirty bucket to disk.
    pub fn persist(&self) -> Result<()> {
        let dir = self.directory.read();
        for entry in &dir.arena {
            entry.bucket.lock().persist()?;
        }
        Ok(())
    }

    pub fn global_depth(&self) -> usize {
        self.directory.read().global_depth
    }

    pub fn directory_size(&self) -> usize {
        self.directory.read().slots.len()
    }

    pub fn bucket_count(&self) -> usize {
        self.directory.read().arena.len()
    }

    pub fn stats(&self) -> StoreStats {
        let dir = self.directory.read();
        let total_records = dir.arena.iter().map(|e| e.bucket.lock().len()).sum();
        StoreStats {
            global_depth: dir.global_depth,
            directory_size: dir.slots.len(),
            bucket_count: dir.arena.len(),
            total_records,
            max_bucket_size: self.max_bucket_size,
        }
    }

    /// Check the structural invariants of the directory.
    ///
    /// `directory_size == 2^global_depth`; every `local_depth <=
    /// global_depth`; a bucket at local depth `d` is referenced by exactly
    /// `2^(global_depth - d)` slots; a bucket's `root_index` is the smallest
    /// slot referencing it.
    pub fn verify(&self) -> Result<()> {
        let dir = self.directory.read();

        if dir.slots.len() != 1 << dir.global_depth {
            return Err(Error::new(
                ErrorKind::Corrupt,
                format!(
                    "directory has {} slots at global depth {}",
                    dir.slots.len(),
                    dir.global_depth
                ),
            ));
        }

        for (id, entry) in dir.arena.iter().enumerate() {
            if entry.local_depth > dir.global_depth {
                return Err(Error::corrupt(format!(
                    "bucket {} has local depth {} above global depth {}",
                    id, entry.local_depth, dir.global_depth
                )));
            }

            let referring: Vec<usize> = dir
                .slots
                .iter()
                .enumerate()
                .filter(|(_, b)| b.0 == id)
                .map(|(slot, _)| slot)
                .collect();

            let expected = 1usize << (dir.global_depth - entry.local_depth);
            if referring.len() != expected {
                return Err(Error::corrupt(format!(
                    "bucket {} has fan-in {} but local depth {} requires {}",
                    id,
                    referring.len(),
                    entry.local_depth,
                    expected
                )));
            }

            match referring.first() {
                Some(&smallest) if smallest == entry.root_index => {}
                _ => {
                    return Err(Error::corrupt(format!(
                        "bucket {} root index {} is not its smallest referencing slot",
                        id, entry.root_index
                    )));
                }
            }
        }

        Ok(())
    }
}

impl<R: Record> Drop for EhashStore<R> {
    fn drop(&mut self) {
        if let Err(e) = self.persist() {
            log::error!("store persist on drop failed: {}", e);
        }
    }
}
