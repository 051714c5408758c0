pub mod core;
pub mod ehash;
pub mod inverted;
pub mod kdtree;

/*
┌──────────────────────────────────────────────────────────────────────────┐
│                        TESSERA STRUCT ARCHITECTURE                       │
└──────────────────────────────────────────────────────────────────────────┘

┌────────────────────────────── EHASH CORE ────────────────────────────────┐
│                                                                          │
│  ┌──────────────────────────────┐   ┌─────────────────────────────────┐  │
│  │ struct EhashStore<R: Record> │   │ struct Bucket<R: Record>        │  │
│  │ • directory: RwLock<Dir>     │   │ • path, max_bucket_size         │  │
│  │ • max_bucket_size            │──▶│ • entries + key-hash map        │  │
│  │ • _lock: FileLock (flock)    │   │ • dirty flag                    │  │
│  └──────────────────────────────┘   │ • persist() = tmp + rename      │  │
│                                     └─────────────────────────────────┘  │
│  Directory: slots Vec<BucketId> → arena Vec<ArenaEntry>                  │
│  ArenaEntry: Arc<Mutex<Bucket>> + local_depth + root_index               │
│  insert → hash(key) → low global_depth bits → bucket; full → split       │
│  split: double directory if local == global, redistribute on new bit     │
└──────────────────────────────────────────────────────────────────────────┘

┌───────────────────────────── KDTREE CORE ────────────────────────────────┐
│                                                                          │
│  ┌─────────────────┐  ┌────────────────────┐  ┌───────────────────────┐  │
│  │ struct Point    │  │ struct KdNode      │  │ struct KdTree         │  │
│  │ • coords: f32   │──│ • point, axis      │──│ • root, dimension     │  │
│  │ • distance: f64 │  │ • left / right     │  │ • build (median nth)  │  │
│  └─────────────────┘  └────────────────────┘  │ • insert (leaf)       │  │
│                                               │ • knn (max-heap)      │  │
│                                               │ • range (radius/box)  │  │
│                                               └───────────────────────┘  │
└──────────────────────────────────────────────────────────────────────────┘

┌──────────────────────────── INVERTED CORE ───────────────────────────────┐
│                                                                          │
│  TextNormalizer ─▶ tokens ─▶ InvertedIndex (RwLock)                      │
│                               • term → pForDelta bytes                   │
│                               • term → Vec<SkipPointer>                  │
│                               • total_documents                          │
│                                                                          │
│  PForDelta: gaps → blocks of 128 → (p, n) header + p-bit packed          │
│  Skiplists: bytes → [(first_doc_id, byte_offset)] per block (pure fn)    │
│  PostingCursor: doc / advance / seek, one decoded block at a time        │
│  QueryProcessor: tokenize → Shunting-Yard RPN → AND/OR/NOT merges        │
│  StorageManager: "SAPJ" v1 binary file, save/load                        │
└──────────────────────────────────────────────────────────────────────────┘
*/
