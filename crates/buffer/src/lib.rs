//! Buffer pool for column-store pages.
//!
//! A fixed pool of page frames shared by all of an entity's column
//! stores. Replacement is clock-sweep (second chance): every frame
//! carries a reference bit that accesses set and the sweeping hand
//! clears, so recently touched pages survive one full rotation before
//! they become victims. Dirty victims are written back before reuse.
//!
//! Column files hold fixed-width slots and are only ever extended, so
//! allocation is bookkeeping: a zeroed frame is dirtied in memory and
//! reaches disk on eviction or flush, and a read past the flushed tail
//! zero-fills (an all-default slot region, not corruption).
//!
//! Callers receive short-lived borrows in read or write mode; release on
//! every exit path is structural, the borrow cannot outlive the call.
//!
//! # Example
//!
//! ```no_run
//! use buffer::{FilePager, Pager};
//! use common::{ColumnId, Config, PageId};
//!
//! let config = Config::default();
//! let mut pager = FilePager::new("/tmp/db/entity", &config);
//! let column = ColumnId(1);
//!
//! let pid = pager.allocate_page(column).unwrap();
//! pager.fetch_page_mut(column, pid).unwrap().put_i64(0, 42).unwrap();
//! pager.flush().unwrap();
//! ```

#[cfg(test)]
mod tests;

use std::{
    fs::{File, OpenOptions},
    io::{Read, Seek, SeekFrom, Write},
    path::PathBuf,
};

use common::{ColumnId, Config, DbError, DbResult, PageId};
use hashbrown::HashMap;
use storage::Page;

/// Abstraction for acquiring, allocating and flushing pages.
pub trait Pager {
    /// Acquire a page in read mode. Loads it from disk on a miss.
    fn read_page(&mut self, column: ColumnId, pid: PageId) -> DbResult<&Page>;

    /// Acquire a page in write mode and mark its frame dirty.
    fn fetch_page_mut(&mut self, column: ColumnId, pid: PageId) -> DbResult<&mut Page>;

    /// Allocate the next sequential page of a column store.
    fn allocate_page(&mut self, column: ColumnId) -> DbResult<PageId>;

    /// Write every dirty frame back to disk.
    fn flush(&mut self) -> DbResult<()>;
}

/// One slot of the frame pool.
struct Frame {
    key: Option<(ColumnId, PageId)>,
    page: Page,
    dirty: bool,
    referenced: bool,
}

/// An open column store: its file handle plus the page watermark, which
/// runs ahead of the file length until dirty frames are written back.
struct Store {
    file: File,
    pages: u64,
}

/// Clock-sweep buffer pool over one directory of column-store files.
pub struct FilePager {
    base_dir: PathBuf,
    page_size: usize,
    frames: Vec<Frame>,
    frame_of: HashMap<(ColumnId, PageId), usize>,
    hand: usize,
    stores: HashMap<ColumnId, Store>,
}

impl FilePager {
    /// Sizes the pool from `config`: `page_size` bytes per frame,
    /// `buffer_pool_pages` frames.
    ///
    /// # Panics
    ///
    /// Panics if `config.buffer_pool_pages` is 0.
    pub fn new(base_dir: impl Into<PathBuf>, config: &Config) -> Self {
        assert!(config.buffer_pool_pages > 0, "buffer pool needs at least one frame");
        let frames = (0..config.buffer_pool_pages)
            .map(|_| Frame {
                key: None,
                page: Page::new(config.page_size),
                dirty: false,
                referenced: false,
            })
            .collect();
        Self {
            base_dir: base_dir.into(),
            page_size: config.page_size,
            frames,
            frame_of: HashMap::new(),
            hand: 0,
            stores: HashMap::new(),
        }
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Pages the column store currently spans, unflushed tail included.
    pub fn num_pages(&mut self, column: ColumnId) -> DbResult<u64> {
        Ok(self.store(column)?.pages)
    }

    /// Opens the store on first touch and remembers the handle; the page
    /// watermark starts at the persisted file length.
    fn store(&mut self, column: ColumnId) -> DbResult<&mut Store> {
        if !self.stores.contains_key(&column) {
            let path = self.base_dir.join(format!("column_{}.cst", column.0));
            let file = OpenOptions::new()
                .read(true)
                .write(true)
                .create(true)
                .truncate(false)
                .open(&path)
                .map_err(|e| {
                    DbError::Storage(format!(
                        "column store {}: cannot open {}: {e}",
                        column.0,
                        path.display()
                    ))
                })?;
            let len = file.metadata().map_err(DbError::Io)?.len();
            self.stores.insert(
                column,
                Store {
                    file,
                    pages: len / self.page_size as u64,
                },
            );
        }
        Ok(self.stores.get_mut(&column).expect("store just inserted"))
    }

    /// Reads a page from its store into `buf`. A short read zero-fills
    /// the remainder: the tail of a store may not have been written yet
    /// and decodes as default slots.
    fn read_from_store(&mut self, column: ColumnId, pid: PageId, buf: &mut [u8]) -> DbResult<()> {
        let page_size = self.page_size as u64;
        let store = self.store(column)?;
        store
            .file
            .seek(SeekFrom::Start(pid.0 * page_size))
            .map_err(DbError::Io)?;

        buf.fill(0);
        let mut filled = 0;
        while filled < buf.len() {
            match store.file.read(&mut buf[filled..]) {
                Ok(0) => break,
                Ok(n) => filled += n,
                Err(e) if e.kind() == std::io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e.into()),
            }
        }
        Ok(())
    }

    fn write_to_store(&mut self, column: ColumnId, pid: PageId, bytes: &[u8]) -> DbResult<()> {
        let page_size = self.page_size as u64;
        let store = self.store(column)?;
        store
            .file
            .seek(SeekFrom::Start(pid.0 * page_size))
            .map_err(DbError::Io)?;
        store.file.write_all(bytes).map_err(DbError::Io)?;
        Ok(())
    }

    /// Advances the clock hand to a victim frame: the first frame whose
    /// reference bit is already clear, clearing bits as it passes. After
    /// one full rotation every bit is clear, so the sweep terminates.
    fn sweep(&mut self) -> usize {
        loop {
            let idx = self.hand;
            self.hand = (self.hand + 1) % self.frames.len();
            if self.frames[idx].referenced {
                self.frames[idx].referenced = false;
            } else {
                return idx;
            }
        }
    }

    /// Returns the frame index holding `(column, pid)`, loading it into
    /// a (possibly reclaimed) frame on a miss.
    fn frame_for(&mut self, column: ColumnId, pid: PageId, load: bool) -> DbResult<usize> {
        if let Some(idx) = self.frame_of.get(&(column, pid)).copied() {
            self.frames[idx].referenced = true;
            return Ok(idx);
        }

        let idx = self.sweep();
        if let Some(old_key) = self.frames[idx].key.take() {
            self.frame_of.remove(&old_key);
            if self.frames[idx].dirty {
                tracing::trace!(
                    column = old_key.0.0,
                    page = old_key.1.0,
                    "writing back evicted page"
                );
                let bytes = self.frames[idx].page.as_bytes().to_vec();
                self.write_to_store(old_key.0, old_key.1, &bytes)?;
            }
        }

        if load {
            let mut buf = vec![0u8; self.page_size];
            self.read_from_store(column, pid, &mut buf)?;
            self.frames[idx].page = Page::from_bytes(buf);
        } else {
            self.frames[idx].page = Page::new(self.page_size);
        }
        self.frames[idx].key = Some((column, pid));
        self.frames[idx].dirty = false;
        self.frames[idx].referenced = true;
        self.frame_of.insert((column, pid), idx);
        Ok(idx)
    }
}

impl Pager for FilePager {
    fn read_page(&mut self, column: ColumnId, pid: PageId) -> DbResult<&Page> {
        let idx = self.frame_for(column, pid, true)?;
        Ok(&self.frames[idx].page)
    }

    fn fetch_page_mut(&mut self, column: ColumnId, pid: PageId) -> DbResult<&mut Page> {
        let idx = self.frame_for(column, pid, true)?;
        self.frames[idx].dirty = true;
        Ok(&mut self.frames[idx].page)
    }

    fn allocate_page(&mut self, column: ColumnId) -> DbResult<PageId> {
        let pid = PageId(self.store(column)?.pages);
        self.store(column)?.pages += 1;

        // No write-through: the zeroed frame is dirtied and reaches disk
        // on eviction or flush.
        let idx = self.frame_for(column, pid, false)?;
        self.frames[idx].dirty = true;
        Ok(pid)
    }

    fn flush(&mut self) -> DbResult<()> {
        for idx in 0..self.frames.len() {
            if !self.frames[idx].dirty {
                continue;
            }
            let Some((column, pid)) = self.frames[idx].key else {
                continue;
            };
            let bytes = self.frames[idx].page.as_bytes().to_vec();
            self.write_to_store(column, pid, &bytes)?;
            self.frames[idx].dirty = false;
        }
        for store in self.stores.values_mut() {
            store.file.flush().map_err(DbError::Io)?;
        }
        tracing::debug!("buffer pool flushed");
        Ok(())
    }
}
