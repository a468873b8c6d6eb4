//! The page cache sitting between the B+tree and the file: loads pages on
//! miss, unconditionally flushes every resident page on close. No dirty
//! tracking — see spec.md §4.2.

use super::node::{Page, PAGE_SIZE, TABLE_MAX_PAGES};
use crate::errors::Error;
use heapless::Vec as HVec;
use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, warn};

#[cfg(unix)]
fn open_options() -> OpenOptions {
    use std::os::unix::fs::OpenOptionsExt;
    let mut opts = OpenOptions::new();
    opts.read(true).write(true).create(true).mode(0o600);
    opts
}

#[cfg(not(unix))]
fn open_options() -> OpenOptions {
    let mut opts = OpenOptions::new();
    opts.read(true).write(true).create(true);
    opts
}

pub struct Pager {
    file: File,
    file_length: u64,
    num_pages: usize,
    /// One slot beyond `TABLE_MAX_PAGES` so that the preserved
    /// `page_num > TABLE_MAX_PAGES` (strict) boundary quirk — see
    /// DESIGN.md Open Question 1 — can actually allocate index
    /// `TABLE_MAX_PAGES` rather than being capped one slot short of it.
    pages: HVec<Option<Box<Page>>, { TABLE_MAX_PAGES + 1 }>,
}

impl Pager {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Pager, Error> {
        let mut file = open_options().open(path)?;
        let file_length = file.seek(SeekFrom::End(0))?;

        if file_length % PAGE_SIZE as u64 != 0 {
            return Err(Error::CorruptFile { len: file_length });
        }
        let num_pages = (file_length / PAGE_SIZE as u64) as usize;

        let mut pages = HVec::new();
        for _ in 0..num_pages.min(TABLE_MAX_PAGES + 1) {
            let _ = pages.push(None);
        }

        debug!(file_length, num_pages, "Opened pager.");
        Ok(Pager {
            file,
            file_length,
            num_pages,
            pages,
        })
    }

    pub fn num_pages(&self) -> usize {
        self.num_pages
    }

    /// Page `num_pages` is always free to allocate (deletion is out of
    /// scope, so page numbers are never reused).
    pub fn get_unused_page_num(&self) -> usize {
        self.num_pages
    }

    /// Returns the in-memory buffer for page `n`, loading it from disk on
    /// first access. Preserves the source's off-by-one boundary check
    /// (`n > TABLE_MAX_PAGES`, strict) verbatim — see DESIGN.md Open
    /// Question 1.
    pub fn get_page(&mut self, page_num: usize) -> Result<&mut Page, Error> {
        if page_num > TABLE_MAX_PAGES {
            return Err(Error::PageOutOfBounds { page_num });
        }

        while self.pages.len() <= page_num {
            self.pages
                .push(None)
                .map_err(|_| Error::PageOutOfBounds { page_num })?;
        }

        if self.pages[page_num].is_none() {
            let mut buf: Box<Page> = Box::new([0u8; PAGE_SIZE]);

            let num_pages_on_disk = (self.file_length / PAGE_SIZE as u64) as usize;
            if page_num < num_pages_on_disk {
                self.file
                    .seek(SeekFrom::Start((page_num * PAGE_SIZE) as u64))?;
                self.file.read_exact(buf.as_mut())?;
                debug!(page_num, "Loaded page from disk.");
            }

            self.pages[page_num] = Some(buf);
            if page_num + 1 > self.num_pages {
                self.num_pages = page_num + 1;
            }
        }

        Ok(self.pages[page_num].as_mut().unwrap())
    }

    /// Writes page `n`'s in-memory buffer back to disk at its fixed offset.
    pub fn flush(&mut self, page_num: usize) -> Result<(), Error> {
        let page = self.pages[page_num]
            .as_ref()
            .ok_or(Error::PageNotAllocated { page_num })?;

        self.file
            .seek(SeekFrom::Start((page_num * PAGE_SIZE) as u64))?;
        self.file.write_all(page.as_ref())?;
        Ok(())
    }

    /// Flushes every resident page and drops the pager's buffers. The file
    /// descriptor closes when `self.file` is dropped at the end of this
    /// call.
    pub fn close(&mut self) -> Result<(), Error> {
        let mut flushed = 0;
        for page_num in 0..self.num_pages {
            if page_num < self.pages.len() && self.pages[page_num].is_some() {
                self.flush(page_num)?;
                flushed += 1;
            }
        }
        self.file.flush()?;
        if flushed == 0 && self.num_pages > 0 {
            warn!(num_pages = self.num_pages, "Closed pager with no resident pages flushed.");
        }
        debug!(flushed, "Closed pager.");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn open_empty_file_has_zero_pages() {
        let file = NamedTempFile::new().unwrap();
        let pager = Pager::open(file.path()).unwrap();
        assert_eq!(pager.num_pages(), 0);
    }

    #[test]
    fn get_page_initializes_and_persists() {
        let file = NamedTempFile::new().unwrap();
        {
            let mut pager = Pager::open(file.path()).unwrap();
            let page = pager.get_page(0).unwrap();
            page[0] = 0xAB;
            pager.flush(0).unwrap();
        }
        let mut pager = Pager::open(file.path()).unwrap();
        assert_eq!(pager.num_pages(), 1);
        let page = pager.get_page(0).unwrap();
        assert_eq!(page[0], 0xAB);
    }

    #[test]
    fn page_num_above_table_max_pages_is_fatal() {
        let file = NamedTempFile::new().unwrap();
        let mut pager = Pager::open(file.path()).unwrap();
        assert!(pager.get_page(TABLE_MAX_PAGES + 1).is_err());
    }

    #[test]
    fn page_num_equal_to_table_max_pages_succeeds() {
        // The source's off-by-one boundary allows index TABLE_MAX_PAGES
        // itself (only `> TABLE_MAX_PAGES` is fatal) — see DESIGN.md Open
        // Question 1.
        let file = NamedTempFile::new().unwrap();
        let mut pager = Pager::open(file.path()).unwrap();
        assert!(pager.get_page(TABLE_MAX_PAGES).is_ok());
    }

    #[test]
    fn corrupt_file_length_is_rejected() {
        use std::io::Write as _;
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(&[0u8; 10]).unwrap();
        assert!(Pager::open(file.path()).is_err());
    }
}
