//! The disk manager: database file lifecycle, page allocation, and
//! page I/O.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use quartz_common::constants::{DB_MAGIC, DB_VERSION};
use quartz_common::types::PageId;
use tracing::{debug, error, info, warn};

use super::error::{DiskError, DiskResult};
use super::DB_HEADER_SIZE;
use crate::page::{Page, PAGE_SIZE};

/// Header at the start of every database file (28 bytes, packed,
/// little-endian).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DatabaseHeader {
    /// Magic number identifying a database file.
    pub magic: u32,
    /// Database format version.
    pub version: u32,
    /// Size of each page.
    pub page_size: u32,
    /// Total number of pages ever allocated.
    pub page_count: u32,
    /// First free page ID (persisted but not consulted by this core).
    pub first_free_page: PageId,
    /// Last log sequence number (reserved).
    pub last_lsn: u64,
}

impl DatabaseHeader {
    /// Header for a freshly initialized database.
    fn initial() -> Self {
        Self {
            magic: DB_MAGIC,
            version: DB_VERSION,
            page_size: PAGE_SIZE as u32,
            page_count: 0,
            first_free_page: PageId::INVALID,
            last_lsn: 0,
        }
    }

    /// Serializes the header to its on-disk form.
    pub fn to_bytes(&self) -> [u8; DB_HEADER_SIZE] {
        let mut bytes = [0u8; DB_HEADER_SIZE];
        bytes[0..4].copy_from_slice(&self.magic.to_le_bytes());
        bytes[4..8].copy_from_slice(&self.version.to_le_bytes());
        bytes[8..12].copy_from_slice(&self.page_size.to_le_bytes());
        bytes[12..16].copy_from_slice(&self.page_count.to_le_bytes());
        bytes[16..20].copy_from_slice(&self.first_free_page.to_le_bytes());
        bytes[20..28].copy_from_slice(&self.last_lsn.to_le_bytes());
        bytes
    }

    /// Deserializes a header from its on-disk form.
    pub fn from_bytes(bytes: &[u8; DB_HEADER_SIZE]) -> Self {
        Self {
            magic: u32::from_le_bytes(bytes[0..4].try_into().unwrap()),
            version: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            page_size: u32::from_le_bytes(bytes[8..12].try_into().unwrap()),
            page_count: u32::from_le_bytes(bytes[12..16].try_into().unwrap()),
            first_free_page: PageId::from_le_bytes(bytes[16..20].try_into().unwrap()),
            last_lsn: u64::from_le_bytes(bytes[20..28].try_into().unwrap()),
        }
    }
}

/// Manages physical page I/O and the database file.
///
/// Page identifiers are handed out here; a freshly allocated page has
/// no bytes on disk until it is first flushed. Deallocated ids go onto
/// an in-memory free stack and are reused in LIFO order. The stack is
/// not persisted: after a reopen it starts empty.
///
/// A single `DiskManager` instance is assumed to own the file; no file
/// locking is performed.
#[derive(Debug)]
pub struct DiskManager {
    file: File,
    path: PathBuf,
    header: DatabaseHeader,
    /// Whether the in-memory header needs to be written back.
    dirty: bool,
    free_pages: Vec<PageId>,
}

impl DiskManager {
    /// Creates a new database file at `path`, overwriting any
    /// existing file, and writes the initial header.
    pub fn create(path: impl AsRef<Path>) -> DiskResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(&path)?;

        let mut manager = Self {
            file,
            path,
            header: DatabaseHeader::initial(),
            dirty: false,
            free_pages: Vec::new(),
        };

        manager.write_header()?;
        info!("initialized new database at {}", manager.path.display());
        Ok(manager)
    }

    /// Opens an existing database file and validates its header.
    ///
    /// Fails if the file does not exist, or if the magic number,
    /// version, or page size do not match this build.
    pub fn open(path: impl AsRef<Path>) -> DiskResult<Self> {
        let path = path.as_ref().to_path_buf();
        if !path.exists() {
            return Err(DiskError::NotFound { path });
        }

        let mut file = OpenOptions::new().read(true).write(true).open(&path)?;

        let mut bytes = [0u8; DB_HEADER_SIZE];
        file.seek(SeekFrom::Start(0))?;
        file.read_exact(&mut bytes)?;
        let header = DatabaseHeader::from_bytes(&bytes);

        if header.magic != DB_MAGIC {
            return Err(DiskError::BadMagic {
                expected: DB_MAGIC,
                actual: header.magic,
            });
        }
        if header.version != DB_VERSION {
            return Err(DiskError::UnsupportedVersion {
                version: header.version,
            });
        }
        if header.page_size != PAGE_SIZE as u32 {
            return Err(DiskError::PageSizeMismatch {
                expected: PAGE_SIZE as u32,
                actual: header.page_size,
            });
        }

        debug!("opened database at {}", path.display());
        Ok(Self {
            file,
            path,
            header,
            dirty: false,
            free_pages: Vec::new(),
        })
    }

    /// Allocates a page identifier.
    ///
    /// Pops the free stack when possible, otherwise extends the page
    /// count. No bytes are written until the page is first flushed.
    pub fn allocate_page(&mut self) -> PageId {
        let page_id = if let Some(page_id) = self.free_pages.pop() {
            debug!("allocated page {page_id} from the free list");
            page_id
        } else {
            let page_id = PageId::new(self.header.page_count);
            self.header.page_count += 1;
            debug!("allocated new page {page_id}");
            page_id
        };

        self.dirty = true;
        page_id
    }

    /// Returns a page identifier to the free stack.
    ///
    /// The on-disk bytes of the page are not zeroed.
    pub fn deallocate_page(&mut self, page_id: PageId) -> DiskResult<()> {
        if page_id.as_u32() >= self.header.page_count {
            warn!("cannot deallocate invalid page ID {page_id}");
            return Err(DiskError::invalid_page_id(page_id));
        }

        debug!("deallocating page {page_id}");
        self.free_pages.push(page_id);
        self.dirty = true;
        Ok(())
    }

    /// Reads a page from disk and materializes it as its typed form.
    pub fn fetch_page(&mut self, page_id: PageId) -> DiskResult<Page> {
        if page_id.as_u32() >= self.header.page_count {
            warn!("cannot fetch invalid page ID {page_id}");
            return Err(DiskError::invalid_page_id(page_id));
        }

        let mut image = [0u8; PAGE_SIZE];
        self.file.seek(SeekFrom::Start(Self::page_offset(page_id)))?;
        self.file.read_exact(&mut image).map_err(|e| {
            if e.kind() == std::io::ErrorKind::UnexpectedEof {
                DiskError::ShortRead {
                    page_id,
                    expected: PAGE_SIZE,
                    actual: 0,
                }
            } else {
                DiskError::from(e)
            }
        })?;

        let page = Page::from_disk_image(&image).ok_or_else(|| {
            error!("unknown page type {:#04x} on page {page_id}", image[0]);
            DiskError::UnknownPageType {
                page_id,
                type_byte: image[0],
            }
        })?;

        debug!("fetched page {page_id}, type {}", page.page_type());
        Ok(page)
    }

    /// Writes a page's 4096 bytes verbatim at its offset and flushes.
    ///
    /// Does not touch the database header.
    pub fn flush_page(&mut self, page: &Page) -> DiskResult<()> {
        let page_id = page.id();
        self.file.seek(SeekFrom::Start(Self::page_offset(page_id)))?;
        self.file.write_all(page.as_bytes())?;
        self.file.flush()?;

        debug!("flushed page {page_id}");
        Ok(())
    }

    /// Forces all pending writes to disk, rewriting the header first
    /// if it changed.
    pub fn sync(&mut self) -> DiskResult<()> {
        debug!("syncing database");

        if self.dirty {
            self.write_header()?;
        }

        self.file.sync_all()?;
        self.dirty = false;
        Ok(())
    }

    /// Returns the total number of pages ever allocated.
    #[inline]
    pub fn page_count(&self) -> u32 {
        self.header.page_count
    }

    /// Returns the current database file size in bytes, or 0 if it
    /// cannot be determined.
    pub fn file_size(&self) -> u64 {
        match self.file.metadata() {
            Ok(metadata) => metadata.len(),
            Err(e) => {
                error!("failed to get file size: {e}");
                0
            }
        }
    }

    /// Byte offset of a page within the database file.
    #[inline]
    fn page_offset(page_id: PageId) -> u64 {
        DB_HEADER_SIZE as u64 + page_id.as_u32() as u64 * PAGE_SIZE as u64
    }

    fn write_header(&mut self) -> DiskResult<()> {
        self.file.seek(SeekFrom::Start(0))?;
        self.file.write_all(&self.header.to_bytes())?;
        self.file.flush()?;
        Ok(())
    }
}

impl Drop for DiskManager {
    fn drop(&mut self) {
        if self.dirty {
            if let Err(e) = self.write_header() {
                error!("error writing header during close: {e}");
                return;
            }
            if let Err(e) = self.file.sync_all() {
                error!("error syncing during close: {e}");
            }
        }
    }
}
