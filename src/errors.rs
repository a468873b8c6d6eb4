use std::fmt;
use std::io;

/// Fatal, process-terminating engine conditions.
///
/// Recoverable outcomes (duplicate key, table full, parse errors) are
/// modeled as plain values elsewhere — only conditions that leave the
/// in-memory tree in an unknown state belong here.
#[derive(Debug)]
pub enum Error {
    Io(io::Error),
    /// The data file's length is not a multiple of `PAGE_SIZE`.
    CorruptFile { len: u64 },
    /// A page number exceeds `TABLE_MAX_PAGES`.
    PageOutOfBounds { page_num: usize },
    /// A requested page slot has never been allocated.
    PageNotAllocated { page_num: usize },
    /// A node-level invariant was violated (bad node type byte, an
    /// out-of-range internal-child index, ...).
    CorruptNode(String),
    /// A path this engine deliberately does not implement (see DESIGN.md).
    Unimplemented(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Io(e) => write!(f, "I/O error: {}", e),
            Error::CorruptFile { len } => {
                write!(f, "corrupt file: length {} is not a multiple of PAGE_SIZE", len)
            }
            Error::PageOutOfBounds { page_num } => {
                write!(f, "page number {} exceeds TABLE_MAX_PAGES", page_num)
            }
            Error::PageNotAllocated { page_num } => {
                write!(f, "page {} has not been allocated", page_num)
            }
            Error::CorruptNode(msg) => write!(f, "corrupt node: {}", msg),
            Error::Unimplemented(msg) => write!(f, "{}", msg),
        }
    }
}

impl std::error::Error for Error {}

impl From<io::Error> for Error {
    fn from(err: io::Error) -> Error {
        Error::Io(err)
    }
}
