//! Byte containers that file-based adapters read from and write to.

pub mod file;
pub mod memory;

pub use file::FileResource;
pub use memory::InMemoryResource;

use std::io::{Read, Write};

use chrono::{DateTime, Utc};

use crate::error::Result;

/// A sink handed to [`Resource::write`] and [`Resource::append`].
pub type WriteCallback<'a> = &'a mut dyn FnMut(&mut dyn Write) -> Result<()>;

/// A named, possibly writable blob of bytes.
///
/// `write` and `append` hold the resource exclusively while the callback
/// runs. The new content becomes visible only when the callback returns
/// `Ok`; on error the previous content is left untouched.
pub trait Resource: Send + Sync + std::fmt::Debug {
    /// The last path segment.
    fn name(&self) -> String;

    fn qualified_path(&self) -> String;

    fn is_read_only(&self) -> bool;

    fn is_exists(&self) -> bool;

    fn size(&self) -> Result<u64>;

    fn last_modified(&self) -> Option<DateTime<Utc>>;

    fn read(&self) -> Result<Box<dyn Read + Send>>;

    /// Replaces the whole content with what the callback writes.
    fn write(&self, callback: WriteCallback<'_>) -> Result<()>;

    /// Extends the content with what the callback writes.
    fn append(&self, callback: WriteCallback<'_>) -> Result<()>;
}

pub trait ResourceExt: Resource {
    /// Runs `f` over a fresh reader; the reader is dropped on every exit path.
    fn read_with<T>(&self, f: impl FnOnce(&mut dyn Read) -> Result<T>) -> Result<T> {
        let mut reader = self.read()?;
        f(&mut reader)
    }

    fn read_to_string(&self) -> Result<String> {
        let path = self.qualified_path();
        self.read_with(|reader| {
            let mut text = String::new();
            reader
                .read_to_string(&mut text)
                .map_err(|e| crate::error::MetaQueryError::resource(path, e))?;
            Ok(text)
        })
    }
}

impl<R: Resource + ?Sized> ResourceExt for R {}

/// The segment after the last `/` or `\`, or the whole path when that
/// segment is empty.
pub(crate) fn last_segment(path: &str) -> String {
    match path.rsplit(['/', '\\']).next() {
        Some(segment) if !segment.is_empty() => segment.to_string(),
        _ => path.to_string(),
    }
}
