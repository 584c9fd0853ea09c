use std::io::{Cursor, Read};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::{MetaQueryError, Result};

use super::{last_segment, Resource, WriteCallback};

/// A resource held in a byte buffer; mostly useful in tests.
#[derive(Debug)]
pub struct InMemoryResource {
    path: String,
    read_only: bool,
    contents: RwLock<Contents>,
}

#[derive(Debug, Default)]
struct Contents {
    bytes: Vec<u8>,
    last_modified: Option<DateTime<Utc>>,
    exists: bool,
}

impl InMemoryResource {
    /// An empty, writable resource that does not exist yet.
    pub fn new(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            read_only: false,
            contents: RwLock::new(Contents::default()),
        }
    }

    pub fn with_contents(path: impl Into<String>, bytes: impl Into<Vec<u8>>) -> Self {
        Self {
            path: path.into(),
            read_only: false,
            contents: RwLock::new(Contents {
                bytes: bytes.into(),
                last_modified: Some(Utc::now()),
                exists: true,
            }),
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    pub fn bytes(&self) -> Vec<u8> {
        self.contents.read().bytes.clone()
    }

    fn check_writable(&self) -> Result<()> {
        if self.read_only {
            return Err(MetaQueryError::unsupported(format!(
                "Resource is read only: {}",
                self.path
            )));
        }
        Ok(())
    }
}

impl Resource for InMemoryResource {
    fn name(&self) -> String {
        last_segment(&self.path)
    }

    fn qualified_path(&self) -> String {
        self.path.clone()
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn is_exists(&self) -> bool {
        self.contents.read().exists
    }

    fn size(&self) -> Result<u64> {
        Ok(self.contents.read().bytes.len() as u64)
    }

    fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.contents.read().last_modified
    }

    fn read(&self) -> Result<Box<dyn Read + Send>> {
        Ok(Box::new(Cursor::new(self.bytes())))
    }

    fn write(&self, callback: WriteCallback<'_>) -> Result<()> {
        self.check_writable()?;
        let mut contents = self.contents.write();
        let mut bytes = Vec::new();
        callback(&mut bytes)?;
        contents.bytes = bytes;
        contents.exists = true;
        contents.last_modified = Some(Utc::now());
        Ok(())
    }

    fn append(&self, callback: WriteCallback<'_>) -> Result<()> {
        self.check_writable()?;
        let mut contents = self.contents.write();
        let mut bytes = Vec::new();
        callback(&mut bytes)?;
        contents.bytes.extend(bytes);
        contents.exists = true;
        contents.last_modified = Some(Utc::now());
        Ok(())
    }
}
