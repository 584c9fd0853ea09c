use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;

use crate::error::{MetaQueryError, Result};

use super::{last_segment, Resource, WriteCallback};

/// A resource backed by a file on the local file system.
///
/// Writes go to a temporary file in the same directory which then replaces
/// the target, so readers never observe a half-written file.
#[derive(Debug, Clone)]
pub struct FileResource {
    path: PathBuf,
}

impl FileResource {
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn error(&self, source: std::io::Error) -> MetaQueryError {
        MetaQueryError::resource(self.qualified_path(), source)
    }

    fn directory(&self) -> PathBuf {
        match self.path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
            _ => PathBuf::from("."),
        }
    }
}

impl Resource for FileResource {
    fn name(&self) -> String {
        last_segment(&self.path.to_string_lossy())
    }

    fn qualified_path(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }

    fn is_read_only(&self) -> bool {
        fs::metadata(&self.path)
            .map(|m| m.permissions().readonly())
            .unwrap_or(false)
    }

    fn is_exists(&self) -> bool {
        self.path.is_file()
    }

    fn size(&self) -> Result<u64> {
        fs::metadata(&self.path)
            .map(|m| m.len())
            .map_err(|e| self.error(e))
    }

    fn last_modified(&self) -> Option<DateTime<Utc>> {
        fs::metadata(&self.path)
            .and_then(|m| m.modified())
            .ok()
            .map(DateTime::<Utc>::from)
    }

    fn read(&self) -> Result<Box<dyn Read + Send>> {
        let file = File::open(&self.path).map_err(|e| self.error(e))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn write(&self, callback: WriteCallback<'_>) -> Result<()> {
        if self.is_read_only() {
            return Err(MetaQueryError::unsupported(format!(
                "Resource is read only: {}",
                self.qualified_path()
            )));
        }
        let mut temp = NamedTempFile::new_in(self.directory()).map_err(|e| self.error(e))?;
        {
            let mut writer = BufWriter::new(temp.as_file_mut());
            callback(&mut writer)?;
            writer.flush().map_err(|e| self.error(e))?;
        }
        temp.persist(&self.path).map_err(|e| self.error(e.error))?;
        Ok(())
    }

    fn append(&self, callback: WriteCallback<'_>) -> Result<()> {
        if self.is_read_only() {
            return Err(MetaQueryError::unsupported(format!(
                "Resource is read only: {}",
                self.qualified_path()
            )));
        }
        // Buffer first so a failing callback leaves the file as it was.
        let mut buffer = Vec::new();
        callback(&mut buffer)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| self.error(e))?;
        file.write_all(&buffer).map_err(|e| self.error(e))?;
        file.flush().map_err(|e| self.error(e))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::ResourceExt;
    use tempfile::tempdir;

    #[test]
    fn test_write_replaces_and_append_extends() {
        let dir = tempdir().unwrap();
        let resource = FileResource::new(dir.path().join("out.txt"));
        assert!(!resource.is_exists());
        assert_eq!(resource.name(), "out.txt");

        resource
            .write(&mut |w| w.write_all(b"hello\n").map_err(MetaQueryError::from))
            .unwrap();
        resource
            .append(&mut |w| w.write_all(b"world\n").map_err(MetaQueryError::from))
            .unwrap();
        assert_eq!(resource.read_to_string().unwrap(), "hello\nworld\n");
        assert_eq!(resource.size().unwrap(), 12);
        assert!(resource.last_modified().is_some());

        resource
            .write(&mut |w| w.write_all(b"again").map_err(MetaQueryError::from))
            .unwrap();
        assert_eq!(resource.read_to_string().unwrap(), "again");
    }

    #[test]
    fn test_failed_write_keeps_content() {
        let dir = tempdir().unwrap();
        let resource = FileResource::new(dir.path().join("keep.txt"));
        resource
            .write(&mut |w| w.write_all(b"original").map_err(MetaQueryError::from))
            .unwrap();
        let result = resource.write(&mut |w| {
            w.write_all(b"partial").map_err(MetaQueryError::from)?;
            Err(MetaQueryError::InvalidState("boom".into()))
        });
        assert!(result.is_err());
        assert_eq!(resource.read_to_string().unwrap(), "original");
    }

    #[test]
    fn test_missing_file_read_is_backend_error() {
        let resource = FileResource::new("/definitely/not/here.csv");
        let err = match resource.read() {
            Err(e) => e,
            Ok(_) => panic!("reading a missing file succeeded"),
        };
        assert_eq!(err.kind(), crate::error::ErrorKind::BackendIo);
        assert!(err.to_string().contains("here.csv"));
    }
}
