use crate::error::StorageError;
use crate::object_store::{CHUNK_SIZE, ObjectMeta, ObjectReader, ObjectStore, ObjectWriter};
use async_trait::async_trait;
use bytes::{Bytes, BytesMut};
use std::io::ErrorKind;
use std::path::PathBuf;
use tokio::fs::{self, File};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::warn;
use uuid::Uuid;

const TMP_DIR: &str = ".tmp";

/// Object store over one local directory. Objects are the regular files at
/// the top level; writes go to a temp file under `.tmp/` and are renamed
/// into place on finish, so readers and `list` never see partial objects.
pub struct LocalFsStore {
    root: PathBuf,
}

impl LocalFsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn object_path(&self, name: &str) -> Result<PathBuf, StorageError> {
        if name.is_empty()
            || name == "."
            || name == ".."
            || name.contains('/')
            || name.contains('\\')
        {
            return Err(StorageError::InvalidName(name.to_string()));
        }
        Ok(self.root.join(name))
    }
}

#[async_trait]
impl ObjectStore for LocalFsStore {
    async fn list(&self) -> Result<Vec<ObjectMeta>, StorageError> {
        let mut dir = match fs::read_dir(&self.root).await {
            Ok(dir) => dir,
            // A location nobody has written to yet is empty, not broken.
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(err) => return Err(err.into()),
        };

        let mut objects = Vec::new();
        while let Some(entry) = dir.next_entry().await? {
            let meta = entry.metadata().await?;
            if !meta.is_file() {
                continue;
            }
            let name = match entry.file_name().into_string() {
                Ok(name) => name,
                Err(raw) => {
                    warn!(name = ?raw, "Skipping object with non-UTF-8 name.");
                    continue;
                }
            };
            objects.push(ObjectMeta {
                name,
                size: meta.len(),
                modified: meta.modified().ok(),
            });
        }
        objects.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(objects)
    }

    async fn reader(&self, name: &str) -> Result<Box<dyn ObjectReader>, StorageError> {
        let path = self.object_path(name)?;
        let file = match File::open(&path).await {
            Ok(file) => file,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(StorageError::NotFound(name.to_string()));
            }
            Err(err) => return Err(err.into()),
        };
        Ok(Box::new(FsReader { file }))
    }

    async fn writer(&self, name: &str) -> Result<Box<dyn ObjectWriter>, StorageError> {
        let final_path = self.object_path(name)?;
        let tmp_dir = self.root.join(TMP_DIR);
        fs::create_dir_all(&tmp_dir).await?;
        let tmp_path = tmp_dir.join(Uuid::new_v4().to_string());
        let file = File::create(&tmp_path).await?;
        Ok(Box::new(FsWriter {
            file: Some(file),
            tmp_path,
            final_path,
        }))
    }

    async fn delete(&self, name: &str) -> Result<(), StorageError> {
        let path = self.object_path(name)?;
        match fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }
}

#[derive(Debug)]
struct FsReader {
    file: File,
}

#[async_trait]
impl ObjectReader for FsReader {
    async fn next_chunk(&mut self) -> Result<Option<Bytes>, StorageError> {
        let mut buf = BytesMut::with_capacity(CHUNK_SIZE);
        let n = self.file.read_buf(&mut buf).await?;
        if n == 0 {
            return Ok(None);
        }
        Ok(Some(buf.freeze()))
    }
}

struct FsWriter {
    file: Option<File>,
    tmp_path: PathBuf,
    final_path: PathBuf,
}

#[async_trait]
impl ObjectWriter for FsWriter {
    async fn write_chunk(&mut self, chunk: Bytes) -> Result<(), StorageError> {
        let file = self.file.as_mut().ok_or(StorageError::WriterClosed)?;
        file.write_all(&chunk).await?;
        Ok(())
    }

    async fn finish(mut self: Box<Self>) -> Result<(), StorageError> {
        let mut file = self.file.take().ok_or(StorageError::WriterClosed)?;
        file.flush().await?;
        file.sync_all().await?;
        drop(file);
        fs::rename(&self.tmp_path, &self.final_path).await?;
        Ok(())
    }
}

impl Drop for FsWriter {
    fn drop(&mut self) {
        // Abandoned writer: remove the temp file, the destination name was
        // never touched.
        if self.file.is_some() {
            let _ = std::fs::remove_file(&self.tmp_path);
        }
    }
}

impl std::fmt::Debug for LocalFsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalFsStore")
            .field("root", &self.root.display())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::object_store::{read_all, write_all};
    use tempfile::tempdir;

    #[tokio::test]
    async fn write_then_read_round_trips() {
        let dir = tempdir().unwrap();
        let store = LocalFsStore::new(dir.path());

        let mut writer = store.writer("a.txt").await.unwrap();
        writer.write_chunk(Bytes::from_static(b"hello ")).await.unwrap();
        writer.write_chunk(Bytes::from_static(b"world")).await.unwrap();
        writer.finish().await.unwrap();

        let bytes = read_all(&store, "a.txt").await.unwrap();
        assert_eq!(&bytes[..], b"hello world");

        let listed = store.list().await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].name, "a.txt");
        assert_eq!(listed[0].size, 11);
    }

    #[tokio::test]
    async fn list_is_sorted_and_skips_directories() {
        let dir = tempdir().unwrap();
        let store = LocalFsStore::new(dir.path());
        write_all(&store, "b", Bytes::from_static(b"2")).await.unwrap();
        write_all(&store, "a", Bytes::from_static(b"1")).await.unwrap();
        write_all(&store, "c", Bytes::from_static(b"3")).await.unwrap();

        let names: Vec<_> = store
            .list()
            .await
            .unwrap()
            .into_iter()
            .map(|m| m.name)
            .collect();
        // `.tmp` exists by now and must not show up.
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn unfinished_writer_leaves_nothing_visible() {
        let dir = tempdir().unwrap();
        let store = LocalFsStore::new(dir.path());

        let mut writer = store.writer("partial").await.unwrap();
        writer.write_chunk(Bytes::from_static(b"half")).await.unwrap();
        drop(writer);

        assert!(store.list().await.unwrap().is_empty());
        assert!(matches!(
            store.reader("partial").await.err(),
            Some(StorageError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn missing_location_lists_empty() {
        let dir = tempdir().unwrap();
        let store = LocalFsStore::new(dir.path().join("nope"));
        assert!(store.list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn delete_missing_is_ok() {
        let dir = tempdir().unwrap();
        let store = LocalFsStore::new(dir.path());
        store.delete("ghost").await.unwrap();
    }

    #[tokio::test]
    async fn rejects_names_that_escape_the_root() {
        let dir = tempdir().unwrap();
        let store = LocalFsStore::new(dir.path());
        for bad in ["../evil", "a/b", "", ".."] {
            assert!(matches!(
                store.writer(bad).await.err(),
                Some(StorageError::InvalidName(_))
            ));
        }
    }
}
