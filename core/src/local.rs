//! Local file helpers used alongside the remote operations.

use std::fs;
use std::path::Path;

use crate::error::ApiError;

/// Read the whole contents of a local file.
pub fn read_local<P: AsRef<Path>>(path: P) -> Result<Vec<u8>, ApiError> {
    let path = path.as_ref();
    fs::read(path).map_err(|e| ApiError::local_io(path, e))
}

/// Create or truncate a local file and write `data` into it.
pub fn write_local<P: AsRef<Path>>(data: &[u8], path: P) -> Result<(), ApiError> {
    let path = path.as_ref();
    fs::write(path, data).map_err(|e| ApiError::local_io(path, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("data.bin");
        write_local(&[0, 1, 2, 255], &path).unwrap();
        assert_eq!(read_local(&path).unwrap(), vec![0, 1, 2, 255]);

        write_local(b"short", &path).unwrap();
        assert_eq!(read_local(&path).unwrap(), b"short");
    }

    #[test]
    fn missing_file_is_local_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("missing.bin");
        let err = read_local(&path).unwrap_err();
        match err {
            ApiError::LocalIo { path: reported, source } => {
                assert_eq!(reported, path);
                assert_eq!(source.kind(), std::io::ErrorKind::NotFound);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
