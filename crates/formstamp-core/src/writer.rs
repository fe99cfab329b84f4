//! File I/O at the edges of the pipeline

use std::fs;
use std::io;
use std::path::Path;

use tracing::debug;

use crate::document::FormDocument;
use crate::error::FormError;

/// Read and parse the PDF at `path`
pub fn read_document<P: AsRef<Path>>(path: P) -> Result<FormDocument, FormError> {
    let path = path.as_ref();
    let bytes = fs::read(path).map_err(|source| FormError::InputNotFound {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), size = bytes.len(), "Read input");
    FormDocument::from_bytes(&bytes)
}

/// Serialize `form` in memory, then write it to `path` in one go.
///
/// A serialization failure never leaves a file behind.
pub fn write_document<P: AsRef<Path>>(form: &mut FormDocument, path: P) -> Result<(), FormError> {
    let path = path.as_ref();
    let bytes = form.to_bytes().map_err(|e| FormError::WriteFailure {
        path: path.to_path_buf(),
        source: io::Error::new(io::ErrorKind::Other, e.to_string()),
    })?;
    fs::write(path, &bytes).map_err(|source| FormError::WriteFailure {
        path: path.to_path_buf(),
        source,
    })?;
    debug!(path = %path.display(), size = bytes.len(), "Wrote output");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::test_support::*;
    use tempfile::tempdir;

    #[test]
    fn test_missing_input() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent.pdf");
        match read_document(&path) {
            Err(FormError::InputNotFound { path: reported, .. }) => assert_eq!(reported, path),
            Err(other) => panic!("unexpected error {:?}", other),
            Ok(_) => panic!("expected InputNotFound"),
        }
    }

    #[test]
    fn test_unparseable_input() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("junk.pdf");
        fs::write(&path, b"not a pdf at all").unwrap();
        assert!(matches!(read_document(&path), Err(FormError::Parse(_))));
    }

    #[test]
    fn test_write_then_read() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.pdf");
        let mut form = FormDocument::from_document(form_pdf(&[
            vec![WidgetSpec::new("A", [0.0, 0.0, 10.0, 10.0])],
            vec![],
        ]));

        write_document(&mut form, &path).unwrap();
        let reread = read_document(&path).unwrap();
        assert_eq!(reread.page_count(), 2);
        assert!(reread.pages().unwrap()[0].annotations[0].is_field("A"));
    }

    #[test]
    fn test_unwritable_output() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("missing-dir").join("out.pdf");
        let mut form = FormDocument::from_document(form_pdf(&[vec![]]));

        let err = write_document(&mut form, &path).unwrap_err();
        assert!(matches!(err, FormError::WriteFailure { .. }));
        assert_eq!(err.exit_code(), 6);
        assert!(!path.exists());
    }
}
