//! In-memory gzip and zip codecs used by the packaging policy.

use std::io::{Cursor, Write};

use flate2::write::GzEncoder;

/// Gzips a byte slice.
pub(crate) fn gzip(bytes: &[u8]) -> std::io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::new(), flate2::Compression::default());
    encoder.write_all(bytes)?;
    encoder.finish()
}

/// Builds a zip archive containing a single file entry.
pub(crate) fn zip_single_entry(
    entry_name: &str,
    bytes: &[u8],
) -> zip::result::ZipResult<Vec<u8>> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();

    writer.start_file(entry_name, options)?;
    writer.write_all(bytes)?;

    Ok(writer.finish()?.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;

    #[test]
    fn test_gzip_roundtrip() {
        let compressed = gzip(b"release binary payload").unwrap();

        let mut decoder = flate2::read::GzDecoder::new(compressed.as_slice());
        let mut decompressed = Vec::new();
        decoder.read_to_end(&mut decompressed).unwrap();

        assert_eq!(decompressed, b"release binary payload");
    }

    #[test]
    fn test_gzip_is_deterministic() {
        assert_eq!(gzip(b"same input").unwrap(), gzip(b"same input").unwrap());
    }

    #[test]
    fn test_zip_single_entry() {
        let archive = zip_single_entry("app.exe", b"MZ binary").unwrap();

        let mut reader = zip::ZipArchive::new(Cursor::new(archive)).unwrap();
        assert_eq!(reader.len(), 1);

        let mut entry = reader.by_index(0).unwrap();
        assert_eq!(entry.name(), "app.exe");

        let mut contents = Vec::new();
        entry.read_to_end(&mut contents).unwrap();
        assert_eq!(contents, b"MZ binary");
    }

    #[test]
    fn test_zip_is_deterministic() {
        let a = zip_single_entry("app", b"bytes").unwrap();
        let b = zip_single_entry("app", b"bytes").unwrap();
        assert_eq!(a, b);
    }
}
