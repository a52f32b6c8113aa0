use std::{path::PathBuf, sync::Arc};

/// Where the bytes of an MBTiles archive come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArchiveSource {
    /// Fetched over HTTP(S); the response body is the archive.
    Url(String),
    /// An archive already held in memory.
    Bytes(Arc<[u8]>),
    /// A local file, opened in place.
    Path(PathBuf),
}

impl ArchiveSource {
    /// Short human readable description for log lines.
    pub fn describe(&self) -> String {
        match self {
            ArchiveSource::Url(url) => url.clone(),
            ArchiveSource::Bytes(bytes) => format!("<{} byte buffer>", bytes.len()),
            ArchiveSource::Path(path) => path.display().to_string(),
        }
    }
}

impl From<&str> for ArchiveSource {
    fn from(url: &str) -> Self {
        ArchiveSource::Url(url.to_string())
    }
}

impl From<String> for ArchiveSource {
    fn from(url: String) -> Self {
        ArchiveSource::Url(url)
    }
}

impl From<Vec<u8>> for ArchiveSource {
    fn from(bytes: Vec<u8>) -> Self {
        ArchiveSource::Bytes(bytes.into())
    }
}

impl From<&[u8]> for ArchiveSource {
    fn from(bytes: &[u8]) -> Self {
        ArchiveSource::Bytes(bytes.into())
    }
}

impl From<Arc<[u8]>> for ArchiveSource {
    fn from(bytes: Arc<[u8]>) -> Self {
        ArchiveSource::Bytes(bytes)
    }
}

impl From<PathBuf> for ArchiveSource {
    fn from(path: PathBuf) -> Self {
        ArchiveSource::Path(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conversions() {
        assert_eq!(
            ArchiveSource::from("asset/light_all.mbtiles"),
            ArchiveSource::Url("asset/light_all.mbtiles".to_string())
        );
        assert!(matches!(ArchiveSource::from(vec![1u8, 2, 3]), ArchiveSource::Bytes(b) if b.len() == 3));
        assert!(matches!(
            ArchiveSource::from(PathBuf::from("/tmp/a.mbtiles")),
            ArchiveSource::Path(_)
        ));
    }

    #[test]
    fn test_describe() {
        assert_eq!(ArchiveSource::from(&[0u8; 4][..]).describe(), "<4 byte buffer>");
        assert_eq!(ArchiveSource::from("http://x/y.mbtiles").describe(), "http://x/y.mbtiles");
    }
}
