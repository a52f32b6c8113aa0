//! Tile archive access: where the bytes come from and how they are queried.

pub mod database;
pub mod fetch;
pub mod metadata;
pub mod source;

pub use database::MbTilesDatabase;
pub use fetch::{BlobFetcher, HttpFetcher};
pub use metadata::{MbTilesMetadata, TileFormat};
pub use source::ArchiveSource;

use crate::Result;

/// Resolves `source` into an open archive, fetching it first when it is a URL.
pub async fn open_source(source: &ArchiveSource, fetcher: &dyn BlobFetcher) -> Result<MbTilesDatabase> {
    match source {
        ArchiveSource::Url(url) => {
            let bytes = fetcher.fetch(url).await?;
            MbTilesDatabase::from_bytes(&bytes)
        }
        ArchiveSource::Bytes(bytes) => MbTilesDatabase::from_bytes(bytes),
        ArchiveSource::Path(path) => MbTilesDatabase::open(path),
    }
}
