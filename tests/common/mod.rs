//! Shared fixtures: small MBTiles archives built on the fly.

#![allow(dead_code)]

use std::io::Cursor;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// A 2×3 opaque PNG.
pub fn png_tile() -> Vec<u8> {
    let img = image::RgbaImage::from_pixel(2, 3, image::Rgba([200, 100, 50, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageOutputFormat::Png).unwrap();
    out.into_inner()
}

/// A 5×5 JPEG.
pub fn jpg_tile() -> Vec<u8> {
    let img = image::RgbImage::from_pixel(5, 5, image::Rgb([0, 128, 255]));
    let mut out = Cursor::new(Vec::new());
    img.write_to(&mut out, image::ImageOutputFormat::Jpeg(80)).unwrap();
    out.into_inner()
}

pub struct Fixture {
    pub metadata: Vec<(&'static str, String)>,
    /// `(zoom, column, tms_row, payload)`; `None` stores NULL.
    pub tiles: Vec<(u8, u32, u32, Option<Vec<u8>>)>,
}

impl Fixture {
    /// Zoom 1 archive, bottom-origin rows:
    /// - (1, 0, 1): PNG, i.e. the host's top-left tile
    /// - (1, 1, 1): empty blob
    /// - (1, 1, 0): NULL
    /// - (1, 0, 0): bytes that are not an image
    pub fn standard() -> Self {
        Self {
            metadata: vec![
                ("name", "fixture".to_string()),
                ("attribution", "© fixture contributors".to_string()),
                ("minzoom", "1".to_string()),
                ("maxzoom", "2".to_string()),
                ("format", "png".to_string()),
                ("bounds", "-180,-85,180,85".to_string()),
            ],
            tiles: vec![
                (1, 0, 1, Some(png_tile())),
                (1, 1, 1, Some(Vec::new())),
                (1, 1, 0, None),
                (1, 0, 0, Some(b"not an image".to_vec())),
            ],
        }
    }

    pub fn write_to(&self, path: &Path) {
        let conn = Connection::open(path).unwrap();
        conn.execute_batch(
            "CREATE TABLE metadata (name TEXT, value TEXT);
             CREATE TABLE tiles (zoom_level INTEGER, tile_column INTEGER, tile_row INTEGER, tile_data BLOB);
             CREATE UNIQUE INDEX tile_index ON tiles (zoom_level, tile_column, tile_row);",
        )
        .unwrap();
        for (name, value) in &self.metadata {
            conn.execute("INSERT INTO metadata (name, value) VALUES (?1, ?2)", params![name, value])
                .unwrap();
        }
        for (z, x, y, data) in &self.tiles {
            conn.execute(
                "INSERT INTO tiles (zoom_level, tile_column, tile_row, tile_data) VALUES (?1, ?2, ?3, ?4)",
                params![z, x, y, data],
            )
            .unwrap();
        }
    }

    pub fn bytes(&self) -> Vec<u8> {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fixture.mbtiles");
        self.write_to(&path);
        std::fs::read(&path).unwrap()
    }

    /// Writes the archive into `dir` and returns its path.
    pub fn file_in(&self, dir: &Path) -> PathBuf {
        let path = dir.join("fixture.mbtiles");
        self.write_to(&path);
        path
    }
}

/// Serves `body` with `status` to every connection on an ephemeral port and
/// returns the base URL.
pub async fn serve(status: &'static str, body: Vec<u8>) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();

    tokio::spawn(async move {
        loop {
            let Ok((mut socket, _)) = listener.accept().await else {
                return;
            };
            let body = body.clone();
            tokio::spawn(async move {
                let mut request = Vec::new();
                let mut buf = [0u8; 1024];
                while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                    match socket.read(&mut buf).await {
                        Ok(0) | Err(_) => return,
                        Ok(n) => request.extend_from_slice(&buf[..n]),
                    }
                }
                let head = format!(
                    "HTTP/1.1 {}\r\nContent-Type: application/octet-stream\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    status,
                    body.len()
                );
                let _ = socket.write_all(head.as_bytes()).await;
                let _ = socket.write_all(&body).await;
                let _ = socket.shutdown().await;
            });
        }
    });

    format!("http://{}", addr)
}
