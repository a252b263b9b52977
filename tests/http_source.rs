//! `HttpSource` against an in-process HTTP server.
//!
//! The server speaks just enough HTTP/1.1 for the source: HEAD reports
//! the archive size and range support, GET honors `Range: bytes=a-b`.
//! A configurable body cap truncates every range answer, forcing the
//! source to resume with follow-up requests.

mod common;

use std::sync::Arc;

use anyhow::Result;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

use common::{build_zip, FileSpec};
use streamzip::{HttpSource, RandomSource, ReadOptions, VecSink, ZipReader};

/// Spawn the server and return the archive URL.
async fn serve(archive: Arc<Vec<u8>>, max_body: Option<usize>) -> Result<String> {
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    tokio::spawn(async move {
        loop {
            let Ok((stream, _)) = listener.accept().await else {
                break;
            };
            let archive = archive.clone();
            tokio::spawn(async move {
                let _ = handle_connection(stream, &archive, max_body).await;
            });
        }
    });

    Ok(format!("http://{addr}/fixture.zip"))
}

async fn handle_connection(
    mut stream: TcpStream,
    archive: &[u8],
    max_body: Option<usize>,
) -> std::io::Result<()> {
    // The client reuses the connection, so answer requests until it
    // hangs up.
    loop {
        let mut raw = Vec::new();
        let mut byte = [0u8; 1];
        while !raw.ends_with(b"\r\n\r\n") {
            if stream.read(&mut byte).await? == 0 || raw.len() > 16 * 1024 {
                return Ok(());
            }
            raw.extend_from_slice(&byte);
        }
        let request = String::from_utf8_lossy(&raw);

        let mut lines = request.lines();
        let is_head = lines.next().unwrap_or_default().starts_with("HEAD");
        let mut range = None;
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                if name.eq_ignore_ascii_case("range") {
                    range = value.trim().strip_prefix("bytes=").map(str::to_string);
                }
            }
        }

        if is_head {
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {}\r\naccept-ranges: bytes\r\n\r\n",
                archive.len()
            );
            stream.write_all(head.as_bytes()).await?;
            continue;
        }

        let bounds = range
            .as_deref()
            .and_then(|r| r.split_once('-'))
            .and_then(|(a, b)| Some((a.parse::<u64>().ok()?, b.parse::<u64>().ok()?)));
        let Some((first, last)) = bounds else {
            // No range: serve the whole archive.
            let head = format!(
                "HTTP/1.1 200 OK\r\ncontent-length: {}\r\n\r\n",
                archive.len()
            );
            stream.write_all(head.as_bytes()).await?;
            stream.write_all(archive).await?;
            continue;
        };

        let first = first as usize;
        let last = (last as usize).min(archive.len() - 1);
        let mut body = &archive[first..=last];
        if let Some(cap) = max_body {
            if body.len() > cap {
                body = &body[..cap];
            }
        }
        let head = format!(
            "HTTP/1.1 206 Partial Content\r\ncontent-length: {}\r\ncontent-range: bytes {}-{}/{}\r\n\r\n",
            body.len(),
            first,
            first + body.len() - 1,
            archive.len()
        );
        stream.write_all(head.as_bytes()).await?;
        stream.write_all(body).await?;
    }
}

fn fixture() -> (Vec<u8>, Vec<u8>) {
    let payload: Vec<u8> = (0..=255u8).cycle().take(5_000).collect();
    let archive = build_zip(
        &[
            FileSpec {
                name: b"notes.txt".to_vec(),
                payload: b"remote but reachable\n".to_vec(),
                ..Default::default()
            },
            FileSpec {
                name: b"blob.bin".to_vec(),
                payload: payload.clone(),
                method: 8,
                ..Default::default()
            },
        ],
        &[],
        &[],
    );
    (archive, payload)
}

#[tokio::test]
async fn lists_and_extracts_over_http() -> Result<()> {
    let (archive, payload) = fixture();
    let archive_len = archive.len() as u64;
    let url = serve(Arc::new(archive), None).await?;

    let source = HttpSource::connect(url).await?;
    assert_eq!(source.size(), archive_len);

    let source = Arc::new(source);
    let reader = ZipReader::new(source.clone());

    let entries = reader.list_entries().await?;
    assert_eq!(entries.len(), 2);
    assert_eq!(entries[0].filename, "notes.txt");
    assert_eq!(entries[1].filename, "blob.bin");

    let data = reader
        .read_entry(
            &entries[1],
            VecSink::new(),
            ReadOptions {
                check_crc: Some(true),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(data, payload);

    // only the tail and one entry were fetched, never the whole archive
    // twice over
    assert!(source.transferred_bytes() > 0);
    Ok(())
}

#[tokio::test]
async fn short_range_responses_are_resumed() -> Result<()> {
    let (archive, payload) = fixture();
    // every range answer is capped well below the directory and entry
    // sizes, so each logical read takes several requests
    let url = serve(Arc::new(archive), Some(64)).await?;

    let source = Arc::new(HttpSource::connect(url).await?);
    let reader = ZipReader::new(source.clone());

    let entries = reader.list_entries().await?;
    assert_eq!(entries.len(), 2);

    let data = reader
        .read_entry(
            &entries[1],
            VecSink::new(),
            ReadOptions {
                check_crc: Some(true),
                ..Default::default()
            },
        )
        .await?;
    assert_eq!(data, payload);
    assert_eq!(
        reader.read_entry_to_vec(&entries[0]).await?,
        b"remote but reachable\n"
    );
    Ok(())
}
