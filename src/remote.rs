//! Store protocol client
//!
//! A thin async client that opens one connection per command, the same way
//! the server expects them.

use std::io;
use tokio::io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use crate::protocol::responses::{LIST_END, READY, parse_size_line};

pub struct RemoteClient {
    address: String,
}

impl RemoteClient {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
        }
    }

    async fn connect(&self) -> io::Result<TcpStream> {
        TcpStream::connect(&self.address).await
    }

    /// Uploads `data` as a new version of `path`.
    ///
    /// Returns once the server has closed the connection, which it does
    /// after committing or rejecting the upload.
    pub async fn write(&self, path: &str, data: &[u8]) -> io::Result<()> {
        let mut stream = self.connect().await?;
        let mut message = format!("WRITE {} {}\n", path, data.len()).into_bytes();
        message.extend_from_slice(data);
        stream.write_all(&message).await?;
        stream.shutdown().await?;

        let mut rest = Vec::new();
        stream.read_to_end(&mut rest).await?;
        Ok(())
    }

    /// Downloads `path` at `version`, latest when `None`.
    ///
    /// `Ok(None)` when the server answers `SIZE 0`.
    pub async fn get(&self, path: &str, version: Option<u32>) -> io::Result<Option<Vec<u8>>> {
        let stream = self.connect().await?;
        let mut reader = BufReader::new(stream);

        let header = match version {
            Some(v) => format!("GET {}:{}\n", path, v),
            None => format!("GET {}\n", path),
        };
        reader.get_mut().write_all(header.as_bytes()).await?;

        let mut line = String::new();
        reader.read_line(&mut line).await?;
        let size = parse_size_line(&line).ok_or_else(|| {
            io::Error::new(
                io::ErrorKind::InvalidData,
                format!("unexpected reply: {:?}", line),
            )
        })?;
        if size == 0 {
            return Ok(None);
        }

        reader.get_mut().write_all(READY.as_bytes()).await?;

        let mut data = vec![0u8; size as usize];
        reader.read_exact(&mut data).await?;
        Ok(Some(data))
    }

    /// Deletes entries and returns the server's reply line without its newline.
    pub async fn remove(&self, path: &str, version: Option<u32>) -> io::Result<String> {
        let stream = self.connect().await?;
        let mut reader = BufReader::new(stream);

        let header = match version {
            Some(v) => format!("RM {}:{}\n", path, v),
            None => format!("RM {}\n", path),
        };
        reader.get_mut().write_all(header.as_bytes()).await?;

        let mut line = String::new();
        if reader.read_line(&mut line).await? == 0 {
            return Err(io::ErrorKind::UnexpectedEof.into());
        }
        Ok(line.trim_end().to_string())
    }

    /// Lists stored names, optionally filtered by substring.
    pub async fn list(&self, filter: Option<&str>) -> io::Result<Vec<String>> {
        let stream = self.connect().await?;
        let mut reader = BufReader::new(stream);

        let header = match filter {
            Some(f) => format!("LS {}\n", f),
            None => "LS\n".to_string(),
        };
        reader.get_mut().write_all(header.as_bytes()).await?;

        let mut names = Vec::new();
        let mut lines = reader.lines();
        while let Some(line) = lines.next_line().await? {
            if line == LIST_END {
                return Ok(names);
            }
            names.push(line);
        }

        Err(io::Error::new(
            io::ErrorKind::UnexpectedEof,
            "listing ended without end marker",
        ))
    }
}
