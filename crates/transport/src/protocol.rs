//! Wire messages exchanged with the helper

use serde::{Deserialize, Serialize};
use sideload_errors::{ConnectionError, Error};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

/// Requests sent by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Followed by `size` raw bytes
    Begin { identifier: String, size: u64 },
    Install,
    QueryInstalled {
        resigned_identifier: String,
    },
}

/// Responses sent by the helper
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Response {
    Received,
    Progress { fraction: f64 },
    Installed,
    InstalledStatus { installed: bool },
    Error { message: String },
}

/// Write one JSON line
///
/// # Errors
///
/// Returns an error if serialization or the write fails.
pub async fn write_message<W, T>(writer: &mut W, message: &T) -> Result<(), Error>
where
    W: AsyncWrite + Unpin,
    T: Serialize,
{
    let mut line = serde_json::to_vec(message)?;
    line.push(b'\n');
    writer.write_all(&line).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one JSON line, `None` on clean end of stream
///
/// # Errors
///
/// Returns an error if the read fails or the line is not a known message.
pub async fn read_message<R, T>(reader: &mut R) -> Result<Option<T>, Error>
where
    R: AsyncBufRead + Unpin,
    T: for<'de> Deserialize<'de>,
{
    let mut line = String::new();
    if reader.read_line(&mut line).await? == 0 {
        return Ok(None);
    }
    serde_json::from_str(line.trim_end())
        .map(Some)
        .map_err(|e| {
            ConnectionError::Protocol {
                message: format!("{e}: {}", line.trim_end()),
            }
            .into()
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::BufReader;

    #[tokio::test]
    async fn messages_are_single_tagged_lines() {
        let mut buf = Vec::new();
        write_message(
            &mut buf,
            &Request::Begin {
                identifier: "com.example.app".into(),
                size: 42,
            },
        )
        .await
        .unwrap();
        let text = String::from_utf8(buf.clone()).unwrap();
        assert!(text.ends_with('\n'));
        assert_eq!(text.matches('\n').count(), 1);
        assert!(text.contains(r#""type":"begin""#));

        let mut reader = BufReader::new(buf.as_slice());
        let parsed: Option<Request> = read_message(&mut reader).await.unwrap();
        assert!(matches!(parsed, Some(Request::Begin { size: 42, .. })));
        let end: Option<Request> = read_message(&mut reader).await.unwrap();
        assert!(end.is_none());
    }

    #[tokio::test]
    async fn unknown_message_is_protocol_error() {
        let mut reader = BufReader::new(&b"{\"type\":\"bogus\"}\n"[..]);
        let err = read_message::<_, Response>(&mut reader).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Connection(ConnectionError::Protocol { .. })
        ));
    }
}
