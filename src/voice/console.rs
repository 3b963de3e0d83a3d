//! Console capture: the transcript is a typed line

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader, Lines};
use tokio::sync::Mutex;

use super::CaptureService;
use crate::{Error, Result};

type LineSource = Lines<BufReader<Box<dyn AsyncRead + Send + Unpin>>>;

/// Reads one line per turn from stdin, or any other reader
///
/// The buffered reader lives as long as the service, so piped input
/// yields one line per turn.
pub struct ConsoleCapture {
    lines: Mutex<LineSource>,
}

impl ConsoleCapture {
    #[must_use]
    pub fn new() -> Self {
        Self::from_reader(tokio::io::stdin())
    }

    /// Read transcripts from `reader` instead of stdin
    #[must_use]
    pub fn from_reader(reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        let reader: Box<dyn AsyncRead + Send + Unpin> = Box::new(reader);
        Self {
            lines: Mutex::new(BufReader::new(reader).lines()),
        }
    }
}

impl Default for ConsoleCapture {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CaptureService for ConsoleCapture {
    fn availability(&self) -> Result<()> {
        Ok(())
    }

    async fn capture(&self) -> Result<String> {
        let line = self.lines.lock().await.next_line().await?;
        line.ok_or_else(|| Error::Capture("stdin closed".to_string()))
    }

    fn name(&self) -> &'static str {
        "console"
    }
}
