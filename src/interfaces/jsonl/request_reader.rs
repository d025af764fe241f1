use crate::application::orchestrator::Request;
use std::io::BufRead;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ReadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("line {line}: {source}")]
    Parse {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
}

/// Reads requests from a JSON-lines source, one request object per line.
///
/// Blank lines are skipped. A malformed line yields an error for that line only;
/// iteration carries on with the next one.
pub struct RequestReader<R: BufRead> {
    source: R,
}

impl<R: BufRead> RequestReader<R> {
    pub fn new(source: R) -> Self {
        Self { source }
    }

    /// Lazily parses requests in input order.
    pub fn requests(self) -> impl Iterator<Item = Result<Request, ReadError>> {
        self.source
            .lines()
            .enumerate()
            .filter(|(_, line)| !matches!(line, Ok(text) if text.trim().is_empty()))
            .map(|(index, line)| {
                let line_no = index + 1;
                serde_json::from_str(line?.trim()).map_err(|source| ReadError::Parse {
                    line: line_no,
                    source,
                })
            })
    }
}
