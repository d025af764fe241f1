use crate::application::orchestrator::Response;
use crate::error::PaymentError;
use serde::Serialize;
use std::io::{self, Write};

/// The `{success, data, error, code}` shape every response is written in.
#[derive(Debug, Serialize)]
pub struct Envelope<'a> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<&'a Response>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
}

impl<'a> Envelope<'a> {
    pub fn from_result(result: &'a Result<Response, PaymentError>) -> Self {
        match result {
            Ok(response) => Self {
                success: true,
                data: Some(response),
                error: None,
                code: None,
            },
            Err(e) => Self {
                success: false,
                data: None,
                error: Some(e.to_string()),
                code: Some(e.code()),
            },
        }
    }
}

/// Writes one envelope per line.
pub struct ResponseWriter<W: Write> {
    sink: W,
}

impl<W: Write> ResponseWriter<W> {
    pub fn new(sink: W) -> Self {
        Self { sink }
    }

    pub fn write(&mut self, result: &Result<Response, PaymentError>) -> io::Result<()> {
        serde_json::to_writer(&mut self.sink, &Envelope::from_result(result))?;
        self.sink.write_all(b"\n")
    }

    pub fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}
