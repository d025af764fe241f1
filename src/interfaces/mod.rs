//! Edge adapters: JSON-lines requests in, JSON envelopes and CSV summaries out.

pub mod csv;
pub mod jsonl;
