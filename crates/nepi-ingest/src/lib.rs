//! From loaded file to wire response: classification, text extraction with
//! PDF fallback, remote source loading and response assembly.

pub mod classify;
pub mod pipeline;
pub mod response;
pub mod source;
pub mod text;

pub use classify::{FileKind, classify, guess_media_type};
pub use pipeline::Pipeline;
pub use response::{UNSUPPORTED_NOTE, assemble, failure, unsupported};
pub use source::{RemoteFetcher, SourceHints, filename_from_url, load_path};
pub use text::{TextExtractor, TextOutcome, truncate_chars};
