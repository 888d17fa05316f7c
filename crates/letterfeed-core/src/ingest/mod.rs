//! Newsletter ingestion pipeline.
//!
//! A pass resolves settings, groups newsletters by the folder they are
//! scanned in and, for each folder, opens one mail session and runs every
//! unseen message through:
//!
//! 1. [`decode_message`]: headers, charsets and the best body part
//! 2. deduplication by `Message-ID`
//! 3. [`classify`]: sender lookup, with optional auto-provisioning
//! 4. [`extract_content`]: only for newsletters with extraction enabled
//! 5. storage, then mark-as-read and move
//!
//! A message whose entry could not be stored is left unseen so the next
//! pass retries it.

mod classify;
mod decoder;
mod extract;
mod orchestrator;
mod scanner;

pub use classify::{Classification, SenderMap, classify};
pub use decoder::{DecodeError, DecodedMessage, decode_message};
pub use extract::{Extracted, FALLBACK_TITLE, extract_content, sanitize};
pub use orchestrator::{
    FolderOutcome, FolderReport, Ingestor, RunReport, group_by_folder,
};
pub use scanner::{FolderScanner, MessageOutcome, ScanStats};
