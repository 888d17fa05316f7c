//! # letterfeed-mime
//!
//! Lenient MIME decoding for inbound newsletter mail.
//!
//! ## Features
//!
//! - **Message parsing**: headers, nested multipart bodies, embedded `message/rfc822`
//! - **Header decoding**: RFC 2047 encoded words in any charset known to `encoding_rs`
//! - **Transfer decoding**: Base64 and Quoted-Printable bodies
//! - **Charset decoding**: undecodable bytes are dropped instead of failing
//! - **Addresses and dates**: `From` mailbox parsing and RFC 2822 dates
//!
//! Decoding never panics on hostile input. Operations that can fail return
//! [`Result`] so callers decide whether a broken part is fatal.
//!
//! ## Quick Start
//!
//! ```ignore
//! use letterfeed_mime::Message;
//!
//! let raw = b"From: Weekly <news@example.com>\r\n\
//!             Subject: =?utf-8?B?SMOpbGxv?=\r\n\
//!             Message-ID: <1@example.com>\r\n\
//!             Content-Type: text/html; charset=utf-8\r\n\
//!             \r\n\
//!             <p>Hello</p>";
//!
//! let message = Message::parse(raw);
//! assert_eq!(message.subject().as_deref(), Some("Héllo"));
//! for part in message.parts() {
//!     println!("{}", part.content_type());
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![forbid(unsafe_code)]

mod address;
mod charset;
mod content_type;
mod date;
mod error;
mod header;
mod message;

pub mod encoding;

pub use address::Mailbox;
pub use charset::decode_charset;
pub use content_type::{ContentType, Disposition};
pub use date::parse_date;
pub use error::{Error, Result};
pub use header::Headers;
pub use message::{Message, Part, TransferEncoding, Walk};
