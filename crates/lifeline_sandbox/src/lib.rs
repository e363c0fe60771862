//! Sandboxed filesystem access for Lifeline.
//!
//! Every file-facing command (listing, downloads, uploads, applying staged
//! files) resolves its path through a [`Sandbox`]. Resolution is purely
//! lexical and guarantees that the result stays inside the sandbox root no
//! matter what the input contains.
//!
//! # Example
//!
//! ```rust
//! use lifeline_sandbox::Sandbox;
//!
//! # fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let sandbox = Sandbox::new("/srv/lifeline")?;
//! assert_eq!(sandbox.resolve("inbox/../notes.txt")?, sandbox.resolve("notes.txt")?);
//! assert!(sandbox.resolve("../etc/passwd").is_err());
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

mod resolver;

pub use lifeline_error::{SandboxError, SandboxErrorKind, SandboxResult};
pub use resolver::{INBOX_DIR, SNAPSHOTS_DIR, Sandbox};
