//! Shepherd Client
//!
//! The seams between the monitor and the remote systems it babysits jobs
//! on. The wire protocols themselves belong to vendor glue outside this
//! repository; what lives here is:
//!
//! - `GridClient`: submit / describe / status / kill / retry against the
//!   execution grid
//! - `ReplicaCatalog`: dataset and file listings for output validation
//! - `TransferClient` / `TransferHandle`: spawning and watching the
//!   external file-transfer tool, plus the process-backed implementation
//! - `submission`: the identifier-store contract every grid
//!   implementation's `submit` goes through
//!
//! # Example
//!
//! ```no_run
//! use std::path::Path;
//! use shepherd_client::{ProcessTransferClient, TransferClient, TransferHandle};
//!
//! fn main() -> shepherd_client::Result<()> {
//!     let transfers = ProcessTransferClient::new("dget");
//!     let mut handle = transfers.begin_fetch("user.out.v1/", Path::new("/data/out"))?;
//!     if handle.has_exited() {
//!         println!("already done");
//!     }
//!     Ok(())
//! }
//! ```

pub mod error;
mod catalog;
mod grid;
pub mod submission;
mod transfer;

// Re-export commonly used types
pub use catalog::ReplicaCatalog;
pub use error::{ClientError, Result};
pub use grid::{GridClient, RetryDirective, StatusReport};
pub use transfer::{ProcessTransferClient, TransferClient, TransferHandle};
