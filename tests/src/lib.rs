//! # Marketplace Escrow Test Suite
//!
//! Cross-subsystem scenarios over the in-memory chain node and ledger.
//!
//! ## Structure
//!
//! ```text
//! tests/src/
//! └── integration/
//!     ├── catch_up.rs          # watermark contiguity, restarts, the run loop
//!     ├── settlement.rs        # listing, purchase, cancel, deposit, withdraw
//!     ├── keys_and_units.rs    # key pool leasing, scheduler cap
//!     └── payload.rs           # listing call payload through the classifier
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p esc-tests
//! cargo test -p esc-tests integration::settlement::
//! ```

pub mod integration;
