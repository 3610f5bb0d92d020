//! Utility functions for common operations.
//!
//! This module provides reusable text helpers for the feed pipeline:
//!
//! - **Truncation**: Unicode-aware character-count truncation
//! - **Sanitization**: Removal of characters XML 1.0 cannot carry
//!
//! # Examples
//!
//! ```
//! use imob_feed::util::{strip_xml_invalid_chars, truncate_chars};
//!
//! let description = truncate_chars("Apartamento mobiliado", 11);
//! assert_eq!(description, "Apartamento");
//!
//! let clean = strip_xml_invalid_chars("Centro\u{0}");
//! assert_eq!(clean, "Centro");
//! ```

mod text;

pub use text::{strip_xml_invalid_chars, truncate_chars};
