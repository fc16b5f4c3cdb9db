//! Testing utilities for the transport seam
//!
//! - **MemoryCouch**: in-memory CouchDB speaking the REST subset the engine uses,
//!   with request recording and scripted faults
//!
//! # Example
//!
//! ```ignore
//! use settee_transport::testing::MemoryCouch;
//!
//! let couch = MemoryCouch::new().with_database("blog");
//! couch.insert("blog", "abc", serde_json::json!({"title": "a"}));
//! assert!(couch.revision("blog", "abc").is_some());
//! ```

mod collate;
mod memory_couch;

pub use collate::collate;
pub use memory_couch::{MemoryCouch, ViewFn};
