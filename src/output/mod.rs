//! Presentation of run reports.
//!
//! The driver returns a [`RunReport`](crate::driver::RunReport); these
//! formatters turn it into:
//! - human-readable text with optional colors ([`TextOutput`])
//! - JSON for automation and scripting ([`JsonOutput`])
//!
//! # Example
//!
//! ```no_run
//! use linkdupe::driver::{Driver, DriverConfig};
//! use linkdupe::output::{JsonOutput, TextOutput};
//! use std::path::Path;
//!
//! let report = Driver::new(DriverConfig::default())
//!     .run(Path::new("."))
//!     .unwrap();
//!
//! TextOutput::new(&report).write_to(&mut std::io::stdout()).unwrap();
//! println!("{}", JsonOutput::new(&report).to_json_pretty().unwrap());
//! ```

pub mod json;
pub mod text;

pub use json::JsonOutput;
pub use text::TextOutput;
