//! LDraw model file support.
//!
//! LDraw files are line oriented: every record starts with a numeric
//! command kind followed by whitespace separated fields.
//!
//! ## Supported Records
//!
//! - `0` comments and meta commands (`FILE`, `!COLOUR`, `WRITE`, `PRINT`)
//! - `1` part references with a 12 coefficient placement
//! - `2` line segments, `5` optional lines
//! - `3` triangles, `4` quadrilaterals
//!
//! Anything else (unknown kinds, non-numeric leading tokens, blank lines)
//! is skipped.
//!
//! # Example
//!
//! ```ignore
//! use l2rib_core::ldraw::{parse_command, Command};
//!
//! if let Ok(Some(Command::Triangle(tri))) = parse_command(1, "3 4 0 0 0 1 0 0 0 1 0") {
//!     println!("triangle in colour {:?}", tri.colour);
//! }
//! ```

mod parser;
mod types;

pub use parser::*;
pub use types::*;
