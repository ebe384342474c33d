#![cfg_attr(doc, doc = include_str!("../README.md"))]
#![forbid(unsafe_code)]
#![deny(missing_debug_implementations)]

pub mod config;
mod error;
pub mod logging;

pub use error::{CliError, CliResult};

// Ensure README.md contains valid code
#[cfg(doctest)]
mod test_readme {
    macro_rules! external_doc_test {
        ($x:expr) => {
            #[doc = $x]
            unsafe extern "C" {}
        };
    }

    external_doc_test!(include_str!("../README.md"));
}
