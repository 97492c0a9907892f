//! Common utilities for the voxpart toolkit

pub mod error;

pub use error::{Error, Result};

#[cfg(test)]
mod tests {
    use crate::Error;

    #[test]
    fn hint_file_error_names_line() {
        let err = Error::HintFile {
            line: 7,
            message: "unknown rule 'X'".to_string(),
        };
        assert_eq!(err.to_string(), "Hint file error at line 7: unknown rule 'X'");
    }
}
