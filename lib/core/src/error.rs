//! Shared result alias.
//!
//! Crates keep their own error enums (`GatewayError`, `LlmError`, ...) and
//! wrap them in a `rootcause::Report` at API boundaries.

use rootcause::Report;

/// `Result` carrying a `Report` of the crate's error enum.
pub type Result<T, C = ()> = std::result::Result<T, Report<C>>;

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Boom;

    impl std::fmt::Display for Boom {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str("boom")
        }
    }

    impl std::error::Error for Boom {}

    #[test]
    fn report_carries_context_display() {
        let failed: Result<(), Boom> = Err(Report::from(Boom));
        let err = failed.unwrap_err();
        assert!(err.to_string().contains("boom"));
    }
}
