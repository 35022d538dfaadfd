pub trait ResultOkLogExt<T, E> {
    /// Logs the error, prefixed with `context`, and turns the result into an `Option`.
    fn ok_log(self, context: &str) -> Option<T>;
}

impl<T, E> ResultOkLogExt<T, E> for std::result::Result<T, E>
where
    E: std::error::Error,
{
    fn ok_log(self, context: &str) -> Option<T> {
        match self {
            Ok(ok) => Some(ok),
            Err(err) => {
                log::error!("{context}: {err}");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ok_log() {
        let ok: Result<u32, std::num::ParseIntError> = "7".parse();
        assert_eq!(ok.ok_log("parsing"), Some(7));

        let err: Result<u32, std::num::ParseIntError> = "seven".parse();
        assert_eq!(err.ok_log("parsing"), None);
    }
}
