use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("database error: {0}")]
    Database(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not found: {0}")]
    NotFound(String),
}

#[cfg(test)]
mod tests {
    use super::Error;

    #[test]
    fn error_display_includes_context() {
        let e = Error::Config("bad yaml".into());
        assert_eq!(e.to_string(), "configuration error: bad yaml");

        let e = Error::Database("disk I/O error".into());
        assert_eq!(e.to_string(), "database error: disk I/O error");

        let e = Error::NotFound("config.yml".into());
        assert_eq!(e.to_string(), "not found: config.yml");
    }

    #[test]
    fn io_errors_convert() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied");
        let e: Error = io.into();
        assert!(matches!(e, Error::Io(_)));
        assert_eq!(e.to_string(), "io error: denied");
    }
}
