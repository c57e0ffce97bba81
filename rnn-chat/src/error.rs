use thiserror::Error;

#[derive(Error, Debug)]
pub enum RnnError {
    #[error("config error: {0}")]
    Config(String),

    #[error("artifact error: {0}")]
    Artifact(String),

    #[error("corpus error: {0}")]
    Corpus(String),

    #[error("training error: {0}")]
    Training(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, RnnError>;

impl From<serde_json::Error> for RnnError {
    fn from(e: serde_json::Error) -> Self {
        RnnError::Artifact(e.to_string())
    }
}

impl From<bincode::Error> for RnnError {
    fn from(e: bincode::Error) -> Self {
        RnnError::Artifact(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = RnnError::Config("hidden_size must be positive".to_string());
        assert!(err.to_string().contains("config error"));

        let err = RnnError::Artifact("Wxh has 3 rows".to_string());
        assert!(err.to_string().contains("artifact error"));

        let err = RnnError::Corpus("no tokens".to_string());
        assert!(err.to_string().contains("corpus error"));

        let err = RnnError::Training("non-finite loss".to_string());
        assert!(err.to_string().contains("training error"));
    }

    #[test]
    fn test_from_json_error() {
        let bad: std::result::Result<Vec<f32>, _> = serde_json::from_str("{not json");
        if let Err(e) = bad {
            let err: RnnError = e.into();
            assert!(matches!(err, RnnError::Artifact(_)));
        }
    }

    #[test]
    fn test_from_bincode_error() {
        let bad_data: &[u8] = &[0xff, 0xff, 0xff];
        let decoded: std::result::Result<String, _> = bincode::deserialize(bad_data);
        if let Err(e) = decoded {
            let err: RnnError = e.into();
            assert!(matches!(err, RnnError::Artifact(_)));
        }
    }

    #[test]
    fn test_from_io_error() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "missing");
        let err: RnnError = io.into();
        assert!(matches!(err, RnnError::Io(_)));
    }
}
