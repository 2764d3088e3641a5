use thiserror::Error;

/// Ethereum encoding and data-model errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EthError {
    #[error("invalid address: {0}")]
    InvalidAddress(String),

    #[error("encoding error: {0}")]
    EncodingError(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("unsupported chain: {0}")]
    UnsupportedChain(u64),

    #[error("config error: {0}")]
    Config(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_invalid_address() {
        let err = EthError::InvalidAddress("bad checksum".into());
        assert_eq!(err.to_string(), "invalid address: bad checksum");
    }

    #[test]
    fn display_encoding_error() {
        let err = EthError::EncodingError("odd number of digits".into());
        assert_eq!(err.to_string(), "encoding error: odd number of digits");
    }

    #[test]
    fn display_invalid_argument() {
        let err = EthError::InvalidArgument("negative uint256".into());
        assert_eq!(err.to_string(), "invalid argument: negative uint256");
    }

    #[test]
    fn display_unsupported_chain() {
        let err = EthError::UnsupportedChain(999);
        assert_eq!(err.to_string(), "unsupported chain: 999");
    }

    #[test]
    fn error_trait_is_implemented() {
        let err: Box<dyn std::error::Error> = Box::new(EthError::Config("missing rpcUrl".into()));
        assert!(err.to_string().contains("missing rpcUrl"));
    }
}
