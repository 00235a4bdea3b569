use thiserror::Error;

/// Errors that can occur while discovering, connecting to, or printing on a receipt printer
#[derive(Error, Debug)]
pub enum PrintError {
    /// The host has no usable Bluetooth Low Energy stack
    #[error("Bluetooth printing is not supported here: {0}")]
    Unsupported(String),

    /// The user dismissed the device chooser without picking a printer
    #[error("No printer was selected")]
    EmptySelection,

    /// Opening the GATT connection or enumerating services failed
    #[error("Could not connect to the printer: {0}")]
    ConnectionFailed(String),

    /// Negotiation exhausted every service without finding a writable characteristic
    #[error("Printer exposes no writable channel ({services_searched} service(s) searched)")]
    ChannelNotFound {
        /// Number of services that were searched
        services_searched: usize,
    },

    /// A write failed after transmission had started
    #[error("Sending to the printer failed at chunk {chunk} of {chunks}: {reason}")]
    TransmitFailed {
        /// Zero-based index of the failed chunk (0 is the initialize command)
        chunk: usize,
        /// Total number of writes planned for the job
        chunks: usize,
        /// Underlying failure description
        reason: String,
    },

    /// Printing was requested with no current or resolvable printer
    #[error("No printer configured - pair a printer first")]
    NoPrinterConfigured,

    /// The document holds a character the single-byte encoder cannot represent
    #[error("Cannot encode {character:?} in {field} for the printer")]
    EncodingUnsupported {
        /// Receipt field that contained the character
        field: String,
        /// Offending character
        character: char,
    },

    /// Bluetooth Low Energy related errors
    #[error("BLE error: {0}")]
    Ble(#[from] btleplug::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error while reading or writing persisted state
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    Config(String),
}

/// Result type for receipt printing operations
pub type Result<T> = std::result::Result<T, PrintError>;

impl PrintError {
    /// Check if the caller should offer to pick a different printer
    #[must_use]
    pub const fn should_rediscover(&self) -> bool {
        matches!(
            self,
            Self::ConnectionFailed(_) | Self::ChannelNotFound { .. }
        )
    }

    /// Check if the caller should hand the document to the standard print path
    #[must_use]
    pub const fn should_fall_back(&self) -> bool {
        matches!(self, Self::Unsupported(_) | Self::NoPrinterConfigured)
    }

    /// Check if this is a user cancellation that must not be reported as a failure
    #[must_use]
    pub const fn is_cancellation(&self) -> bool {
        matches!(self, Self::EmptySelection)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_classification() {
        let connection_error = PrintError::ConnectionFailed("out of range".to_string());
        assert!(connection_error.should_rediscover());
        assert!(!connection_error.should_fall_back());
        assert!(!connection_error.is_cancellation());

        let no_channel = PrintError::ChannelNotFound { services_searched: 3 };
        assert!(no_channel.should_rediscover());

        let unsupported = PrintError::Unsupported("no adapter".to_string());
        assert!(unsupported.should_fall_back());
        assert!(!unsupported.should_rediscover());
        assert!(PrintError::NoPrinterConfigured.should_fall_back());

        let cancelled = PrintError::EmptySelection;
        assert!(cancelled.is_cancellation());
        assert!(!cancelled.should_rediscover());
        assert!(!cancelled.should_fall_back());
    }

    #[test]
    fn test_error_display() {
        let error = PrintError::TransmitFailed {
            chunk: 2,
            chunks: 4,
            reason: "link lost".to_string(),
        };
        let error_string = format!("{error}");
        assert!(error_string.contains("chunk 2 of 4"));
        assert!(error_string.contains("link lost"));

        let error = PrintError::ChannelNotFound { services_searched: 5 };
        assert!(format!("{error}").contains("5 service(s)"));
    }
}
