use super::TransferError;
pub use embedded_hal::spi::ErrorKind;

impl embedded_hal::spi::Error for TransferError {
    fn kind(&self) -> ErrorKind {
        match self {
            Self::Overrun => ErrorKind::Overrun,
            Self::ModeFault => ErrorKind::ModeFault,
            Self::ChipSelectPin => ErrorKind::ChipSelectFault,
            Self::Crc | Self::InvalidConfig(_) | Self::PartialFrame => ErrorKind::Other,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spi::ConfigIssue;
    use embedded_hal::spi::Error;

    #[test]
    fn error_kinds() {
        assert_eq!(TransferError::Overrun.kind(), ErrorKind::Overrun);
        assert_eq!(TransferError::ModeFault.kind(), ErrorKind::ModeFault);
        assert_eq!(TransferError::ChipSelectPin.kind(), ErrorKind::ChipSelectFault);
        assert_eq!(
            TransferError::InvalidConfig(ConfigIssue::Role).kind(),
            ErrorKind::Other
        );
    }
}
