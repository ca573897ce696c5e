use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

use super::PaginationError;

const PREFIX: &str = "cursor:";

/// Opaque position in a connection, wrapping the node id
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cursor(pub i64);

impl Cursor {
    pub fn encode(&self) -> String {
        URL_SAFE_NO_PAD.encode(format!("{PREFIX}{}", self.0))
    }

    pub fn decode(raw: &str) -> Result<Self, PaginationError> {
        let invalid = || PaginationError::InvalidCursor(raw.to_string());

        let bytes = URL_SAFE_NO_PAD.decode(raw).map_err(|_| invalid())?;
        let text = String::from_utf8(bytes).map_err(|_| invalid())?;
        text.strip_prefix(PREFIX)
            .and_then(|id| id.parse().ok())
            .map(Cursor)
            .ok_or_else(invalid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cursor_is_opaque_and_decodes() {
        let encoded = Cursor(1234).encode();
        assert!(!encoded.contains("1234"));
        assert_eq!(Cursor::decode(&encoded).unwrap(), Cursor(1234));
    }

    #[test]
    fn test_garbage_cursor_rejected() {
        assert!(matches!(
            Cursor::decode("not a cursor"),
            Err(PaginationError::InvalidCursor(_))
        ));

        let wrong_prefix = URL_SAFE_NO_PAD.encode("offset:5");
        assert!(Cursor::decode(&wrong_prefix).is_err());
    }
}
