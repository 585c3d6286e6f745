//! QR decoding and ticket-code extraction.
//!
//! Image decoding is delegated to an external HTTP service; this module owns
//! the client for it plus the pure string handling around the decoded value.

use crate::error::ReservationError;
use serde::Deserialize;
use tixie_breaker::CircuitBreaker;

/// One decoded symbol from the QR decoder.
#[derive(Debug, Deserialize)]
struct QrSymbol {
    data: Option<String>,
    error: Option<String>,
}

/// Decoder response: a list of results, each with its symbols.
#[derive(Debug, Deserialize)]
struct QrResult {
    symbol: Vec<QrSymbol>,
}

/// Client for the external QR decoder.
#[derive(Debug, Clone)]
pub struct QrClient {
    http: reqwest::Client,
    decoder_url: String,
    breaker: CircuitBreaker,
}

impl QrClient {
    /// Create a client for the decoder at `decoder_url`.
    #[must_use]
    pub fn new(http: reqwest::Client, decoder_url: impl Into<String>) -> Self {
        Self {
            http,
            decoder_url: decoder_url.into(),
            breaker: CircuitBreaker::with_defaults("qr-decoder"),
        }
    }

    /// Decode an uploaded QR image to its embedded string.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Qr`] when the decoder is unreachable or
    /// the image carries no readable code.
    pub async fn decode_image(&self, image: Vec<u8>) -> Result<String, ReservationError> {
        let result = self
            .breaker
            .call(|| async {
                let part = reqwest::multipart::Part::bytes(image.clone()).file_name("qr.png");
                let form = reqwest::multipart::Form::new().part("file", part);
                self.decode(form).await
            })
            .await;
        result.map_err(ReservationError::from)
    }

    /// Decode a QR image reachable at `url`.
    ///
    /// # Errors
    ///
    /// Returns [`ReservationError::Qr`] when the decoder is unreachable or
    /// the image carries no readable code.
    pub async fn decode_url(&self, url: &str) -> Result<String, ReservationError> {
        let result = self
            .breaker
            .call(|| async {
                let form = reqwest::multipart::Form::new().text("file", format!("@url:{url}"));
                self.decode(form).await
            })
            .await;
        result.map_err(ReservationError::from)
    }

    async fn decode(&self, form: reqwest::multipart::Form) -> Result<String, ReservationError> {
        let response = self
            .http
            .post(&self.decoder_url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| ReservationError::Qr(e.to_string()))?;

        if !response.status().is_success() {
            return Err(ReservationError::Qr(format!(
                "decoder returned status {}",
                response.status()
            )));
        }

        let results: Vec<QrResult> = response
            .json()
            .await
            .map_err(|e| ReservationError::Qr(e.to_string()))?;

        let symbol = results
            .first()
            .and_then(|r| r.symbol.first())
            .ok_or_else(|| ReservationError::Qr("no symbol in decoder response".to_string()))?;

        if let Some(error) = symbol.error.as_deref().filter(|e| !e.is_empty()) {
            return Err(ReservationError::Qr(error.to_string()));
        }

        symbol
            .data
            .clone()
            .ok_or_else(|| ReservationError::Qr("empty QR code".to_string()))
    }
}

/// Pull a ticket code out of decoded QR data: strip the optional
/// `ticket_code:` prefix and insist on a UUID-shaped value.
#[must_use]
pub fn extract_ticket_code(qr_data: &str) -> Option<String> {
    let code = qr_data.strip_prefix("ticket_code:").unwrap_or(qr_data);
    is_uuid_shaped(code).then(|| code.to_ascii_lowercase())
}

/// 36 characters, hyphens at positions 8/13/18/23, hex everywhere else.
#[must_use]
pub fn is_uuid_shaped(s: &str) -> bool {
    if s.len() != 36 {
        return false;
    }
    s.bytes().enumerate().all(|(i, b)| match i {
        8 | 13 | 18 | 23 => b == b'-',
        _ => b.is_ascii_hexdigit(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CODE: &str = "550e8400-e29b-41d4-a716-446655440000";

    #[test]
    fn bare_uuid_is_accepted() {
        assert_eq!(extract_ticket_code(CODE).as_deref(), Some(CODE));
    }

    #[test]
    fn prefixed_code_is_stripped() {
        let data = format!("ticket_code:{CODE}");
        assert_eq!(extract_ticket_code(&data).as_deref(), Some(CODE));
    }

    #[test]
    fn uppercase_hex_is_normalized() {
        let data = CODE.to_ascii_uppercase();
        assert_eq!(extract_ticket_code(&data).as_deref(), Some(CODE));
    }

    #[test]
    fn wrong_length_is_rejected() {
        assert!(extract_ticket_code("abc").is_none());
        assert!(extract_ticket_code(&format!("{CODE}0")).is_none());
    }

    #[test]
    fn misplaced_hyphens_are_rejected() {
        // Hyphen at position 9 instead of 8.
        assert!(extract_ticket_code("550e84000-e29b41d4-a716-446655440000").is_none());
    }

    #[test]
    fn non_hex_characters_are_rejected() {
        assert!(extract_ticket_code("550e8400-e29b-41d4-a716-44665544000g").is_none());
    }
}
