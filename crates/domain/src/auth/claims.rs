//! Unverified JWT claim inspection.
//!
//! The client never verifies signatures; it only reads the `exp` claim to
//! decide locally whether an access token is worth sending.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Returns the `exp` claim (epoch seconds) of a JWT, if the token is one.
///
/// Tokens that are not three dot-separated segments, whose payload is not
/// base64url JSON, or that carry no numeric `exp` yield `None`.
#[must_use]
pub fn jwt_expiry(token: &str) -> Option<i64> {
    let mut segments = token.split('.');
    let (_header, payload, _signature) = (segments.next()?, segments.next()?, segments.next()?);
    if segments.next().is_some() {
        return None;
    }

    let bytes = URL_SAFE_NO_PAD
        .decode(payload.trim_end_matches('='))
        .ok()?;
    let claims: serde_json::Value = serde_json::from_slice(&bytes).ok()?;
    let exp = claims.get("exp")?;

    #[allow(clippy::cast_possible_truncation)]
    exp.as_i64().or_else(|| exp.as_f64().map(|secs| secs as i64))
}
