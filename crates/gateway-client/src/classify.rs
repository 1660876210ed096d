//! Classification of raw transport failures.

use gateway_core::{GatewayError, TransportError};

/// Map a transport failure onto the error taxonomy
///
/// The provider id is attached to API errors so callers can tell which
/// backend refused the call.
pub fn classify(error: TransportError, provider_id: &str) -> GatewayError {
    match error {
        TransportError::Timeout(after) => {
            GatewayError::timeout(after, format!("no response within {}ms", after.as_millis()))
        }
        TransportError::Connect(message) => GatewayError::network(message),
        TransportError::Status {
            status,
            message,
            retry_after,
        } => GatewayError::api(status, message, retry_after).with_provider(provider_id),
        TransportError::Decode { status, message } => {
            GatewayError::api(status, format!("undecodable response: {message}"), None)
                .with_provider(provider_id)
        }
    }
}
