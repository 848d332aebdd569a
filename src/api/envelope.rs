use serde::Serialize;

/// Success envelope wrapping every 2xx payload: `{"status": "OK", "data": ...}`.
///
/// Failures use the same outer shape with `"FAILED"` and an error object,
/// built by [`crate::error::AppError`].
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub status: &'static str,
    pub data: T,
}

impl<T: Serialize> Envelope<T> {
    pub fn ok(data: T) -> Self {
        Envelope { status: "OK", data }
    }
}
