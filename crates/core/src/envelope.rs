//! End-of-stream signalling on channels.

/// A channel message: either data or the end-of-stream marker.
///
/// The marker is a variant, not a value, so no item can be mistaken for it.
#[derive(Debug, PartialEq, Eq)]
pub enum Envelope<T> {
    Data(T),
    EndOfStream,
}

impl<T> Envelope<T> {
    pub fn is_end(&self) -> bool {
        matches!(self, Envelope::EndOfStream)
    }

    pub fn into_data(self) -> Option<T> {
        match self {
            Envelope::Data(value) => Some(value),
            Envelope::EndOfStream => None,
        }
    }
}

impl<T> From<T> for Envelope<T> {
    fn from(value: T) -> Self {
        Envelope::Data(value)
    }
}
