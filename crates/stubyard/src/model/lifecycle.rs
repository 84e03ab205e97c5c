//! Lifecycle records and response rotation state.

use super::request::StubRequest;
use super::response::StubResponse;
use serde::ser::SerializeSeq;
use serde::{Serialize, Serializer};
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

/// Lock-free rotation cursor for a response sequence.
///
/// Every call to [`ResponseCursor::advance`] claims exactly one slot, so
/// concurrent callers never observe the same index twice within one cycle.
#[derive(Default)]
pub struct ResponseCursor(AtomicU64);

impl ResponseCursor {
    #[must_use]
    pub const fn new() -> Self {
        Self(AtomicU64::new(0))
    }

    /// Claim the next index, wrapping after `len`.
    #[must_use]
    pub fn advance(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        let claimed = self.0.fetch_add(1, Ordering::Relaxed);
        (claimed % len as u64) as usize
    }

    /// Index the next call to `advance` would return, without claiming it.
    #[must_use]
    pub fn peek(&self, len: usize) -> usize {
        if len == 0 {
            return 0;
        }
        (self.0.load(Ordering::Relaxed) % len as u64) as usize
    }
}

impl fmt::Debug for ResponseCursor {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("ResponseCursor")
            .field(&self.0.load(Ordering::Relaxed))
            .finish()
    }
}

/// Responses configured for one stub.
#[derive(Debug)]
pub enum StubResponses {
    Single(StubResponse),
    /// Served in round-robin order; never empty.
    Sequence {
        responses: Vec<StubResponse>,
        cursor: ResponseCursor,
    },
}

impl StubResponses {
    pub(crate) fn sequence(responses: Vec<StubResponse>) -> Self {
        StubResponses::Sequence {
            responses,
            cursor: ResponseCursor::new(),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            StubResponses::Single(_) => 1,
            StubResponses::Sequence { responses, .. } => responses.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, index: usize) -> Option<&StubResponse> {
        match self {
            StubResponses::Single(response) => (index == 0).then_some(response),
            StubResponses::Sequence { responses, .. } => responses.get(index),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &StubResponse> {
        let slice: &[StubResponse] = match self {
            StubResponses::Single(response) => std::slice::from_ref(response),
            StubResponses::Sequence { responses, .. } => responses,
        };
        slice.iter()
    }

    /// Pick the response for one match, advancing the rotation if any.
    pub fn next(&self) -> (usize, &StubResponse) {
        match self {
            StubResponses::Single(response) => (0, response),
            StubResponses::Sequence { responses, cursor } => {
                let index = cursor.advance(responses.len());
                (index, &responses[index])
            }
        }
    }
}

impl Serialize for StubResponses {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut seq = serializer.serialize_seq(Some(self.len()))?;
        for response in self.iter() {
            seq.serialize_element(response)?;
        }
        seq.end()
    }
}

/// One configured stub: a request pattern and its response(s).
///
/// Created by the loader from one configuration block and never modified
/// afterwards, apart from the rotation cursor of a sequence.
#[derive(Debug, Serialize)]
pub struct StubLifecycle {
    pub(crate) id: usize,
    pub(crate) request: StubRequest,
    pub(crate) responses: StubResponses,
}

impl StubLifecycle {
    /// Zero-based position in the configuration document.
    pub fn id(&self) -> usize {
        self.id
    }

    pub fn request(&self) -> &StubRequest {
        &self.request
    }

    pub fn responses(&self) -> &StubResponses {
        &self.responses
    }

    pub fn is_sequence(&self) -> bool {
        matches!(self.responses, StubResponses::Sequence { .. })
    }
}
