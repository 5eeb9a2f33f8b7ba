//! Resumable render state.
//!
//! When a connection goes away the session keeps only what the rendering
//! collaborator chooses to put into [`StateSlots`]: an ordered list of
//! serializable values, written depth-first (node, then children, then
//! siblings). A resumed session hands the same list back to
//! [`Renderer::mount`](crate::render::Renderer::mount), which consumes it in
//! the same order.
//!
//! A slot that is missing or no longer decodes as the requested type falls
//! back to the caller's initial value. A snapshot taken by an older build of
//! the component tree therefore degrades to a partial cold start instead of
//! failing the resume.
//!
//! Snapshots are a CBOR array of the slot values.

use std::collections::VecDeque;

use bytes::Bytes;
use ciborium::Value;
use serde::{Serialize, de::DeserializeOwned};
use tracing::warn;

use crate::error::StateError;

/// Ordered state slots for one render tree.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StateSlots {
    slots: VecDeque<Value>,
}

impl StateSlots {
    /// No slots; every restore falls back to its initial value.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a slot.
    ///
    /// # Errors
    ///
    /// `StateError::Encode` if `value` cannot be represented as CBOR.
    pub fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), StateError> {
        let value = Value::serialized(value).map_err(|e| StateError::Encode(e.to_string()))?;
        self.slots.push_back(value);
        Ok(())
    }

    /// Take the next slot as a `T`, or `initial` if there is none or it does
    /// not decode.
    pub fn restore<T: DeserializeOwned>(&mut self, initial: T) -> T {
        let Some(value) = self.slots.pop_front() else {
            return initial;
        };
        match value.deserialized() {
            Ok(restored) => restored,
            Err(error) => {
                warn!(%error, "state slot did not decode, using initial value");
                initial
            },
        }
    }

    /// Slots not yet consumed.
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Whether every slot has been consumed.
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Encode the remaining slots.
    ///
    /// # Errors
    ///
    /// `StateError::Encode` if CBOR serialization fails.
    pub fn to_snapshot(&self) -> Result<StateSnapshot, StateError> {
        let array = Value::Array(self.slots.iter().cloned().collect());
        let mut buf = Vec::new();
        ciborium::into_writer(&array, &mut buf).map_err(|e| StateError::Encode(e.to_string()))?;
        Ok(StateSnapshot(Bytes::from(buf)))
    }

    /// Decode a snapshot.
    ///
    /// # Errors
    ///
    /// `StateError::Decode` if the bytes are not a CBOR array.
    pub fn from_snapshot(snapshot: &StateSnapshot) -> Result<Self, StateError> {
        let value: Value = ciborium::from_reader(snapshot.as_bytes())
            .map_err(|e| StateError::Decode(e.to_string()))?;
        match value {
            Value::Array(items) => Ok(Self { slots: items.into() }),
            _ => Err(StateError::Decode("snapshot is not an array".into())),
        }
    }
}

/// Serialized [`StateSlots`], kept by the continuity registry between
/// connections.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct StateSnapshot(Bytes);

impl StateSnapshot {
    /// Raw CBOR bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Encoded size.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the snapshot has no bytes at all.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    #[derive(Debug, Serialize, Deserialize, PartialEq)]
    struct Form {
        name: String,
        agreed: bool,
    }

    #[test]
    fn slots_restore_in_write_order() {
        let mut slots = StateSlots::new();
        slots.push(&3_i64).unwrap();
        slots.push(&Form { name: "ada".into(), agreed: true }).unwrap();

        let mut restored = StateSlots::from_snapshot(&slots.to_snapshot().unwrap()).unwrap();
        assert_eq!(restored.restore(0_i64), 3);
        assert_eq!(
            restored.restore(Form { name: String::new(), agreed: false }),
            Form { name: "ada".into(), agreed: true }
        );
        assert!(restored.is_empty());
    }

    #[test]
    fn missing_or_mismatched_slots_fall_back() {
        let mut slots = StateSlots::new();
        slots.push("not a number").unwrap();

        assert_eq!(slots.restore(7_i64), 7);
        assert_eq!(slots.restore(String::from("initial")), "initial");
    }

    #[test]
    fn garbage_snapshot_rejected() {
        let bad = StateSnapshot(Bytes::from_static(&[0xff, 0x00]));
        assert!(matches!(StateSlots::from_snapshot(&bad), Err(StateError::Decode(_))));

        let not_array = {
            let mut buf = Vec::new();
            ciborium::into_writer(&5_u8, &mut buf).unwrap();
            StateSnapshot(Bytes::from(buf))
        };
        assert!(StateSlots::from_snapshot(&not_array).is_err());
    }
}
