//! Client-to-authority events.
//!
//! An event frame is one varint tag followed by the body of that event kind,
//! with nothing after it.
//!
//! | tag | event             |
//! |-----|-------------------|
//! | 0   | `DOM_EVENT`       |
//! | 1   | `DOM_INPUT_EVENT` |
//! | 2   | `DOM_KEY_EVENT`   |
//! | 3   | `HISTORY_EVENT`   |
//! | 4   | `PING`            |

use std::fmt;

use bitflags::bitflags;
use bytes::Bytes;

use crate::{
    MAX_FRAME_SIZE, NodeId,
    errors::{ProtocolError, Result},
    wire::{Reader, Writer},
};

/// One notification from the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// Generic DOM event
    Dom(DomEvent),
    /// Event on a form control, carrying its current state
    DomInput(DomInputEvent),
    /// Keyboard event
    DomKey(DomKeyEvent),
    /// The client's history moved
    History {
        /// How the history moved
        action: HistoryAction,
        /// Path after the move
        path: String,
    },
    /// Latency probe
    Ping {
        /// Client-chosen nonce, echoed in the pong
        nonce: u64,
    },
}

/// Fields shared by every DOM-originated event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomEvent {
    /// Innermost tracked element the event fired on
    pub target: NodeId,
    /// Event name as requested by the authority's listener (e.g. `change`)
    pub name: String,
    /// The client held back the native default action pending a decision
    pub cancelable: bool,
    /// How the authority should route the event to callbacks
    pub propagation: Propagation,
}

/// Callback routing for a DOM event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Propagation {
    /// Only the target's callback runs
    NonBubbling,
    /// Callbacks run along the path, innermost first
    Bubbling {
        /// Tracked nodes with a listener for this event, innermost first
        composed_path: Vec<NodeId>,
    },
}

impl Propagation {
    /// Whether the event bubbles.
    pub fn bubbles(&self) -> bool {
        matches!(self, Self::Bubbling { .. })
    }
}

/// DOM event on an `input`, `textarea` or `select`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomInputEvent {
    /// Common fields
    pub event: DomEvent,
    /// Control value after the event
    pub value: String,
    /// Checked state after the event (false for non-checkables)
    pub checked: bool,
}

/// Keyboard DOM event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomKeyEvent {
    /// Common fields
    pub event: DomEvent,
    /// Key description
    pub key: KeyDetails,
}

bitflags! {
    /// Modifier keys held during a key event.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct KeyModifiers: u8 {
        /// Control
        const CTRL = 1;
        /// Shift
        const SHIFT = 1 << 1;
        /// Alt / Option
        const ALT = 1 << 2;
        /// Meta / Command
        const META = 1 << 3;
    }
}

/// Description of a keyboard event.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct KeyDetails {
    /// Produced key value, e.g. `Enter` or `a`
    pub key: String,
    /// Physical key code, e.g. `KeyA`
    pub code: String,
    /// Key location (standard, left, right, numpad)
    pub location: u32,
    /// Held modifiers
    pub modifiers: KeyModifiers,
    /// Auto-repeat
    pub repeat: bool,
}

impl KeyDetails {
    pub(crate) fn encode(&self, w: &mut Writer) {
        w.str(&self.key);
        w.str(&self.code);
        w.varint(u64::from(self.location));
        w.u8(self.modifiers.bits());
        w.bool(self.repeat);
    }

    pub(crate) fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let key = r.str("key")?;
        let code = r.str("code")?;
        let raw_location = r.varint("key location")?;
        let location = u32::try_from(raw_location).map_err(|_| {
            ProtocolError::InvalidDiscriminant { field: "key location", value: raw_location }
        })?;
        let raw_modifiers = r.u8("key modifiers")?;
        let modifiers = KeyModifiers::from_bits(raw_modifiers).ok_or(
            ProtocolError::InvalidDiscriminant {
                field: "key modifiers",
                value: u64::from(raw_modifiers),
            },
        )?;
        let repeat = r.bool("repeat")?;
        Ok(Self { key, code, location, modifiers, repeat })
    }
}

/// Direction of a client history change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum HistoryAction {
    /// New entry pushed
    Push = 0,
    /// Moved back or forward
    Pop = 1,
    /// Current entry replaced
    Replace = 2,
}

/// Discriminant of a [`ClientEvent`], carrying its wire tag and debug name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum EventKind {
    /// `DOM_EVENT`
    Dom = 0,
    /// `DOM_INPUT_EVENT`
    DomInput = 1,
    /// `DOM_KEY_EVENT`
    DomKey = 2,
    /// `HISTORY_EVENT`
    History = 3,
    /// `PING`
    Ping = 4,
}

impl EventKind {
    /// Wire tag.
    pub fn tag(self) -> u64 {
        self as u64
    }

    /// Kind for a wire tag.
    pub fn from_tag(tag: u64) -> Option<Self> {
        Some(match tag {
            0 => Self::Dom,
            1 => Self::DomInput,
            2 => Self::DomKey,
            3 => Self::History,
            4 => Self::Ping,
            _ => return None,
        })
    }

    /// Protocol debug name, e.g. `DOM_EVENT`.
    pub fn name(self) -> &'static str {
        match self {
            Self::Dom => "DOM_EVENT",
            Self::DomInput => "DOM_INPUT_EVENT",
            Self::DomKey => "DOM_KEY_EVENT",
            Self::History => "HISTORY_EVENT",
            Self::Ping => "PING",
        }
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl ClientEvent {
    /// Kind of this event.
    pub fn kind(&self) -> EventKind {
        match self {
            Self::Dom(_) => EventKind::Dom,
            Self::DomInput(_) => EventKind::DomInput,
            Self::DomKey(_) => EventKind::DomKey,
            Self::History { .. } => EventKind::History,
            Self::Ping { .. } => EventKind::Ping,
        }
    }

    /// Common DOM fields, for the three DOM-originated kinds.
    pub fn dom(&self) -> Option<&DomEvent> {
        match self {
            Self::Dom(event) => Some(event),
            Self::DomInput(input) => Some(&input.event),
            Self::DomKey(key) => Some(&key.event),
            Self::History { .. } | Self::Ping { .. } => None,
        }
    }
}

impl DomEvent {
    fn encode(&self, w: &mut Writer) {
        w.node(self.target);
        w.str(&self.name);
        w.bool(self.cancelable);
        match &self.propagation {
            Propagation::NonBubbling => w.bool(false),
            Propagation::Bubbling { composed_path } => {
                w.bool(true);
                w.varint(composed_path.len() as u64);
                for node in composed_path {
                    w.node(*node);
                }
            },
        }
    }

    fn decode(r: &mut Reader<'_>) -> Result<Self> {
        let target = r.node("target")?;
        let name = r.str("event name")?;
        let cancelable = r.bool("cancelable")?;
        let propagation = if r.bool("bubbles")? {
            let count = r.len("composed path length")?;
            let mut composed_path = Vec::with_capacity(count);
            for _ in 0..count {
                composed_path.push(r.node("composed path entry")?);
            }
            Propagation::Bubbling { composed_path }
        } else {
            Propagation::NonBubbling
        };
        Ok(Self { target, name, cancelable, propagation })
    }
}

/// Encode one event as a frame.
pub fn encode_event(event: &ClientEvent) -> Bytes {
    let mut w = Writer::new();
    w.varint(event.kind().tag());
    match event {
        ClientEvent::Dom(dom) => dom.encode(&mut w),
        ClientEvent::DomInput(input) => {
            input.event.encode(&mut w);
            w.str(&input.value);
            w.bool(input.checked);
        },
        ClientEvent::DomKey(key) => {
            key.event.encode(&mut w);
            key.key.encode(&mut w);
        },
        ClientEvent::History { action, path } => {
            w.u8(*action as u8);
            w.str(path);
        },
        ClientEvent::Ping { nonce } => w.varint(*nonce),
    }
    w.into_inner().freeze()
}

/// Decode an event frame.
pub fn decode_event(frame: &[u8]) -> Result<ClientEvent> {
    if frame.is_empty() {
        return Err(ProtocolError::EmptyEventFrame);
    }
    if frame.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge { size: frame.len(), max: MAX_FRAME_SIZE });
    }

    let mut r = Reader::new(frame);
    let tag = r.varint("event tag")?;
    let kind = EventKind::from_tag(tag).ok_or(ProtocolError::UnknownEventTag(tag))?;
    let event = match kind {
        EventKind::Dom => ClientEvent::Dom(DomEvent::decode(&mut r)?),
        EventKind::DomInput => ClientEvent::DomInput(DomInputEvent {
            event: DomEvent::decode(&mut r)?,
            value: r.str("input value")?,
            checked: r.bool("checked")?,
        }),
        EventKind::DomKey => ClientEvent::DomKey(DomKeyEvent {
            event: DomEvent::decode(&mut r)?,
            key: KeyDetails::decode(&mut r)?,
        }),
        EventKind::History => {
            let action = match r.u8("history action")? {
                0 => HistoryAction::Push,
                1 => HistoryAction::Pop,
                2 => HistoryAction::Replace,
                other => {
                    return Err(ProtocolError::InvalidDiscriminant {
                        field: "history action",
                        value: u64::from(other),
                    });
                },
            };
            ClientEvent::History { action, path: r.str("path")? }
        },
        EventKind::Ping => ClientEvent::Ping { nonce: r.varint("nonce")? },
    };
    r.finish()?;
    Ok(event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ping_is_tag_then_nonce() {
        let bytes = encode_event(&ClientEvent::Ping { nonce: 300 });
        assert_eq!(&bytes[..], &[4, 0xac, 0x02]);
    }

    #[test]
    fn unknown_event_tag_is_fatal() {
        assert_eq!(decode_event(&[9]), Err(ProtocolError::UnknownEventTag(9)));
    }

    #[test]
    fn empty_frame_rejected() {
        assert_eq!(decode_event(&[]), Err(ProtocolError::EmptyEventFrame));
    }

    #[test]
    fn trailing_bytes_after_event_rejected() {
        assert_eq!(decode_event(&[4, 1, 0]), Err(ProtocolError::TrailingBytes(1)));
    }

    #[test]
    fn unknown_modifier_bits_rejected() {
        let event = ClientEvent::DomKey(DomKeyEvent {
            event: DomEvent {
                target: NodeId(3),
                name: "keydown".into(),
                cancelable: false,
                propagation: Propagation::NonBubbling,
            },
            key: KeyDetails { key: "a".into(), code: "KeyA".into(), ..KeyDetails::default() },
        });
        let mut bytes = encode_event(&event).to_vec();
        // modifiers byte sits just before the trailing repeat flag
        let idx = bytes.len() - 2;
        bytes[idx] = 0xf0;
        assert!(matches!(
            decode_event(&bytes),
            Err(ProtocolError::InvalidDiscriminant { field: "key modifiers", .. })
        ));
    }

    #[test]
    fn dom_accessor() {
        let ping = ClientEvent::Ping { nonce: 1 };
        assert!(ping.dom().is_none());
        assert_eq!(ping.kind().to_string(), "PING");
    }
}
