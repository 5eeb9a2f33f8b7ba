//! Authority-to-client mutations.
//!
//! A flushed batch is encoded as consecutive `tag · len · body` records. The
//! tag values are part of the protocol and must never be renumbered.
//!
//! | tag | mutation               |
//! |-----|------------------------|
//! | 0   | `SET_SESSION_TOKEN`    |
//! | 1   | `CREATE_ELEMENT`       |
//! | 2   | `CREATE_TEXT`          |
//! | 3   | `UPDATE_TEXT`          |
//! | 4   | `APPEND_CHILD`         |
//! | 5   | `REMOVE_CHILD`         |
//! | 6   | `INSERT_BEFORE`        |
//! | 7   | `SET_INITIAL_ATTRS`    |
//! | 8   | `UPDATE_ATTRS`         |
//! | 9   | `SCROLL_INTO_VIEW`     |
//! | 10  | `DISPATCH_EVENT`       |
//! | 11  | `DISPATCH_KEY_EVENT`   |
//! | 12  | `PONG`                 |
//! | 13  | `APPEND_OR_UPDATE_HEAD`|
//! | 14  | `DELETE_HEAD`          |
//! | 15  | `HISTORY`              |

use std::{collections::BTreeMap, fmt};

use bytes::Bytes;

use crate::{
    Attrs, HeadElementId, MAX_FRAME_SIZE, NodeId,
    errors::{ProtocolError, Result},
    event::KeyDetails,
    wire::{Reader, Writer},
};

/// Attributes removed by an `UpdateAttrs`. The flag is `true` when the removed
/// attribute was a callback marker, telling the client to uninstall the
/// listener instead of deleting an attribute.
pub type RemovedAttrs = BTreeMap<String, bool>;

/// One instruction from the authority to the client.
#[derive(Debug, Clone, PartialEq)]
pub enum Mutation {
    /// Start of a (possibly resumed) session. The client resets all state and
    /// persists the token for reconnects.
    SetSessionToken {
        /// Resume token
        token: String,
    },

    /// Create a detached element
    CreateElement {
        /// Id of the new node
        node: NodeId,
        /// Element tag name
        tag: String,
    },

    /// Create a detached text node
    CreateText {
        /// Id of the new node
        node: NodeId,
        /// Initial text
        text: String,
    },

    /// Replace the contents of a text node
    UpdateText {
        /// Text node
        node: NodeId,
        /// New text
        text: String,
    },

    /// Append `child` as the last child of `parent`
    AppendChild {
        /// Parent node
        parent: NodeId,
        /// Child node
        child: NodeId,
    },

    /// Detach `child` from `parent` and discard it with its subtree
    RemoveChild {
        /// Parent node
        parent: NodeId,
        /// Child node
        child: NodeId,
    },

    /// Insert `child` under `parent` immediately before `before`
    InsertBefore {
        /// Parent node
        parent: NodeId,
        /// Child to insert
        child: NodeId,
        /// Existing child of `parent`
        before: NodeId,
    },

    /// First attribute set of a freshly created element
    SetInitialAttrs {
        /// Element
        node: NodeId,
        /// Attributes
        attrs: Attrs,
    },

    /// Attribute delta for an existing element
    UpdateAttrs {
        /// Element
        node: NodeId,
        /// Attributes added or changed
        update: Attrs,
        /// Attributes removed
        remove: RemovedAttrs,
    },

    /// Scroll an element into the viewport
    ScrollIntoView {
        /// Element
        target: NodeId,
        /// Alignment options
        options: ScrollOptions,
    },

    /// Fire a named action on an element
    DispatchEvent {
        /// Element
        target: NodeId,
        /// One of `click`, `focus`, `blur`, `submit`
        name: String,
        /// Run the native default action without forwarding the event back
        perform_default: bool,
    },

    /// Fire a synthetic keyboard event on an element
    DispatchKeyEvent {
        /// Element
        target: NodeId,
        /// `keydown`, `keyup` or `keypress`
        name: String,
        /// Key description
        key: KeyDetails,
    },

    /// Reply to a client ping
    Pong {
        /// Nonce echoed from the ping
        nonce: u64,
    },

    /// Create or replace an element in the document head
    AppendOrUpdateHead {
        /// Head element
        element: HeadElementId,
        /// Element tag name
        tag: String,
        /// Attributes; a string `children` entry is the text content
        attrs: Attrs,
    },

    /// Remove an element from the document head
    DeleteHead {
        /// Head element
        element: HeadElementId,
    },

    /// Drive the client's navigation history
    History(HistoryMethod),
}

/// Discriminant of a [`Mutation`], carrying its wire tag and debug name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum MutationKind {
    /// `SET_SESSION_TOKEN`
    SetSessionToken = 0,
    /// `CREATE_ELEMENT`
    CreateElement = 1,
    /// `CREATE_TEXT`
    CreateText = 2,
    /// `UPDATE_TEXT`
    UpdateText = 3,
    /// `APPEND_CHILD`
    AppendChild = 4,
    /// `REMOVE_CHILD`
    RemoveChild = 5,
    /// `INSERT_BEFORE`
    InsertBefore = 6,
    /// `SET_INITIAL_ATTRS`
    SetInitialAttrs = 7,
    /// `UPDATE_ATTRS`
    UpdateAttrs = 8,
    /// `SCROLL_INTO_VIEW`
    ScrollIntoView = 9,
    /// `DISPATCH_EVENT`
    DispatchEvent = 10,
    /// `DISPATCH_KEY_EVENT`
    DispatchKeyEvent = 11,
    /// `PONG`
    Pong = 12,
    /// `APPEND_OR_UPDATE_HEAD`
    AppendOrUpdateHead = 13,
    /// `DELETE_HEAD`
    DeleteHead = 14,
    /// `HISTORY`
    History = 15,
}

impl MutationKind {
    /// Wire tag.
    pub fn tag(self) -> u64 {
        self as u64
    }

    /// Kind for a wire tag.
    pub fn from_tag(tag: u64) -> Option<Self> {
        Some(match tag {
            0 => Self::SetSessionToken,
            1 => Self::CreateElement,
            2 => Self::CreateText,
            3 => Self::UpdateText,
            4 => Self::AppendChild,
            5 => Self::RemoveChild,
            6 => Self::InsertBefore,
            7 => Self::SetInitialAttrs,
            8 => Self::UpdateAttrs,
            9 => Self::ScrollIntoView,
            10 => Self::DispatchEvent,
            11 => Self::DispatchKeyEvent,
            12 => Self::Pong,
            13 => Self::AppendOrUpdateHead,
            14 => Self::DeleteHead,
            15 => Self::History,
            _ => return None,
        })
    }

    /// Protocol debug name, e.g. `CREATE_ELEMENT`.
    pub fn name(self) -> &'static str {
        match self {
            Self::SetSessionToken => "SET_SESSION_TOKEN",
            Self::CreateElement => "CREATE_ELEMENT",
            Self::CreateText => "CREATE_TEXT",
            Self::UpdateText => "UPDATE_TEXT",
            Self::AppendChild => "APPEND_CHILD",
            Self::RemoveChild => "REMOVE_CHILD",
            Self::InsertBefore => "INSERT_BEFORE",
            Self::SetInitialAttrs => "SET_INITIAL_ATTRS",
            Self::UpdateAttrs => "UPDATE_ATTRS",
            Self::ScrollIntoView => "SCROLL_INTO_VIEW",
            Self::DispatchEvent => "DISPATCH_EVENT",
            Self::DispatchKeyEvent => "DISPATCH_KEY_EVENT",
            Self::Pong => "PONG",
            Self::AppendOrUpdateHead => "APPEND_OR_UPDATE_HEAD",
            Self::DeleteHead => "DELETE_HEAD",
            Self::History => "HISTORY",
        }
    }
}

impl fmt::Display for MutationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Vertical or horizontal alignment for [`Mutation::ScrollIntoView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ScrollAlignment {
    /// Align to the start edge
    #[default]
    Start = 0,
    /// Center in the viewport
    Center = 1,
    /// Align to the end edge
    End = 2,
    /// Scroll as little as possible
    Nearest = 3,
}

impl ScrollAlignment {
    fn from_u8(raw: u8) -> Result<Self> {
        Ok(match raw {
            0 => Self::Start,
            1 => Self::Center,
            2 => Self::End,
            3 => Self::Nearest,
            _ => {
                return Err(ProtocolError::InvalidDiscriminant {
                    field: "scroll alignment",
                    value: u64::from(raw),
                });
            },
        })
    }
}

/// Scroll animation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[repr(u8)]
pub enum ScrollBehavior {
    /// Platform default
    #[default]
    Auto = 0,
    /// Animated scroll
    Smooth = 1,
}

/// Options for [`Mutation::ScrollIntoView`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ScrollOptions {
    /// Vertical alignment
    pub block: ScrollAlignment,
    /// Horizontal alignment
    pub inline: ScrollAlignment,
    /// Animation
    pub behavior: ScrollBehavior,
}

/// The boolean shorthand: `true` aligns to the top, `false` to the bottom.
impl From<bool> for ScrollOptions {
    fn from(align_to_top: bool) -> Self {
        Self {
            block: if align_to_top { ScrollAlignment::Start } else { ScrollAlignment::End },
            inline: ScrollAlignment::Nearest,
            behavior: ScrollBehavior::Auto,
        }
    }
}

/// Navigation requested by the authority.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HistoryMethod {
    /// Push a new entry
    Push(String),
    /// Replace the current entry
    Replace(String),
    /// Move through the stack by a relative offset
    Go(i64),
}

impl Mutation {
    /// Kind of this mutation.
    pub fn kind(&self) -> MutationKind {
        match self {
            Self::SetSessionToken { .. } => MutationKind::SetSessionToken,
            Self::CreateElement { .. } => MutationKind::CreateElement,
            Self::CreateText { .. } => MutationKind::CreateText,
            Self::UpdateText { .. } => MutationKind::UpdateText,
            Self::AppendChild { .. } => MutationKind::AppendChild,
            Self::RemoveChild { .. } => MutationKind::RemoveChild,
            Self::InsertBefore { .. } => MutationKind::InsertBefore,
            Self::SetInitialAttrs { .. } => MutationKind::SetInitialAttrs,
            Self::UpdateAttrs { .. } => MutationKind::UpdateAttrs,
            Self::ScrollIntoView { .. } => MutationKind::ScrollIntoView,
            Self::DispatchEvent { .. } => MutationKind::DispatchEvent,
            Self::DispatchKeyEvent { .. } => MutationKind::DispatchKeyEvent,
            Self::Pong { .. } => MutationKind::Pong,
            Self::AppendOrUpdateHead { .. } => MutationKind::AppendOrUpdateHead,
            Self::DeleteHead { .. } => MutationKind::DeleteHead,
            Self::History(_) => MutationKind::History,
        }
    }

    /// Every node id this mutation refers to, including the ones it creates.
    pub fn node_refs(&self) -> Vec<NodeId> {
        match self {
            Self::CreateElement { node, .. }
            | Self::CreateText { node, .. }
            | Self::UpdateText { node, .. }
            | Self::SetInitialAttrs { node, .. }
            | Self::UpdateAttrs { node, .. } => vec![*node],
            Self::AppendChild { parent, child } | Self::RemoveChild { parent, child } => {
                vec![*parent, *child]
            },
            Self::InsertBefore { parent, child, before } => vec![*parent, *child, *before],
            Self::ScrollIntoView { target, .. }
            | Self::DispatchEvent { target, .. }
            | Self::DispatchKeyEvent { target, .. } => vec![*target],
            Self::SetSessionToken { .. }
            | Self::Pong { .. }
            | Self::AppendOrUpdateHead { .. }
            | Self::DeleteHead { .. }
            | Self::History(_) => Vec::new(),
        }
    }

    fn encode_body(&self, w: &mut Writer) {
        match self {
            Self::SetSessionToken { token } => w.str(token),
            Self::CreateElement { node, tag } => {
                w.node(*node);
                w.str(tag);
            },
            Self::CreateText { node, text } | Self::UpdateText { node, text } => {
                w.node(*node);
                w.str(text);
            },
            Self::AppendChild { parent, child } | Self::RemoveChild { parent, child } => {
                w.node(*parent);
                w.node(*child);
            },
            Self::InsertBefore { parent, child, before } => {
                w.node(*parent);
                w.node(*child);
                w.node(*before);
            },
            Self::SetInitialAttrs { node, attrs } => {
                w.node(*node);
                w.attrs(attrs);
            },
            Self::UpdateAttrs { node, update, remove } => {
                w.node(*node);
                w.attrs(update);
                w.varint(remove.len() as u64);
                for (name, was_callback) in remove {
                    w.str(name);
                    w.bool(*was_callback);
                }
            },
            Self::ScrollIntoView { target, options } => {
                w.node(*target);
                w.u8(options.block as u8);
                w.u8(options.inline as u8);
                w.u8(options.behavior as u8);
            },
            Self::DispatchEvent { target, name, perform_default } => {
                w.node(*target);
                w.str(name);
                w.bool(*perform_default);
            },
            Self::DispatchKeyEvent { target, name, key } => {
                w.node(*target);
                w.str(name);
                key.encode(w);
            },
            Self::Pong { nonce } => w.varint(*nonce),
            Self::AppendOrUpdateHead { element, tag, attrs } => {
                w.varint(element.0);
                w.str(tag);
                w.attrs(attrs);
            },
            Self::DeleteHead { element } => w.varint(element.0),
            Self::History(method) => match method {
                HistoryMethod::Push(path) => {
                    w.u8(0);
                    w.str(path);
                },
                HistoryMethod::Replace(path) => {
                    w.u8(1);
                    w.str(path);
                },
                HistoryMethod::Go(delta) => {
                    w.u8(2);
                    w.zigzag(*delta);
                },
            },
        }
    }

    fn decode_body(kind: MutationKind, r: &mut Reader<'_>) -> Result<Self> {
        Ok(match kind {
            MutationKind::SetSessionToken => Self::SetSessionToken { token: r.str("token")? },
            MutationKind::CreateElement => {
                Self::CreateElement { node: r.node("node")?, tag: r.str("tag")? }
            },
            MutationKind::CreateText => Self::CreateText { node: r.node("node")?, text: r.str("text")? },
            MutationKind::UpdateText => Self::UpdateText { node: r.node("node")?, text: r.str("text")? },
            MutationKind::AppendChild => {
                Self::AppendChild { parent: r.node("parent")?, child: r.node("child")? }
            },
            MutationKind::RemoveChild => {
                Self::RemoveChild { parent: r.node("parent")?, child: r.node("child")? }
            },
            MutationKind::InsertBefore => Self::InsertBefore {
                parent: r.node("parent")?,
                child: r.node("child")?,
                before: r.node("before")?,
            },
            MutationKind::SetInitialAttrs => {
                Self::SetInitialAttrs { node: r.node("node")?, attrs: r.attrs()? }
            },
            MutationKind::UpdateAttrs => {
                let node = r.node("node")?;
                let update = r.attrs()?;
                let count = r.len("removed attribute count")?;
                let mut remove = RemovedAttrs::new();
                for _ in 0..count {
                    let name = r.str("removed attribute name")?;
                    remove.insert(name, r.bool("removed attribute flag")?);
                }
                Self::UpdateAttrs { node, update, remove }
            },
            MutationKind::ScrollIntoView => {
                let target = r.node("target")?;
                let block = ScrollAlignment::from_u8(r.u8("block")?)?;
                let inline = ScrollAlignment::from_u8(r.u8("inline")?)?;
                let behavior = match r.u8("behavior")? {
                    0 => ScrollBehavior::Auto,
                    1 => ScrollBehavior::Smooth,
                    other => {
                        return Err(ProtocolError::InvalidDiscriminant {
                            field: "scroll behavior",
                            value: u64::from(other),
                        });
                    },
                };
                Self::ScrollIntoView { target, options: ScrollOptions { block, inline, behavior } }
            },
            MutationKind::DispatchEvent => Self::DispatchEvent {
                target: r.node("target")?,
                name: r.str("event name")?,
                perform_default: r.bool("perform default")?,
            },
            MutationKind::DispatchKeyEvent => Self::DispatchKeyEvent {
                target: r.node("target")?,
                name: r.str("event name")?,
                key: KeyDetails::decode(r)?,
            },
            MutationKind::Pong => Self::Pong { nonce: r.varint("nonce")? },
            MutationKind::AppendOrUpdateHead => Self::AppendOrUpdateHead {
                element: HeadElementId(r.varint("head element")?),
                tag: r.str("tag")?,
                attrs: r.attrs()?,
            },
            MutationKind::DeleteHead => {
                Self::DeleteHead { element: HeadElementId(r.varint("head element")?) }
            },
            MutationKind::History => Self::History(match r.u8("history method")? {
                0 => HistoryMethod::Push(r.str("path")?),
                1 => HistoryMethod::Replace(r.str("path")?),
                2 => HistoryMethod::Go(r.zigzag("delta")?),
                other => {
                    return Err(ProtocolError::InvalidDiscriminant {
                        field: "history method",
                        value: u64::from(other),
                    });
                },
            }),
        })
    }
}

/// Encode a batch of mutations as one frame.
pub fn encode_mutations(batch: &[Mutation]) -> Bytes {
    let mut frame = Writer::new();
    for mutation in batch {
        let mut body = Writer::new();
        mutation.encode_body(&mut body);
        frame.record(mutation.kind().tag(), &body);
    }
    frame.into_inner().freeze()
}

/// Decode a mutation frame into its records, in order.
///
/// # Errors
///
/// Any malformed record fails the whole frame; nothing is returned for the
/// records that preceded it.
pub fn decode_mutations(frame: &[u8]) -> Result<Vec<Mutation>> {
    if frame.len() > MAX_FRAME_SIZE {
        return Err(ProtocolError::FrameTooLarge { size: frame.len(), max: MAX_FRAME_SIZE });
    }

    let mut r = Reader::new(frame);
    let mut out = Vec::new();
    while !r.is_empty() {
        let tag = r.varint("mutation tag")?;
        let kind = MutationKind::from_tag(tag).ok_or(ProtocolError::UnknownMutationTag(tag))?;
        let mut body = r.body()?;
        out.push(Mutation::decode_body(kind, &mut body)?);
        body.finish()?;
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::AttrValue;

    #[test]
    fn tags_are_stable() {
        assert_eq!(MutationKind::SetSessionToken.tag(), 0);
        assert_eq!(MutationKind::DispatchEvent.tag(), 10);
        assert_eq!(MutationKind::History.tag(), 15);
        for tag in 0..16 {
            assert_eq!(MutationKind::from_tag(tag).map(MutationKind::tag), Some(tag));
        }
        assert_eq!(MutationKind::from_tag(16), None);
    }

    #[test]
    fn unknown_tag_is_fatal() {
        assert_eq!(decode_mutations(&[16, 0]), Err(ProtocolError::UnknownMutationTag(16)));
    }

    #[test]
    fn trailing_bytes_inside_record_rejected() {
        // Pong with a two byte body whose nonce only uses one byte
        assert_eq!(decode_mutations(&[12, 2, 7, 0]), Err(ProtocolError::TrailingBytes(1)));
    }

    #[test]
    fn empty_frame_decodes_to_nothing() {
        assert_eq!(decode_mutations(&[]), Ok(Vec::new()));
    }

    #[test]
    fn batch_preserves_order() {
        let batch = vec![
            Mutation::CreateElement { node: NodeId(1), tag: "div".into() },
            Mutation::AppendChild { parent: NodeId::ROOT, child: NodeId(1) },
            Mutation::SetInitialAttrs {
                node: NodeId(1),
                attrs: Attrs::from([("click".into(), AttrValue::Callback)]),
            },
            Mutation::History(HistoryMethod::Go(-2)),
        ];
        assert_eq!(decode_mutations(&encode_mutations(&batch)), Ok(batch));
    }

    #[test]
    fn scroll_shorthand() {
        let top = ScrollOptions::from(true);
        assert_eq!(top.block, ScrollAlignment::Start);
        assert_eq!(top.inline, ScrollAlignment::Nearest);
        assert_eq!(ScrollOptions::from(false).block, ScrollAlignment::End);
    }

    #[test]
    fn node_refs_cover_structure() {
        let m = Mutation::InsertBefore { parent: NodeId(1), child: NodeId(2), before: NodeId(3) };
        assert_eq!(m.node_refs(), vec![NodeId(1), NodeId(2), NodeId(3)]);
        assert!(Mutation::Pong { nonce: 1 }.node_refs().is_empty());
    }
}
