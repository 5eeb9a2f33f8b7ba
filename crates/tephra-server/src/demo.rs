//! Demo component served by the binary.
//!
//! A click counter whose count survives reconnects, with the count mirrored
//! into the document title and the current location shown under it.

use std::sync::{
    Arc,
    atomic::{AtomicI64, Ordering},
};

use tephra_core::{Handler, Props, Renderer, Session, StateError, StateSlots, TreeError};
use tephra_proto::{AttrValue, Attrs, HeadElementId, NodeId};

#[derive(Debug, Clone, Copy)]
struct Mounted {
    label: NodeId,
    location: NodeId,
    title: HeadElementId,
}

/// Click counter.
#[derive(Debug, Default)]
pub struct Counter {
    count: Arc<AtomicI64>,
    rendered: i64,
    rendered_location: String,
    mounted: Option<Mounted>,
}

impl Counter {
    /// Counter starting at zero, or at the restored value on resume.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current count.
    pub fn count(&self) -> i64 {
        self.count.load(Ordering::SeqCst)
    }
}

fn title_attrs(count: i64) -> Attrs {
    Attrs::from([("children".to_owned(), AttrValue::String(format!("Clicked {count} times")))])
}

impl Renderer for Counter {
    fn mount(&mut self, tree: &mut Session, restored: &mut StateSlots) -> Result<(), TreeError> {
        let count = restored.restore(0_i64);
        self.count.store(count, Ordering::SeqCst);
        self.rendered = count;
        self.rendered_location = tree.location().to_owned();

        let title = tree.append_head("title", title_attrs(count))?;

        let main = tree.create_element("main")?;
        tree.append_child(NodeId::ROOT, main)?;
        tree.set_initial_props(main, Props::from([("className".to_owned(), "counter".into())]))?;

        let clicks = Arc::clone(&self.count);
        let button = tree.create_element("button")?;
        tree.append_child(main, button)?;
        tree.set_initial_props(
            button,
            Props::from([
                ("type".to_owned(), "button".into()),
                (
                    "onClick".to_owned(),
                    Handler::new(move |_| {
                        clicks.fetch_add(1, Ordering::SeqCst);
                    })
                    .into(),
                ),
            ]),
        )?;
        let label = tree.create_text(&count.to_string())?;
        tree.append_child(button, label)?;

        let footer = tree.create_element("p")?;
        tree.append_child(main, footer)?;
        let path = tree.location().to_owned();
        let location = tree.create_text(&path)?;
        tree.append_child(footer, location)?;

        self.mounted = Some(Mounted { label, location, title });
        Ok(())
    }

    fn update(&mut self, tree: &mut Session) -> Result<(), TreeError> {
        let Some(mounted) = self.mounted else {
            return Ok(());
        };

        let count = self.count();
        if count != self.rendered {
            tree.update_text(mounted.label, &count.to_string())?;
            tree.update_head(mounted.title, "title", title_attrs(count))?;
            self.rendered = count;
        }

        if tree.location() != self.rendered_location {
            let location = tree.location().to_owned();
            tree.update_text(mounted.location, &location)?;
            self.rendered_location = location;
        }
        Ok(())
    }

    fn snapshot(&self, slots: &mut StateSlots) -> Result<(), StateError> {
        slots.push(&self.count())
    }

    fn unmount(&mut self, _tree: &mut Session) {
        self.mounted = None;
    }
}

#[cfg(test)]
mod tests {
    use std::time::Instant;

    use tephra_core::{SessionAction, SessionConfig, SessionToken};
    use tephra_proto::{Mutation, decode_mutations};

    use super::*;

    fn mutations(session: &mut Session) -> Vec<Mutation> {
        session
            .take_actions()
            .into_iter()
            .filter_map(|action| match action {
                SessionAction::SendFrame(frame) => Some(decode_mutations(&frame).unwrap()),
                SessionAction::Close { .. } => None,
            })
            .flatten()
            .collect()
    }

    #[test]
    fn mount_restores_count_and_titles_page() {
        let mut slots = StateSlots::new();
        slots.push(&4_i64).unwrap();
        let snapshot = slots.to_snapshot().unwrap();

        let mut session =
            Session::new(SessionToken::from("t"), "/docs", SessionConfig::default(), Instant::now());
        let mut counter = Counter::new();
        session.start(&mut counter, Some(&snapshot)).unwrap();
        assert_eq!(counter.count(), 4);

        let sent = mutations(&mut session);
        assert!(sent.iter().any(|m| matches!(
            m,
            Mutation::AppendOrUpdateHead { tag, attrs, .. }
                if tag == "title" && attrs["children"] == AttrValue::String("Clicked 4 times".into())
        )));
        assert!(sent.iter().any(|m| matches!(m, Mutation::CreateText { text, .. } if text == "/docs")));
    }

    #[test]
    fn snapshot_carries_count() {
        let mut session =
            Session::new(SessionToken::from("t"), "/", SessionConfig::default(), Instant::now());
        let mut counter = Counter::new();
        session.start(&mut counter, None).unwrap();
        counter.count.store(9, Ordering::SeqCst);

        let snapshot = session.snapshot(&counter).unwrap();
        assert_eq!(StateSlots::from_snapshot(&snapshot).unwrap().restore(0_i64), 9);
    }
}
