//! Scenario tests
//!
//! End-to-end behaviour of one authority session and one client over the
//! loopback world: the deferred default round trip, bubbling with
//! stop-propagation, debounced value echoes and navigation.

use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use tephra_client::ClientAction;
use tephra_core::{Handler, Props, Renderer, Session, StateError, StateSlots, TreeError};
use tephra_harness::{Scenario, Step};
use tephra_proto::{
    AttrValue, Attrs, ClientEvent, DomEvent, HistoryMethod, Mutation, NodeId, Propagation,
};

type Log = Arc<Mutex<Vec<&'static str>>>;

fn log() -> Log {
    Arc::new(Mutex::new(Vec::new()))
}

fn recorded(log: &Log) -> Vec<&'static str> {
    log.lock().unwrap().clone()
}

fn dom_events(events: &[ClientEvent]) -> Vec<&DomEvent> {
    events
        .iter()
        .filter_map(|event| match event {
            ClientEvent::Dom(dom) => Some(dom),
            ClientEvent::DomInput(input) => Some(&input.event),
            ClientEvent::DomKey(key) => Some(&key.event),
            ClientEvent::History { .. } | ClientEvent::Ping { .. } => None,
        })
        .collect()
}

/// A single clickable `div`.
struct ClickTarget {
    log: Log,
}

impl Renderer for ClickTarget {
    fn mount(&mut self, tree: &mut Session, _: &mut StateSlots) -> Result<(), TreeError> {
        let log = Arc::clone(&self.log);
        let div = tree.create_element("div")?;
        tree.append_child(NodeId::ROOT, div)?;
        tree.set_initial_props(
            div,
            Props::from([(
                "onClick".to_owned(),
                Handler::new(move |_| log.lock().unwrap().push("click")).into(),
            )]),
        )?;
        Ok(())
    }

    fn update(&mut self, _: &mut Session) -> Result<(), TreeError> {
        Ok(())
    }

    fn snapshot(&self, _: &mut StateSlots) -> Result<(), StateError> {
        Ok(())
    }
}

#[test]
fn click_round_trips_deferred_default() {
    let handled = log();
    let in_oracle = Arc::clone(&handled);
    let renderer_log = Arc::clone(&handled);

    Scenario::new("deferred default")
        .renderer(move || ClickTarget { log: Arc::clone(&renderer_log) })
        .click(NodeId(1))
        .oracle(Box::new(move |world| {
            let mutations = world.mutations();
            let expected_start = [
                Mutation::CreateElement { node: NodeId(1), tag: "div".into() },
                Mutation::AppendChild { parent: NodeId::ROOT, child: NodeId(1) },
                Mutation::SetInitialAttrs {
                    node: NodeId(1),
                    attrs: Attrs::from([("click".to_owned(), AttrValue::Callback)]),
                },
            ];
            if !matches!(mutations.first(), Some(Mutation::SetSessionToken { .. }))
                || mutations.get(1..4) != Some(&expected_start[..])
            {
                return Err(format!("unexpected initial render: {mutations:?}"));
            }

            let clicks = dom_events(world.events());
            let forwarded = DomEvent {
                target: NodeId(1),
                name: "click".into(),
                cancelable: true,
                propagation: Propagation::NonBubbling,
            };
            if clicks != [&forwarded] {
                return Err(format!("expected one forwarded click, got {clicks:?}"));
            }

            let dispatches = mutations
                .iter()
                .filter(|m| matches!(m, Mutation::DispatchEvent { .. }))
                .collect::<Vec<_>>();
            let performed = Mutation::DispatchEvent {
                target: NodeId(1),
                name: "click".into(),
                perform_default: true,
            };
            if dispatches != [&performed] {
                return Err(format!("expected one perform-default dispatch, got {dispatches:?}"));
            }

            let defaults = world
                .effects()
                .iter()
                .filter(|a| matches!(a, ClientAction::DefaultPerformed { .. }))
                .count();
            if defaults != 1 {
                return Err(format!("native default ran {defaults} times"));
            }
            if recorded(&in_oracle) != ["click"] {
                return Err("handler did not run exactly once".into());
            }
            world.mirrors()
        }))
        .run()
        .unwrap();
}

/// `outer > middle > inner`, each with a click handler; `middle` stops
/// propagation.
struct Nested {
    log: Log,
}

impl Renderer for Nested {
    fn mount(&mut self, tree: &mut Session, _: &mut StateSlots) -> Result<(), TreeError> {
        let mut parent = NodeId::ROOT;
        for (tag, name, stop) in
            [("section", "outer", false), ("div", "middle", true), ("button", "inner", false)]
        {
            let log = Arc::clone(&self.log);
            let node = tree.create_element(tag)?;
            tree.append_child(parent, node)?;
            tree.set_initial_props(
                node,
                Props::from([(
                    "onClick".to_owned(),
                    Handler::new(move |event| {
                        log.lock().unwrap().push(name);
                        if stop {
                            event.stop_propagation();
                        }
                    })
                    .into(),
                )]),
            )?;
            parent = node;
        }
        Ok(())
    }

    fn update(&mut self, _: &mut Session) -> Result<(), TreeError> {
        Ok(())
    }

    fn snapshot(&self, _: &mut StateSlots) -> Result<(), StateError> {
        Ok(())
    }
}

#[test]
fn stop_propagation_short_circuits_bubbling() {
    let calls = log();
    let in_oracle = Arc::clone(&calls);

    Scenario::new("bubbling")
        .renderer(move || Nested { log: Arc::clone(&calls) })
        .click(NodeId(3))
        .oracle(Box::new(move |world| {
            let clicks = dom_events(world.events());
            let [click] = clicks.as_slice() else {
                return Err(format!("expected one click, got {clicks:?}"));
            };
            let path = Propagation::Bubbling { composed_path: vec![NodeId(3), NodeId(2), NodeId(1)] };
            if click.propagation != path {
                return Err(format!("unexpected path {:?}", click.propagation));
            }
            let calls = recorded(&in_oracle);
            if calls != ["inner", "middle"] {
                return Err(format!("handlers ran as {calls:?}"));
            }
            Ok(())
        }))
        .run()
        .unwrap();
}

/// Text input whose value the authority echoes back upper-cased.
struct Shouting {
    seen: Arc<Mutex<String>>,
    handler: Option<Handler>,
    input: Option<NodeId>,
}

impl Shouting {
    fn props(&self) -> Props {
        let mut props = Props::from([("type".to_owned(), "text".into())]);
        if let Some(handler) = &self.handler {
            props.insert("onInput".to_owned(), handler.clone().into());
        }
        let value = self.seen.lock().unwrap().to_uppercase();
        props.insert("value".to_owned(), value.into());
        props
    }
}

impl Renderer for Shouting {
    fn mount(&mut self, tree: &mut Session, _: &mut StateSlots) -> Result<(), TreeError> {
        let seen = Arc::clone(&self.seen);
        self.handler = Some(Handler::new(move |event| {
            if let Some(value) = event.value() {
                value.clone_into(&mut seen.lock().unwrap());
            }
        }));
        let input = tree.create_element("input")?;
        tree.append_child(NodeId::ROOT, input)?;
        tree.set_initial_props(input, self.props())?;
        self.input = Some(input);
        Ok(())
    }

    fn update(&mut self, tree: &mut Session) -> Result<(), TreeError> {
        match self.input {
            Some(input) => tree.update_props(input, self.props()),
            None => Ok(()),
        }
    }

    fn snapshot(&self, _: &mut StateSlots) -> Result<(), StateError> {
        Ok(())
    }
}

#[test]
fn value_echo_waits_out_debounce() {
    Scenario::new("debounce")
        .renderer(|| Shouting { seen: Arc::default(), handler: None, input: None })
        .input(NodeId(1), "hello")
        .oracle(Box::new(|world| {
            let client = world.client();
            let dom = client.dom(NodeId(1)).ok_or("input not replayed")?;
            let value = client.document().element(dom).map(|e| e.value().to_owned());
            if value.as_deref() != Some("hello") {
                return Err(format!("echo applied early: {value:?}"));
            }
            if client.pending_value(NodeId(1)) != Some("HELLO") {
                return Err("echo not scheduled".into());
            }
            Ok(())
        }))
        .run()
        .unwrap();

    Scenario::new("debounce elapsed")
        .renderer(|| Shouting { seen: Arc::default(), handler: None, input: None })
        .input(NodeId(1), "hello")
        .advance(Duration::from_millis(20))
        .input(NodeId(1), "hello!")
        .advance(Duration::from_millis(30))
        .oracle(Box::new(|world| {
            // The second keystroke pushed the first echo out; only the
            // latest value may land.
            let client = world.client();
            let dom = client.dom(NodeId(1)).ok_or("input not replayed")?;
            let value = client.document().element(dom).map(|e| e.value().to_owned());
            if value.as_deref() != Some("hello!") {
                return Err(format!("stale echo applied: {value:?}"));
            }
            Ok(())
        }))
        .run()
        .unwrap();

    Scenario::new("debounce settled")
        .renderer(|| Shouting { seen: Arc::default(), handler: None, input: None })
        .input(NodeId(1), "hello")
        .advance(Duration::from_millis(100))
        .oracle(Box::new(|world| {
            let client = world.client();
            let dom = client.dom(NodeId(1)).ok_or("input not replayed")?;
            let value = client.document().element(dom).map(|e| e.value().to_owned());
            if value.as_deref() != Some("HELLO") {
                return Err(format!("echo never applied: {value:?}"));
            }
            Ok(())
        }))
        .run()
        .unwrap();
}

/// Shows the location and navigates to `/next` when its link is clicked.
struct Router {
    wants_next: Arc<Mutex<bool>>,
    label: Option<NodeId>,
    shown: String,
}

impl Renderer for Router {
    fn mount(&mut self, tree: &mut Session, _: &mut StateSlots) -> Result<(), TreeError> {
        let wants_next = Arc::clone(&self.wants_next);
        let link = tree.create_element("a")?;
        tree.append_child(NodeId::ROOT, link)?;
        tree.set_initial_props(
            link,
            Props::from([(
                "onClick".to_owned(),
                Handler::new(move |event| {
                    event.prevent_default();
                    *wants_next.lock().unwrap() = true;
                })
                .into(),
            )]),
        )?;
        self.shown = tree.location().to_owned();
        let label = tree.create_text(&self.shown)?;
        tree.append_child(NodeId::ROOT, label)?;
        self.label = Some(label);
        Ok(())
    }

    fn update(&mut self, tree: &mut Session) -> Result<(), TreeError> {
        if std::mem::take(&mut *self.wants_next.lock().unwrap()) {
            tree.navigate(HistoryMethod::Push("/next".into()))?;
        }
        if let Some(label) = self.label.filter(|_| tree.location() != self.shown) {
            self.shown = tree.location().to_owned();
            tree.update_text(label, &self.shown)?;
        }
        Ok(())
    }

    fn snapshot(&self, _: &mut StateSlots) -> Result<(), StateError> {
        Ok(())
    }
}

#[test]
fn navigation_and_back_rerender_location() {
    let router = || Router { wants_next: Arc::default(), label: None, shown: String::new() };

    Scenario::new("navigate")
        .location("/start")
        .renderer(router)
        .click(NodeId(1))
        .oracle(Box::new(|world| {
            if world.client().history().current() != "/next" {
                return Err("client did not navigate".into());
            }
            if world.session().map(Session::location) != Some("/next") {
                return Err("authority did not see the move".into());
            }
            if world.text(NodeId(2)).as_deref() != Some("/next") {
                return Err("location not re-rendered".into());
            }
            if world.effects().iter().any(|a| matches!(a, ClientAction::DefaultPerformed { .. }))
            {
                return Err("prevented default still ran".into());
            }
            Ok(())
        }))
        .run()
        .unwrap();

    Scenario::new("back")
        .location("/start")
        .renderer(router)
        .click(NodeId(1))
        .step(Step::Back)
        .oracle(Box::new(|world| {
            match world.text(NodeId(2)).as_deref() {
                Some("/start") => Ok(()),
                other => Err(format!("back left {other:?}")),
            }
        }))
        .run()
        .unwrap();
}
