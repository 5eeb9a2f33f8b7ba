//! Model-based property tests.
//!
//! Random host edits are applied to a live session and to a plain reference
//! tree. After every edit the replayed client document must mirror the
//! session, every text node must read what the model says, and no mutation
//! may name a node after the frame that removed it.
//!
//! ```text
//! proptest generates: Vec<Edit>
//!                          │
//!           ┌──────────────┼──────────────┐
//!           ▼              ▼              ▼
//!       ModelTree        World         Compare
//!      (reference)    (loopback)       Results
//! ```

use std::collections::{HashMap, HashSet};

use proptest::prelude::*;
use tephra_core::{Renderer, Session, StateError, StateSlots, TreeError};
use tephra_harness::{SimEnv, World, scenario::RendererFactory};
use tephra_proto::{Mutation, NodeId};

/// Mounts nothing; every node comes from host edits.
struct Blank;

impl Renderer for Blank {
    fn mount(&mut self, _: &mut Session, _: &mut StateSlots) -> Result<(), TreeError> {
        Ok(())
    }

    fn update(&mut self, _: &mut Session) -> Result<(), TreeError> {
        Ok(())
    }

    fn snapshot(&self, _: &mut StateSlots) -> Result<(), StateError> {
        Ok(())
    }
}

const TAGS: [&str; 4] = ["div", "span", "ul", "li"];

/// Indices are taken modulo the live candidates when the edit runs.
#[derive(Debug, Clone)]
enum Edit {
    AddElement { parent: usize, tag: usize },
    AddText { parent: usize, text: String },
    PrependElement { parent: usize, tag: usize },
    SetText { text_node: usize, text: String },
    Move { node: usize, parent: usize },
    Remove { node: usize },
}

fn edit_strategy() -> impl Strategy<Value = Edit> {
    let text = "[a-z ]{0,8}";
    prop_oneof![
        3 => (any::<usize>(), 0..TAGS.len())
            .prop_map(|(parent, tag)| Edit::AddElement { parent, tag }),
        2 => (any::<usize>(), text).prop_map(|(parent, text)| Edit::AddText { parent, text }),
        1 => (any::<usize>(), 0..TAGS.len())
            .prop_map(|(parent, tag)| Edit::PrependElement { parent, tag }),
        2 => (any::<usize>(), text)
            .prop_map(|(text_node, text)| Edit::SetText { text_node, text }),
        1 => (any::<usize>(), any::<usize>())
            .prop_map(|(node, parent)| Edit::Move { node, parent }),
        1 => any::<usize>().prop_map(|node| Edit::Remove { node }),
    ]
}

/// Reference tree: parent links, ordered children, text content.
#[derive(Default)]
struct ModelTree {
    children: HashMap<NodeId, Vec<NodeId>>,
    parents: HashMap<NodeId, NodeId>,
    texts: HashMap<NodeId, String>,
    /// Subtrees in removal order, one entry per `RemoveChild`.
    removed: Vec<Vec<NodeId>>,
}

impl ModelTree {
    fn new() -> Self {
        let mut model = Self::default();
        model.children.insert(NodeId::ROOT, Vec::new());
        model
    }

    /// Root and attached elements, in id order.
    fn elements(&self) -> Vec<NodeId> {
        let mut elements = self.children.keys().copied().collect::<Vec<_>>();
        elements.sort();
        elements
    }

    fn text_nodes(&self) -> Vec<NodeId> {
        let mut texts = self.texts.keys().copied().collect::<Vec<_>>();
        texts.sort();
        texts
    }

    fn nodes(&self) -> Vec<NodeId> {
        let mut nodes = self.parents.keys().copied().collect::<Vec<_>>();
        nodes.sort();
        nodes
    }

    fn attach(&mut self, parent: NodeId, node: NodeId, first: bool) {
        self.detach(node);
        let siblings = self.children.entry(parent).or_default();
        if first {
            siblings.insert(0, node);
        } else {
            siblings.push(node);
        }
        self.parents.insert(node, parent);
    }

    fn detach(&mut self, node: NodeId) {
        if let Some(parent) = self.parents.remove(&node)
            && let Some(siblings) = self.children.get_mut(&parent)
        {
            siblings.retain(|&n| n != node);
        }
    }

    fn is_ancestor_or_self(&self, ancestor: NodeId, mut node: NodeId) -> bool {
        loop {
            if node == ancestor {
                return true;
            }
            match self.parents.get(&node) {
                Some(&parent) => node = parent,
                None => return false,
            }
        }
    }

    fn remove(&mut self, node: NodeId) {
        self.detach(node);
        let mut gone = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            if let Some(kids) = self.children.remove(&id) {
                stack.extend(kids);
            }
            self.texts.remove(&id);
            self.parents.remove(&id);
            gone.push(id);
        }
        self.removed.push(gone);
    }
}

fn pick(candidates: &[NodeId], index: usize) -> Option<NodeId> {
    (!candidates.is_empty()).then(|| candidates[index % candidates.len()])
}

fn apply(world: &mut World, model: &mut ModelTree, edit: &Edit) -> Result<(), String> {
    match edit {
        Edit::AddElement { parent, tag } | Edit::PrependElement { parent, tag } => {
            let first = matches!(edit, Edit::PrependElement { .. });
            let parent = pick(&model.elements(), *parent).ok_or("no elements")?;
            let before = first.then(|| model.children.get(&parent)?.first().copied()).flatten();
            let node = world.host(|session| {
                let node = session.create_element(TAGS[*tag])?;
                match before {
                    Some(before) => session.insert_before(parent, node, before)?,
                    None => session.append_child(parent, node)?,
                }
                Ok(node)
            })?;
            model.children.insert(node, Vec::new());
            model.attach(parent, node, first);
        },
        Edit::AddText { parent, text } => {
            let parent = pick(&model.elements(), *parent).ok_or("no elements")?;
            let node = world.host(|session| {
                let node = session.create_text(text)?;
                session.append_child(parent, node)?;
                Ok(node)
            })?;
            model.texts.insert(node, text.clone());
            model.attach(parent, node, false);
        },
        Edit::SetText { text_node, text } => {
            let Some(node) = pick(&model.text_nodes(), *text_node) else { return Ok(()) };
            world.host(|session| session.update_text(node, text))?;
            model.texts.insert(node, text.clone());
        },
        Edit::Move { node, parent } => {
            let Some(node) = pick(&model.nodes(), *node) else { return Ok(()) };
            let parent = pick(&model.elements(), *parent).ok_or("no elements")?;
            if model.is_ancestor_or_self(node, parent) {
                // The session must refuse the cycle and leave the tree alone
                let refused = world.host(|session| session.append_child(parent, node));
                return match refused {
                    Err(_) => Ok(()),
                    Ok(()) => Err(format!("moving {node} under {parent} was accepted")),
                };
            }
            world.host(|session| session.append_child(parent, node))?;
            model.attach(parent, node, false);
        },
        Edit::Remove { node } => {
            let Some(node) = pick(&model.nodes(), *node) else { return Ok(()) };
            let parent = model.parents.get(&node).copied().ok_or("orphan in model")?;
            world.host(|session| session.remove_child(parent, node))?;
            model.remove(node);
        },
    }
    Ok(())
}

fn check(world: &World, model: &ModelTree) -> Result<(), String> {
    world.mirrors()?;

    let session = world.session().ok_or("no live session")?;
    if session.nodes().len() != model.parents.len() {
        return Err(format!(
            "authority has {} nodes, model {}",
            session.nodes().len(),
            model.parents.len()
        ));
    }
    for (parent, kids) in &model.children {
        let actual = session.nodes().children(*parent).map_err(|e| e.to_string())?;
        if actual != kids.as_slice() {
            return Err(format!("children of {parent}: {actual:?} != {kids:?}"));
        }
    }
    for (node, text) in &model.texts {
        if world.text(*node).as_deref() != Some(text.as_str()) {
            return Err(format!("text of {node}: {:?} != {text:?}", world.text(*node)));
        }
    }
    Ok(())
}

/// No mutation may name a node once a `RemoveChild` has dropped it.
fn check_retired_ids(mutations: &[Mutation], removed: &[Vec<NodeId>]) -> Result<(), String> {
    let mut dead = HashSet::new();
    let mut removals = removed.iter();
    for mutation in mutations {
        if let Some(stale) = mutation.node_refs().into_iter().find(|id| dead.contains(id)) {
            return Err(format!("{mutation:?} names removed {stale}"));
        }
        if matches!(mutation, Mutation::RemoveChild { .. }) {
            let subtree = removals.next().ok_or("more removals on the wire than in the model")?;
            dead.extend(subtree.iter().copied());
        }
    }
    Ok(())
}

fn blank_world(seed: u64) -> World {
    let make: RendererFactory = Box::new(|| Box::new(Blank) as Box<dyn Renderer>);
    World::new(SimEnv::with_seed(seed), make, "/")
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn client_mirrors_random_edits(
        seed in any::<u64>(),
        edits in prop::collection::vec(edit_strategy(), 1..40),
    ) {
        let mut world = blank_world(seed);
        world.connect().map_err(TestCaseError::fail)?;
        let mut model = ModelTree::new();

        for edit in &edits {
            apply(&mut world, &mut model, edit).map_err(TestCaseError::fail)?;
            check(&world, &model)
                .map_err(|e| TestCaseError::fail(format!("after {edit:?}: {e}")))?;
        }
        check_retired_ids(world.mutations(), &model.removed).map_err(TestCaseError::fail)?;
    }

    #[test]
    fn resume_rebuilds_fresh_tree(
        edits in prop::collection::vec(edit_strategy(), 1..20),
    ) {
        let mut world = blank_world(5);
        world.connect().map_err(TestCaseError::fail)?;
        let mut model = ModelTree::new();
        for edit in &edits {
            apply(&mut world, &mut model, edit).map_err(TestCaseError::fail)?;
        }

        // Host-built nodes are not part of component state; a resumed
        // render starts from an empty tree and must still mirror.
        world.disconnect();
        world.connect().map_err(TestCaseError::fail)?;
        check(&world, &ModelTree::new()).map_err(TestCaseError::fail)?;
    }
}

#[test]
fn removing_a_subtree_retires_every_id() {
    let mut world = blank_world(1);
    world.connect().unwrap();
    let mut model = ModelTree::new();

    for edit in [
        Edit::AddElement { parent: 0, tag: 2 },
        Edit::AddElement { parent: 1, tag: 3 },
        Edit::AddText { parent: 2, text: "leaf".into() },
        Edit::Remove { node: 0 },
    ] {
        apply(&mut world, &mut model, &edit).unwrap();
        check(&world, &model).unwrap();
    }

    assert_eq!(model.removed, [vec![NodeId(1), NodeId(2), NodeId(3)]]);
    assert!(world.client().dom(NodeId(3)).is_none());
    assert!(world.session().unwrap().nodes().is_empty());
    check_retired_ids(world.mutations(), &model.removed).unwrap();
}
