//! Bounded, cycle-safe traversal of introspectable object graphs.
//!
//! The walker turns an object graph into a [`Node`] tree under four bounds:
//!
//! - **Depth**: the root is depth 0; an object or sequence at depth
//!   `d >= max_depth` is rendered opaque (declared type, no children).
//! - **Count**: once `max_count` nodes have been emitted, every further
//!   property is rendered opaque. Nodes already started are completed.
//! - **Soft size**: same as count, once the running size estimate exceeds
//!   `max_size`.
//! - **Absolute ceiling**: if the running estimate crosses the ceiling the
//!   walk aborts with [`CeilingExceeded`].
//!
//! Cycles are cut by a path-scoped set of object identities: an object that
//! is already being expanded higher up the current path is rendered opaque
//! with [`Truncation::Cycle`] instead of being entered again. This alone
//! guarantees termination, independent of the other bounds.
//!
//! Sequence elements share the depth of their sequence node.
//!
//! Independently of `max_depth`, no composite is entered more than
//! [`MAX_NESTING`] levels below the root, counting sequences as well as
//! objects. Graphs whose getters hand out fresh objects on every read never
//! repeat an identity, so this is what keeps recursion bounded for them.

use std::collections::HashSet;

use tracing::{debug, trace};

use crate::coerce::render;
use crate::name::ResourceName;
use crate::node::{Node, NodeBody, Truncation};
use crate::traits::Introspectable;
use crate::types::{ObjectId, Sequence, Value};
use crate::xml::CeilingExceeded;

/// Depth used when the caller does not specify one.
pub const DEFAULT_MAX_DEPTH: usize = 2;

/// Hard limit on composite nesting, whatever `max_depth` says.
pub const MAX_NESTING: usize = 128;

/// Caller-supplied traversal bounds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WalkLimits {
    pub max_depth: usize,
    /// `None` means bounded only by the absolute ceiling.
    pub max_count: Option<usize>,
    /// `None` means bounded only by the absolute ceiling.
    pub max_size: Option<usize>,
}

impl Default for WalkLimits {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            max_count: None,
            max_size: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Property filtering hook
// ---------------------------------------------------------------------------

/// Which properties of one identified object must be omitted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Exclusion {
    #[default]
    Nothing,
    /// Every property is omitted; the object renders identity-only.
    All,
    Names(HashSet<String>),
}

impl Exclusion {
    #[must_use]
    pub fn excludes(&self, property: &str) -> bool {
        match self {
            Self::Nothing => false,
            Self::All => true,
            Self::Names(names) => names.contains(property),
        }
    }

    #[must_use]
    pub fn is_all(&self) -> bool {
        matches!(self, Self::All)
    }
}

/// Decides property exclusion for objects that carry a registry identity.
pub trait PropertyFilter {
    fn exclusion(&self, identity: &ResourceName) -> Exclusion;
}

/// Filter that never excludes anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoFilter;

impl PropertyFilter for NoFilter {
    fn exclusion(&self, _identity: &ResourceName) -> Exclusion {
        Exclusion::Nothing
    }
}

// ---------------------------------------------------------------------------
// WalkState
// ---------------------------------------------------------------------------

/// Mutable per-walk context.
#[derive(Debug, Default)]
struct WalkState {
    /// Nodes emitted so far.
    count: usize,
    /// Running size estimate in bytes.
    size: usize,
    /// Objects currently being expanded on the path from the root.
    path: HashSet<ObjectId>,
    /// Composites (objects and sequences) open on the current path.
    nesting: usize,
}

// ---------------------------------------------------------------------------
// GraphWalker
// ---------------------------------------------------------------------------

/// Walks object graphs into node trees. Cheap to construct per call.
pub struct GraphWalker<'f> {
    limits: WalkLimits,
    ceiling: usize,
    filter: &'f dyn PropertyFilter,
}

impl GraphWalker<'static> {
    /// Creates a walker with no property filter.
    #[must_use]
    pub fn new(limits: WalkLimits, ceiling: usize) -> Self {
        GraphWalker {
            limits,
            ceiling,
            filter: &NoFilter,
        }
    }
}

impl<'f> GraphWalker<'f> {
    /// Applies `filter` to every object that carries a registry identity.
    #[must_use]
    pub fn with_filter<'g>(self, filter: &'g dyn PropertyFilter) -> GraphWalker<'g> {
        GraphWalker {
            limits: self.limits,
            ceiling: self.ceiling,
            filter,
        }
    }

    #[must_use]
    pub fn limits(&self) -> WalkLimits {
        self.limits
    }

    /// Walks the graph rooted at `root`.
    ///
    /// `identity` overrides the root's own [`Introspectable::resource_name`]
    /// for filter lookup (registries know the name the resource was
    /// registered under).
    ///
    /// # Errors
    ///
    /// Returns `CeilingExceeded` when the size estimate crosses the absolute
    /// ceiling.
    pub fn walk<T: Introspectable + ?Sized>(
        &self,
        name: &str,
        root: &T,
        identity: Option<&ResourceName>,
    ) -> Result<Node, CeilingExceeded> {
        let mut state = WalkState::default();
        let node = self.object_node(&mut state, name, None, root, identity.cloned(), 0)?;
        debug!(
            root = root.type_name(),
            nodes = state.count,
            size = state.size,
            "graph walk complete"
        );
        Ok(node)
    }

    /// Walks a standalone value, e.g. an operation result.
    ///
    /// # Errors
    ///
    /// Returns `CeilingExceeded` when the size estimate crosses the absolute
    /// ceiling.
    pub fn walk_value(&self, name: &str, value: &Value) -> Result<Node, CeilingExceeded> {
        let mut state = WalkState::default();
        self.value_node(&mut state, name, None, value, 0)
    }

    fn value_node(
        &self,
        st: &mut WalkState,
        name: &str,
        index: Option<usize>,
        value: &Value,
        depth: usize,
    ) -> Result<Node, CeilingExceeded> {
        match value {
            Value::Object(obj) => self.object_node(st, name, index, obj.as_ref(), None, depth),
            Value::Sequence(seq) => self.sequence_node(st, name, index, seq, depth),
            Value::Null => self.emit(st, Node::null(name, value.type_name()).at_index(index)),
            leaf => {
                let type_name = leaf.type_name();
                let node = match (self.soft_stop(st), render(leaf)) {
                    (Some(reason), _) => Node::truncated(name, type_name, reason),
                    (None, Some(text)) => Node::leaf(name, type_name, text),
                    (None, None) => Node::null(name, type_name),
                };
                self.emit(st, node.at_index(index))
            }
        }
    }

    fn object_node<T: Introspectable + ?Sized>(
        &self,
        st: &mut WalkState,
        name: &str,
        index: Option<usize>,
        obj: &T,
        identity: Option<ResourceName>,
        depth: usize,
    ) -> Result<Node, CeilingExceeded> {
        let type_name = obj.type_name().to_string();
        let id = ObjectId::of(obj);

        let stop = if st.path.contains(&id) {
            Some(Truncation::Cycle)
        } else if depth >= self.limits.max_depth || st.nesting >= MAX_NESTING {
            Some(Truncation::Depth)
        } else {
            self.soft_stop(st)
        };
        if let Some(reason) = stop {
            trace!(name, %type_name, reason = reason.as_str(), "object not expanded");
            return self.emit(st, Node::truncated(name, type_name, reason).at_index(index));
        }

        let header = Node::composite(name, type_name, Vec::new()).at_index(index);
        self.account(st, header.size_estimate())?;

        let exclusion = identity
            .or_else(|| obj.resource_name())
            .map(|rn| self.filter.exclusion(&rn))
            .unwrap_or_default();

        st.path.insert(id);
        st.nesting += 1;
        let children = self.object_children(st, obj, &exclusion, depth);
        st.nesting -= 1;
        st.path.remove(&id);

        let mut node = header;
        node.body = NodeBody::Children(children?);
        Ok(node)
    }

    fn object_children<T: Introspectable + ?Sized>(
        &self,
        st: &mut WalkState,
        obj: &T,
        exclusion: &Exclusion,
        depth: usize,
    ) -> Result<Vec<Node>, CeilingExceeded> {
        if exclusion.is_all() {
            return Ok(Vec::new());
        }
        let mut children = Vec::new();
        for property in obj.property_names() {
            if exclusion.excludes(&property) {
                continue;
            }
            let child = match obj.property_value(&property) {
                Ok(value) => self.value_node(st, &property, None, &value, depth + 1)?,
                Err(err) => {
                    debug!(%property, error = %err, "property read failed");
                    self.emit(st, Node::truncated(property.as_str(), "unknown", Truncation::Unreadable))?
                }
            };
            children.push(child);
        }
        Ok(children)
    }

    fn sequence_node(
        &self,
        st: &mut WalkState,
        name: &str,
        index: Option<usize>,
        seq: &Sequence,
        depth: usize,
    ) -> Result<Node, CeilingExceeded> {
        let type_name = format!("{}[]", seq.element_type);

        let stop = if depth >= self.limits.max_depth || st.nesting >= MAX_NESTING {
            Some(Truncation::Depth)
        } else {
            self.soft_stop(st)
        };
        if let Some(reason) = stop {
            return self.emit(st, Node::truncated(name, type_name, reason).at_index(index));
        }

        let mut node = Node::composite(name, type_name, Vec::new()).at_index(index);
        self.account(st, node.size_estimate())?;

        st.nesting += 1;
        let children = self.sequence_elements(st, name, seq, depth);
        st.nesting -= 1;
        node.body = NodeBody::Children(children?);
        Ok(node)
    }

    fn sequence_elements(
        &self,
        st: &mut WalkState,
        name: &str,
        seq: &Sequence,
        depth: usize,
    ) -> Result<Vec<Node>, CeilingExceeded> {
        let mut children = Vec::with_capacity(seq.items.len());
        for (i, item) in seq.items.iter().enumerate() {
            children.push(self.value_node(st, name, Some(i), item, depth)?);
        }
        Ok(children)
    }

    /// Soft bound that currently stops expansion, if any.
    fn soft_stop(&self, st: &WalkState) -> Option<Truncation> {
        if self.limits.max_count.is_some_and(|max| st.count >= max) {
            Some(Truncation::Count)
        } else if self.limits.max_size.is_some_and(|max| st.size > max) {
            Some(Truncation::Size)
        } else {
            None
        }
    }

    fn emit(&self, st: &mut WalkState, node: Node) -> Result<Node, CeilingExceeded> {
        self.account(st, node.size_estimate())?;
        Ok(node)
    }

    fn account(&self, st: &mut WalkState, bytes: usize) -> Result<(), CeilingExceeded> {
        st.count += 1;
        st.size += bytes;
        if st.size > self.ceiling {
            return Err(CeilingExceeded {
                limit: self.ceiling,
                reached: st.size,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, OnceLock};

    use proptest::prelude::*;

    use super::*;
    use crate::types::ObjectRef;

    const CEILING: usize = 1 << 20;

    /// Bean with fixed properties; `links` are filled after construction so
    /// cycles can be built.
    struct Bean {
        type_name: &'static str,
        identity: Option<ResourceName>,
        scalars: Vec<(&'static str, Value)>,
        links: OnceLock<Vec<(String, ObjectRef)>>,
    }

    impl Bean {
        fn new(type_name: &'static str, scalars: Vec<(&'static str, Value)>) -> Arc<Self> {
            Arc::new(Self {
                type_name,
                identity: None,
                scalars,
                links: OnceLock::new(),
            })
        }

        fn link(self: &Arc<Self>, links: Vec<(&str, ObjectRef)>) {
            let _ = self
                .links
                .set(links.into_iter().map(|(n, o)| (n.to_string(), o)).collect());
        }
    }

    impl Introspectable for Bean {
        fn type_name(&self) -> &str {
            self.type_name
        }

        fn property_names(&self) -> Vec<String> {
            let mut names: Vec<String> = self.scalars.iter().map(|(n, _)| (*n).to_string()).collect();
            if let Some(links) = self.links.get() {
                names.extend(links.iter().map(|(n, _)| n.clone()));
            }
            names
        }

        fn property_value(&self, name: &str) -> anyhow::Result<Value> {
            if let Some((_, v)) = self.scalars.iter().find(|(n, _)| *n == name) {
                return Ok(v.clone());
            }
            self.links
                .get()
                .and_then(|links| links.iter().find(|(n, _)| n == name))
                .map(|(_, o)| Value::Object(Arc::clone(o)))
                .ok_or_else(|| anyhow::anyhow!("no property {name}"))
        }

        fn resource_name(&self) -> Option<ResourceName> {
            self.identity.clone()
        }
    }

    fn walker(limits: WalkLimits) -> GraphWalker<'static> {
        GraphWalker::new(limits, CEILING)
    }

    /// Root with two scalars and a child whose `me` points back at itself.
    fn self_referencing() -> Arc<Bean> {
        let child = Bean::new("Child", vec![("label", Value::from("c"))]);
        child.link(vec![("me", child.clone() as ObjectRef)]);
        let root = Bean::new("Root", vec![("a", Value::Int(1)), ("b", Value::from("two"))]);
        root.link(vec![("child", child as ObjectRef)]);
        root
    }

    #[test]
    fn depth_zero_renders_identity_only() {
        let root = self_referencing();
        let node = walker(WalkLimits { max_depth: 0, ..WalkLimits::default() })
            .walk("root", root.as_ref(), None)
            .unwrap();
        assert_eq!(node.type_name, "Root");
        assert_eq!(node.truncation(), Some(Truncation::Depth));
        assert!(node.children().is_empty());
    }

    #[test]
    fn default_depth_cuts_self_reference() {
        let root = self_referencing();
        let node = walker(WalkLimits::default()).walk("root", root.as_ref(), None).unwrap();

        assert_eq!(node.child("a").and_then(Node::text), Some("1"));
        assert_eq!(node.child("b").and_then(Node::text), Some("two"));
        let child = node.child("child").unwrap();
        assert!(child.is_expanded());
        assert_eq!(child.child("label").and_then(Node::text), Some("c"));
        assert_eq!(child.child("me").unwrap().truncation(), Some(Truncation::Cycle));
        assert_eq!(node.depth(), 1);
    }

    #[test]
    fn cycle_cut_without_depth_bound() {
        let a = Bean::new("A", vec![]);
        let b = Bean::new("B", vec![]);
        a.link(vec![("next", b.clone() as ObjectRef)]);
        b.link(vec![("next", a.clone() as ObjectRef)]);

        let node = walker(WalkLimits { max_depth: usize::MAX, ..WalkLimits::default() })
            .walk("a", a.as_ref(), None)
            .unwrap();
        let back = node.child("next").unwrap().child("next").unwrap();
        assert_eq!(back.type_name, "A");
        assert_eq!(back.truncation(), Some(Truncation::Cycle));
    }

    #[test]
    fn shared_object_on_sibling_paths_is_expanded_twice() {
        let shared = Bean::new("Shared", vec![("v", Value::Int(7))]);
        let root = Bean::new("Root", vec![]);
        root.link(vec![
            ("left", shared.clone() as ObjectRef),
            ("right", shared as ObjectRef),
        ]);
        let node = walker(WalkLimits::default()).walk("r", root.as_ref(), None).unwrap();
        assert!(node.child("left").unwrap().is_expanded());
        assert!(node.child("right").unwrap().is_expanded());
    }

    #[test]
    fn count_bound_truncates_remaining_properties() {
        let root = Bean::new(
            "Root",
            vec![("a", Value::Int(1)), ("b", Value::Int(2)), ("c", Value::Int(3))],
        );
        let node = walker(WalkLimits { max_count: Some(2), ..WalkLimits::default() })
            .walk("r", root.as_ref(), None)
            .unwrap();
        // Root header + "a" reach the bound; "b" and "c" are opaque.
        assert_eq!(node.child("a").and_then(Node::text), Some("1"));
        assert_eq!(node.child("b").unwrap().truncation(), Some(Truncation::Count));
        assert_eq!(node.child("c").unwrap().truncation(), Some(Truncation::Count));
    }

    #[test]
    fn soft_size_bound_truncates() {
        let big = "x".repeat(500);
        let root = Bean::new("Root", vec![("big", Value::from(big.as_str())), ("after", Value::Int(1))]);
        let node = walker(WalkLimits { max_size: Some(100), ..WalkLimits::default() })
            .walk("r", root.as_ref(), None)
            .unwrap();
        assert_eq!(node.child("big").and_then(Node::text), Some(big.as_str()));
        assert_eq!(node.child("after").unwrap().truncation(), Some(Truncation::Size));
    }

    #[test]
    fn absolute_ceiling_aborts() {
        let root = Bean::new("Root", vec![("big", Value::from("y".repeat(4096).as_str()))]);
        let err = GraphWalker::new(WalkLimits::default(), 1024)
            .walk("r", root.as_ref(), None)
            .unwrap_err();
        assert_eq!(err.limit, 1024);
    }

    #[test]
    fn sequences_render_indexed_elements() {
        let inner = Bean::new("Inner", vec![("v", Value::Int(5))]);
        let root = Bean::new(
            "Root",
            vec![
                ("nums", Value::sequence("int", vec![Value::Int(1), Value::Int(2)])),
                ("objs", Value::sequence("Inner", vec![Value::Object(inner as ObjectRef)])),
            ],
        );
        let node = walker(WalkLimits::default()).walk("r", root.as_ref(), None).unwrap();
        let nums = node.child("nums").unwrap();
        assert_eq!(nums.type_name, "int[]");
        assert_eq!(nums.element(1).and_then(Node::text), Some("2"));
        let obj = node.child("objs").unwrap().element(0).unwrap();
        assert_eq!(obj.child("v").and_then(Node::text), Some("5"));
    }

    #[test]
    fn unreadable_property_is_marked() {
        struct Broken;
        impl Introspectable for Broken {
            fn type_name(&self) -> &str {
                "Broken"
            }
            fn property_names(&self) -> Vec<String> {
                vec!["bad".into()]
            }
            fn property_value(&self, _name: &str) -> anyhow::Result<Value> {
                anyhow::bail!("getter failed")
            }
        }
        let node = walker(WalkLimits::default()).walk("b", &Broken, None).unwrap();
        assert_eq!(node.child("bad").unwrap().truncation(), Some(Truncation::Unreadable));
    }

    #[test]
    fn filter_applies_to_identified_objects() {
        struct HidePassword;
        impl PropertyFilter for HidePassword {
            fn exclusion(&self, identity: &ResourceName) -> Exclusion {
                if identity.domain() == "db" {
                    Exclusion::Names(HashSet::from(["password".to_string()]))
                } else {
                    Exclusion::Nothing
                }
            }
        }

        let nested = Arc::new(Bean {
            type_name: "Pool",
            identity: Some(ResourceName::parse("db:type=Pool").unwrap()),
            scalars: vec![("password", Value::from("s3cret")), ("size", Value::Int(4))],
            links: OnceLock::new(),
        });
        let root = Bean::new("App", vec![("password", Value::from("visible"))]);
        root.link(vec![("pool", nested as ObjectRef)]);

        let filter = HidePassword;
        let node = walker(WalkLimits::default())
            .with_filter(&filter)
            .walk("app", root.as_ref(), Some(&ResourceName::parse("app:type=App").unwrap()))
            .unwrap();
        assert_eq!(node.child("password").and_then(Node::text), Some("visible"));
        let pool = node.child("pool").unwrap();
        assert!(pool.child("password").is_none());
        assert_eq!(pool.child("size").and_then(Node::text), Some("4"));
    }

    #[test]
    fn increasing_depth_expands_further() {
        let c = Bean::new("C", vec![("v", Value::Int(3))]);
        let b = Bean::new("B", vec![]);
        b.link(vec![("c", c as ObjectRef)]);
        let a = Bean::new("A", vec![]);
        a.link(vec![("b", b as ObjectRef)]);

        let depths: Vec<usize> = (1..=4)
            .map(|d| {
                walker(WalkLimits { max_depth: d, ..WalkLimits::default() })
                    .walk("a", a.as_ref(), None)
                    .unwrap()
                    .depth()
            })
            .collect();
        assert_eq!(depths, vec![0, 1, 2, 2]);
    }

    /// Every `next` read builds a new link, so identities never repeat.
    struct LazyChain(usize);

    impl Introspectable for LazyChain {
        fn type_name(&self) -> &str {
            "Link"
        }

        fn property_names(&self) -> Vec<String> {
            vec!["n".into(), "next".into()]
        }

        fn property_value(&self, name: &str) -> anyhow::Result<Value> {
            match name {
                "n" => Ok(Value::Long(i64::try_from(self.0)?)),
                "next" if self.0 < 100_000 => Ok(Value::object(LazyChain(self.0 + 1))),
                "next" => Ok(Value::Null),
                other => anyhow::bail!("no property {other}"),
            }
        }
    }

    #[test]
    fn unbounded_depth_stops_at_nesting_limit() {
        let node = GraphWalker::new(
            WalkLimits { max_depth: usize::MAX, ..WalkLimits::default() },
            8 * 1024 * 1024,
        )
        .walk("head", &LazyChain(0), None)
        .unwrap();
        assert_eq!(node.depth(), MAX_NESTING - 1);

        let mut last = &node;
        while let Some(next) = last.child("next").filter(|n| n.is_expanded()) {
            last = next;
        }
        assert_eq!(last.child("n").and_then(Node::text), Some("127"));
        assert_eq!(last.child("next").unwrap().truncation(), Some(Truncation::Depth));
    }

    #[test]
    fn nested_sequences_stop_at_nesting_limit() {
        let mut value = Value::Int(1);
        for _ in 0..(MAX_NESTING + 10) {
            value = Value::sequence("int[]", vec![value]);
        }
        let node = walker(WalkLimits::default()).walk_value("deep", &value).unwrap();

        let mut cursor = &node;
        let mut levels = 0;
        while let Some(inner) = cursor.element(0) {
            cursor = inner;
            levels += 1;
        }
        assert_eq!(levels, MAX_NESTING);
        assert_eq!(cursor.truncation(), Some(Truncation::Depth));
    }

    proptest! {
        /// Random graphs with arbitrary back edges always terminate and never
        /// re-enter an object on its own path.
        #[test]
        fn random_cyclic_graphs_terminate(
            size in 1usize..8,
            edges in proptest::collection::vec((0usize..8, 0usize..8), 0..20),
        ) {
            let beans: Vec<Arc<Bean>> = (0..size).map(|_| Bean::new("N", vec![])).collect();
            for (i, bean) in beans.iter().enumerate() {
                let links = edges
                    .iter()
                    .filter(|(from, _)| from % size == i)
                    .enumerate()
                    .map(|(k, (_, to))| (format!("e{k}"), beans[to % size].clone() as ObjectRef))
                    .collect::<Vec<_>>();
                let _ = bean.links.set(links);
            }

            let node = GraphWalker::new(
                WalkLimits { max_depth: usize::MAX, ..WalkLimits::default() },
                usize::MAX,
            )
            .walk("root", beans[0].as_ref(), None)
            .unwrap();
            prop_assert!(node.depth() <= size);
        }
    }
}
