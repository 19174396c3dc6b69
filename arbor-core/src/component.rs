//! Components
//!
//! A [`Component`] binds the engine to one host element:
//!
//! 1. Inputs ([`Attribute`], [`State`], [`ChildCollection`]) report changes
//!    to the component the moment they happen.
//! 2. Each change marks matching effects dirty, is re-dispatched on the
//!    lifecycle bus and requests an update.
//! 3. Requests within one turn coalesce into a single deferred pass.
//! 4. The pass runs before-update effects, calls the renderer, patches the
//!    retained tree under the component's container, then runs
//!    after-update effects once the patch is committed.
//!
//! The host is shared as `Rc<RefCell<H>>` so embedders can mutate it
//! between passes and report what they changed through
//! [`Component::attributes_changed`] and [`Component::observe_children`].

use std::cell::{Cell, RefCell};
use std::fmt;
use std::rc::{Rc, Weak};

use indexmap::IndexMap;
use tracing::{debug, instrument, trace, warn};

use crate::config::Config;
use crate::effect::{
    Activation, Cleanup, Dependency, EffectHandle, EffectRegistry, Inputs, Phase, PhasedEffect,
    Trigger,
};
use crate::error::{Error, Result};
use crate::host::{Host, NodeId};
use crate::lifecycle::{Lifecycle, LifecycleEvent};
use crate::scheduler::{AfterCommit, Deferral, UpdateScheduler};
use crate::tracking::{
    snapshot, Attribute, AttributeValue, Change, ChangeKind, ChangeSink, ChildChanges,
    ChildCollection, ChildMutations, ObservedAttribute, State,
};
use crate::vdom::{Reconciler, VNode};

/// Produces the declarative tree for one pass.
pub type Renderer = dyn FnMut(&Inputs) -> Result<VNode>;

/// A reactive component rendering into a host element.
///
/// Cloning is cheap and yields another handle to the same component.
pub struct Component<H: Host + 'static> {
    core: Rc<Core<H>>,
}

struct Core<H: Host + 'static> {
    this: Weak<Core<H>>,
    host: Rc<RefCell<H>>,
    element: NodeId,
    config: Config,
    connected: Cell<bool>,
    mounted: Cell<bool>,
    torn_down: Cell<bool>,
    reconciler: RefCell<Reconciler>,
    renderer: RefCell<Option<Box<Renderer>>>,
    inputs: Inputs,
    attributes: RefCell<IndexMap<String, Rc<dyn ObservedAttribute>>>,
    collections: RefCell<Vec<ChildCollection>>,
    effects: EffectRegistry,
    lifecycle: Lifecycle,
    scheduler: UpdateScheduler,
}

impl<H: Host + 'static> Component<H> {
    /// Create a component for `element`. A container element is appended
    /// to it; rendered output lives inside the container so other children
    /// of `element` are left alone.
    pub fn new<D>(host: Rc<RefCell<H>>, element: NodeId, config: Config, deferral: D) -> Result<Self>
    where
        D: Deferral + 'static,
    {
        let container = {
            let mut h = host.try_borrow_mut().map_err(|_| Error::HostBusy)?;
            let container = h.create_element(&config.root_tag);
            if !config.root_classes.is_empty() {
                h.set_attribute(container, "class", &config.root_classes.join(" "));
            }
            h.append_child(element, container);
            container
        };
        debug!(%element, %container, "component created");

        let reconciler = Reconciler::new(container, &config.root_tag, config.clone());
        let core = Rc::new_cyclic(|this: &Weak<Core<H>>| {
            let weak = this.clone();
            let scheduler = UpdateScheduler::new(deferral, move || match weak.upgrade() {
                Some(core) => core.pass(),
                None => Ok(None),
            });
            Core {
                this: this.clone(),
                host,
                element,
                config,
                connected: Cell::new(false),
                mounted: Cell::new(false),
                torn_down: Cell::new(false),
                reconciler: RefCell::new(reconciler),
                renderer: RefCell::new(None),
                inputs: Inputs::new(),
                attributes: RefCell::new(IndexMap::new()),
                collections: RefCell::new(Vec::new()),
                effects: EffectRegistry::new(),
                lifecycle: Lifecycle::new(),
                scheduler,
            }
        });
        Ok(Self { core })
    }

    /// Set the function that produces the tree on every pass.
    pub fn set_renderer<F>(&self, renderer: F)
    where
        F: FnMut(&Inputs) -> Result<VNode> + 'static,
    {
        *self.core.renderer.borrow_mut() = Some(Box::new(renderer));
    }

    /// Register an attribute input. The initial value is parsed from the
    /// host element's current attribute.
    pub fn attribute<V, P>(&self, name: &str, parser: P) -> Result<Attribute<V>>
    where
        V: AttributeValue,
        P: Fn(Option<&str>) -> V + 'static,
    {
        let attribute = Attribute::new(name, parser);
        let raw = self.read_attribute(attribute.name())?;
        attribute.reset(raw.as_deref());
        attribute.attach(self.sink());

        let observed = attribute.clone();
        self.core.inputs.register(
            ChangeKind::Attribute,
            attribute.name(),
            Rc::new(move || ObservedAttribute::snapshot(&observed)),
        );
        self.core
            .attributes
            .borrow_mut()
            .insert(attribute.name().to_string(), Rc::new(attribute.clone()));
        Ok(attribute)
    }

    /// Register a state input.
    pub fn state<T>(&self, name: &str, initial: T) -> State<T>
    where
        T: Clone + PartialEq + serde::Serialize + 'static,
    {
        let state = State::new(name, initial);
        state.attach(self.sink());

        let observed = state.clone();
        self.core
            .inputs
            .register(ChangeKind::State, name, Rc::new(move || observed.snapshot()));
        state
    }

    /// Register a child collection over the host children of the element
    /// that satisfy `filter`.
    pub fn children<F>(&self, name: &str, filter: F) -> ChildCollection
    where
        F: Fn(&H, NodeId) -> bool + 'static,
    {
        let host = Rc::clone(&self.core.host);
        let collection = ChildCollection::new(name, move |node| {
            host.try_borrow().map_or(false, |h| filter(&*h, node))
        });
        self.add_collection(collection)
    }

    /// Like [`Component::children`] with a custom update policy deciding
    /// whether a batch of changes warrants a pass.
    pub fn children_with_policy<F, P>(&self, name: &str, filter: F, policy: P) -> ChildCollection
    where
        F: Fn(&H, NodeId) -> bool + 'static,
        P: Fn(&[NodeId], &ChildChanges) -> bool + 'static,
    {
        let host = Rc::clone(&self.core.host);
        let collection = ChildCollection::with_policy(
            name,
            move |node| host.try_borrow().map_or(false, |h| filter(&*h, node)),
            policy,
        );
        self.add_collection(collection)
    }

    /// Register an effect that runs after the patch is committed.
    ///
    /// `selector` runs once, now, against the registered inputs. `None`
    /// means every pass, an empty list means once.
    pub fn effect<F, S>(&self, callback: F, selector: S) -> EffectHandle
    where
        F: FnMut(Activation) -> Result<Option<Cleanup>> + 'static,
        S: FnOnce(&Inputs) -> Option<Vec<Dependency>>,
    {
        self.register_effect(Phase::AfterUpdate, callback, selector)
    }

    /// Register an effect that runs right before the tree is regenerated.
    pub fn immediate_effect<F, S>(&self, callback: F, selector: S) -> EffectHandle
    where
        F: FnMut(Activation) -> Result<Option<Cleanup>> + 'static,
        S: FnOnce(&Inputs) -> Option<Vec<Dependency>>,
    {
        self.register_effect(Phase::BeforeUpdate, callback, selector)
    }

    /// Start observing and request the first pass.
    #[instrument(skip_all, fields(element = %self.core.element))]
    pub fn connect(&self) -> Result<()> {
        if self.core.connected.replace(true) {
            return Ok(());
        }
        // Attributes may have been written while disconnected.
        let names: Vec<String> = self.core.attributes.borrow().keys().cloned().collect();
        self.sync_attributes(&names)?;

        self.core.lifecycle.dispatch(&LifecycleEvent::WillMount);
        self.core.request_update();
        Ok(())
    }

    /// Stop observing. Update requests are ignored until reconnected.
    pub fn disconnect(&self) {
        if self.core.connected.replace(false) {
            debug!(element = %self.core.element, "component disconnected");
        }
    }

    /// Ask for a pass. Ignored while disconnected.
    pub fn request_update(&self) {
        self.core.request_update();
    }

    /// Report that the host attributes named in `names` may have changed.
    /// Returns how many attribute inputs actually changed value.
    pub fn attributes_changed(&self, names: &[&str]) -> Result<usize> {
        if !self.core.connected.get() {
            return Err(Error::NotConnected);
        }
        let names: Vec<String> = names.iter().map(|name| name.to_lowercase()).collect();
        self.sync_attributes(&names)
    }

    /// Report structural changes to the element's children.
    pub fn observe_children(&self, mutations: ChildMutations) -> Result<Vec<ChildChanges>> {
        if !self.core.connected.get() {
            return Err(Error::NotConnected);
        }
        let collections = self.core.collections.borrow().clone();
        Ok(collections
            .iter()
            .map(|collection| collection.observe(mutations.clone()))
            .collect())
    }

    /// Unsubscribe every effect, running cleanups, and destroy the
    /// rendered tree. A pass that is already pending does nothing when it
    /// runs.
    pub fn teardown(&self) -> Result<()> {
        self.core.connected.set(false);
        self.core.torn_down.set(true);
        self.core.effects.tear_down_all();
        self.core.lifecycle.clear();

        let mut host = self.core.host.try_borrow_mut().map_err(|_| Error::HostBusy)?;
        self.core.reconciler.borrow_mut().clear(&mut *host);
        self.core.mounted.set(false);
        debug!(element = %self.core.element, "component torn down");
        Ok(())
    }

    pub fn host(&self) -> &Rc<RefCell<H>> {
        &self.core.host
    }

    pub fn element(&self) -> NodeId {
        self.core.element
    }

    /// The node rendered output is placed in.
    pub fn container(&self) -> NodeId {
        self.core.reconciler.borrow().container()
    }

    pub fn config(&self) -> &Config {
        &self.core.config
    }

    pub fn inputs(&self) -> &Inputs {
        &self.core.inputs
    }

    pub fn lifecycle(&self) -> &Lifecycle {
        &self.core.lifecycle
    }

    pub fn scheduler(&self) -> &UpdateScheduler {
        &self.core.scheduler
    }

    pub fn effects(&self) -> &EffectRegistry {
        &self.core.effects
    }

    pub fn is_connected(&self) -> bool {
        self.core.connected.get()
    }

    /// Whether the first pass has been committed.
    pub fn is_mounted(&self) -> bool {
        self.core.mounted.get()
    }

    fn sink(&self) -> Weak<dyn ChangeSink> {
        let weak: Weak<Core<H>> = Rc::downgrade(&self.core);
        weak
    }

    fn read_attribute(&self, name: &str) -> Result<Option<String>> {
        let host = self.core.host.try_borrow().map_err(|_| Error::HostBusy)?;
        Ok(host.attribute(self.core.element, name))
    }

    fn sync_attributes(&self, names: &[String]) -> Result<usize> {
        let targets: Vec<(Rc<dyn ObservedAttribute>, Option<String>)> = {
            let attributes = self.core.attributes.borrow();
            let host = self.core.host.try_borrow().map_err(|_| Error::HostBusy)?;
            names
                .iter()
                .filter_map(|name| {
                    let attribute = attributes.get(name)?;
                    Some((Rc::clone(attribute), host.attribute(self.core.element, name)))
                })
                .collect()
        };

        let changed = targets
            .iter()
            .filter(|(attribute, raw)| attribute.sync_down(raw.as_deref()))
            .count();
        Ok(changed)
    }

    fn add_collection(&self, collection: ChildCollection) -> ChildCollection {
        collection.attach(self.sink());

        let observed = collection.clone();
        self.core.inputs.register(
            ChangeKind::Children,
            collection.name(),
            Rc::new(move || snapshot(&observed.current())),
        );
        self.core.collections.borrow_mut().push(collection.clone());

        if self.core.mounted.get() {
            if let Err(err) = self.core.initialize_collections(std::slice::from_ref(&collection)) {
                warn!(error = %err, collection = collection.name(), "could not read host children");
            }
        }
        collection
    }

    fn register_effect<F, S>(&self, phase: Phase, callback: F, selector: S) -> EffectHandle
    where
        F: FnMut(Activation) -> Result<Option<Cleanup>> + 'static,
        S: FnOnce(&Inputs) -> Option<Vec<Dependency>>,
    {
        let trigger = Trigger::from_selection(selector(&self.core.inputs));
        self.core
            .effects
            .register(PhasedEffect::new(phase, trigger, callback))
    }
}

impl<H: Host + 'static> Core<H> {
    fn request_update(&self) {
        if !self.connected.get() {
            trace!(element = %self.element, "update requested while disconnected; ignored");
            return;
        }
        self.scheduler.request();
    }

    /// One update pass, up to and including the patch.
    fn pass(&self) -> Result<Option<AfterCommit>> {
        if self.torn_down.get() {
            trace!(element = %self.element, "pass skipped after teardown");
            return Ok(None);
        }
        self.lifecycle.dispatch(&LifecycleEvent::WillUpdate);
        self.effects.run_phase(Phase::BeforeUpdate)?;

        let tree = self.render()?;
        {
            let mut host = self.host.try_borrow_mut().map_err(|_| Error::HostBusy)?;
            let children: Vec<VNode> = tree.into_iter().collect();
            self.reconciler.borrow_mut().render(&mut *host, &children);
        }

        let first_mount = !self.mounted.replace(true);
        let this = self.this.clone();
        Ok(Some(Box::new(move || match this.upgrade() {
            Some(core) => core.commit(first_mount),
            None => Ok(()),
        })))
    }

    fn render(&self) -> Result<Option<VNode>> {
        // Taken out so the renderer may replace itself.
        let renderer = self.renderer.borrow_mut().take();
        let Some(mut renderer) = renderer else {
            return Ok(None);
        };
        let tree = renderer(&self.inputs);
        {
            let mut slot = self.renderer.borrow_mut();
            if slot.is_none() {
                *slot = Some(renderer);
            }
        }
        tree.map(Some).map_err(Error::into_render)
    }

    fn commit(&self, first_mount: bool) -> Result<()> {
        if first_mount {
            self.lifecycle.dispatch(&LifecycleEvent::DidMount);
            let collections = self.collections.borrow().clone();
            self.initialize_collections(&collections)?;
        }
        self.lifecycle.dispatch(&LifecycleEvent::DidUpdate);
        self.effects.run_phase(Phase::AfterUpdate)?;
        Ok(())
    }

    /// Populate collections from the element's current children, excluding
    /// the render container.
    fn initialize_collections(&self, collections: &[ChildCollection]) -> Result<()> {
        if collections.is_empty() {
            return Ok(());
        }
        let children: Vec<NodeId> = {
            let host = self.host.try_borrow().map_err(|_| Error::HostBusy)?;
            let container = self.reconciler.borrow().container();
            host.children(self.element)
                .into_iter()
                .filter(|&child| child != container)
                .collect()
        };
        for collection in collections {
            collection.initialize(&children);
        }
        Ok(())
    }
}

impl<H: Host + 'static> ChangeSink for Core<H> {
    fn changed(&self, change: Change) {
        self.effects.notify(&change);
        self.lifecycle.dispatch(&LifecycleEvent::Changed(change));
    }

    fn request_update(&self) {
        Core::request_update(self);
    }

    fn write_attribute(&self, name: &str, value: Option<&str>) {
        let Ok(mut host) = self.host.try_borrow_mut() else {
            warn!(attribute = name, "host busy; attribute not written back");
            return;
        };
        match value {
            Some(value) => host.set_attribute(self.element, name, value),
            None => host.remove_attribute(self.element, name),
        }
    }
}

impl<H: Host + 'static> Clone for Component<H> {
    fn clone(&self) -> Self {
        Self {
            core: Rc::clone(&self.core),
        }
    }
}

impl<H: Host + 'static> fmt::Debug for Component<H> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Component")
            .field("element", &self.core.element)
            .field("connected", &self.core.connected.get())
            .field("mounted", &self.core.mounted.get())
            .field("inputs", &self.core.inputs)
            .field("effects", &self.core.effects.len())
            .field("scheduler", &self.core.scheduler)
            .finish()
    }
}
