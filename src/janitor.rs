//! Resource ownership and release
//!
//! A [`ResourceJanitor`] collects everything a component owns (subscriptions,
//! cleanup closures, child janitors, host-side objects) and releases all of
//! it exactly once in [`ResourceJanitor::release_all`].
//!
//! Release runs in two phases. Listener groups are cleared first, so no event
//! fires into a half-torn-down component. Everything else is then released in
//! registration order. Release callbacks may register more resources into
//! the same janitor; those are released by the same call.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};

use crate::signal::Subscription;

/// Something that can be torn down
pub trait Dispose {
    fn dispose(&mut self);
}

/// A collection of listeners that can be dropped in bulk
pub trait ListenerGroup {
    fn clear_listeners(&self);
}

/// Handle of an object owned by the host (an engine entity, a sound voice)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ObjectId(pub u64);

/// Host side that destroys objects referenced by [`ObjectId`]
pub trait ObjectHost {
    fn destroy_object(&self, id: ObjectId);
}

/// Anything a janitor can own
pub enum Resource {
    /// Cleared in the first release phase
    Listeners(Box<dyn ListenerGroup>),
    Disposable(Box<dyn Dispose>),
    Cleanup(Box<dyn FnOnce()>),
    /// Destroyed through the janitor's [`ObjectHost`]
    Owned(ObjectId),
}

impl Resource {
    pub fn listeners(group: impl ListenerGroup + 'static) -> Self {
        Resource::Listeners(Box::new(group))
    }

    pub fn disposable(item: impl Dispose + 'static) -> Self {
        Resource::Disposable(Box::new(item))
    }

    pub fn cleanup(action: impl FnOnce() + 'static) -> Self {
        Resource::Cleanup(Box::new(action))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Resource::Listeners(_) => "listeners",
            Resource::Disposable(_) => "disposable",
            Resource::Cleanup(_) => "cleanup",
            Resource::Owned(_) => "owned",
        }
    }
}

impl fmt::Debug for Resource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Resource::Owned(id) => f.debug_tuple("Owned").field(id).finish(),
            other => f.write_str(other.kind()),
        }
    }
}

/// Position of a task in its janitor. Ids from before a `release_all` no
/// longer match anything.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TaskId {
    index: usize,
    generation: u64,
}

#[derive(Default)]
struct JanitorInner {
    tasks: Vec<Option<Resource>>,
    host: Option<Rc<dyn ObjectHost>>,
    /// Bumped by every `release_all`
    generation: u64,
    parent: Option<Weak<RefCell<JanitorInner>>>,
    /// Our slot in the parent while attached
    parent_task: Option<TaskId>,
}

/// Shared owner of resources.
///
/// Cloning yields another handle to the same janitor, so release callbacks
/// can register into the janitor that is releasing them.
#[derive(Clone, Default)]
pub struct ResourceJanitor {
    inner: Rc<RefCell<JanitorInner>>,
}

impl fmt::Debug for ResourceJanitor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("ResourceJanitor")
            .field("tasks", &inner.tasks)
            .field("has_host", &inner.host.is_some())
            .field("attached", &inner.parent_task.is_some())
            .finish()
    }
}

impl ResourceJanitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Janitor that hands [`Resource::Owned`] entries to `host`
    pub fn with_host(host: Rc<dyn ObjectHost>) -> Self {
        let janitor = Self::new();
        janitor.inner.borrow_mut().host = Some(host);
        janitor
    }

    /// Janitor released by this one, sharing its object host.
    ///
    /// A child released on its own detaches from the parent, and attaches
    /// again when it is given a new task.
    pub fn new_child(&self) -> ResourceJanitor {
        let child = ResourceJanitor {
            inner: Rc::new(RefCell::new(JanitorInner {
                host: self.inner.borrow().host.clone(),
                parent: Some(Rc::downgrade(&self.inner)),
                ..JanitorInner::default()
            })),
        };
        child.attach();
        child
    }

    fn attach(&self) {
        let parent = {
            let inner = self.inner.borrow();
            if inner.parent_task.is_some() {
                return;
            }
            inner.parent.as_ref().and_then(Weak::upgrade)
        };
        if let Some(parent) = parent {
            let id = ResourceJanitor { inner: parent }.give_disposable(self.clone());
            self.inner.borrow_mut().parent_task = Some(id);
        }
    }

    fn detach(&self) {
        let (parent, id) = {
            let mut inner = self.inner.borrow_mut();
            (inner.parent.as_ref().and_then(Weak::upgrade), inner.parent_task.take())
        };
        if let (Some(parent), Some(id)) = (parent, id) {
            ResourceJanitor { inner: parent }.remove_task(id);
        }
    }

    pub fn give_task(&self, resource: Resource) -> TaskId {
        let id = {
            let mut inner = self.inner.borrow_mut();
            inner.tasks.push(Some(resource));
            TaskId {
                index: inner.tasks.len() - 1,
                generation: inner.generation,
            }
        };
        self.attach();
        id
    }

    pub fn give_subscription<T: 'static>(&self, subscription: Subscription<T>) -> TaskId {
        self.give_task(Resource::disposable(subscription))
    }

    pub fn give_cleanup(&self, action: impl FnOnce() + 'static) -> TaskId {
        self.give_task(Resource::cleanup(action))
    }

    pub fn give_disposable(&self, item: impl Dispose + 'static) -> TaskId {
        self.give_task(Resource::disposable(item))
    }

    pub fn give_object(&self, id: ObjectId) -> TaskId {
        self.give_task(Resource::Owned(id))
    }

    pub fn give_listeners(&self, group: impl ListenerGroup + 'static) -> TaskId {
        self.give_task(Resource::listeners(group))
    }

    /// Take a task back without releasing it
    pub fn remove_task(&self, id: TaskId) -> Option<Resource> {
        let mut inner = self.inner.borrow_mut();
        if inner.generation != id.generation {
            return None;
        }
        inner.tasks.get_mut(id.index).and_then(Option::take)
    }

    /// Tasks still waiting for release
    pub fn len(&self) -> usize {
        self.inner
            .borrow()
            .tasks
            .iter()
            .filter(|t| t.is_some())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Release every task exactly once. Safe to call repeatedly.
    pub fn release_all(&self) {
        let mut released = 0usize;

        // Phase 1: listener groups
        let mut i = 0;
        loop {
            let group = {
                let mut inner = self.inner.borrow_mut();
                let Some(slot) = inner.tasks.get_mut(i) else {
                    break;
                };
                match slot.take() {
                    Some(Resource::Listeners(group)) => Some(group),
                    other => {
                        *slot = other;
                        None
                    }
                }
            };
            if let Some(group) = group {
                group.clear_listeners();
                released += 1;
            }
            i += 1;
        }

        // Phase 2: everything else, re-reading the length every step
        let mut i = 0;
        loop {
            let task = {
                let mut inner = self.inner.borrow_mut();
                match inner.tasks.get_mut(i) {
                    Some(slot) => slot.take(),
                    None => break,
                }
            };
            if let Some(task) = task {
                self.release(task);
                released += 1;
            }
            i += 1;
        }

        {
            let mut inner = self.inner.borrow_mut();
            inner.tasks.clear();
            inner.generation += 1;
        }
        self.detach();
        if released > 0 {
            log::debug!("janitor released {} task(s)", released);
        }
    }

    fn release(&self, task: Resource) {
        match task {
            Resource::Listeners(group) => group.clear_listeners(),
            Resource::Disposable(mut item) => item.dispose(),
            Resource::Cleanup(action) => action(),
            Resource::Owned(id) => {
                let host = self.inner.borrow().host.clone();
                match host {
                    Some(host) => host.destroy_object(id),
                    None => log::warn!("no object host, dropping {:?}", id),
                }
            }
        }
    }
}

impl Dispose for ResourceJanitor {
    fn dispose(&mut self) {
        self.release_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::ObservableValue;
    use std::cell::Cell;

    type Trace = Rc<RefCell<Vec<&'static str>>>;

    struct Group {
        trace: Trace,
    }

    impl ListenerGroup for Group {
        fn clear_listeners(&self) {
            self.trace.borrow_mut().push("listeners");
        }
    }

    #[derive(Default)]
    struct RecordingHost {
        destroyed: RefCell<Vec<ObjectId>>,
    }

    impl ObjectHost for RecordingHost {
        fn destroy_object(&self, id: ObjectId) {
            self.destroyed.borrow_mut().push(id);
        }
    }

    #[test]
    fn test_task_registered_during_release_is_released() {
        let janitor = ResourceJanitor::new();
        let trace: Trace = Rc::default();

        let inner = janitor.clone();
        let t = Rc::clone(&trace);
        janitor.give_cleanup(move || {
            t.borrow_mut().push("a");
            let t = Rc::clone(&t);
            inner.give_cleanup(move || t.borrow_mut().push("b"));
        });

        janitor.release_all();
        assert_eq!(*trace.borrow(), vec!["a", "b"]);
        assert!(janitor.is_empty());
    }

    #[test]
    fn test_release_all_is_idempotent() {
        let janitor = ResourceJanitor::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        janitor.give_cleanup(move || h.set(h.get() + 1));

        janitor.release_all();
        janitor.release_all();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_listener_groups_go_first() {
        let janitor = ResourceJanitor::new();
        let trace: Trace = Rc::default();

        let t = Rc::clone(&trace);
        janitor.give_cleanup(move || t.borrow_mut().push("first cleanup"));
        janitor.give_listeners(Group {
            trace: Rc::clone(&trace),
        });
        let t = Rc::clone(&trace);
        janitor.give_cleanup(move || t.borrow_mut().push("second cleanup"));

        janitor.release_all();
        assert_eq!(
            *trace.borrow(),
            vec!["listeners", "first cleanup", "second cleanup"]
        );
    }

    #[test]
    fn test_owned_objects_go_to_host() {
        let host = Rc::new(RecordingHost::default());
        let janitor = ResourceJanitor::with_host(host.clone());
        janitor.give_object(ObjectId(7));
        janitor.give_object(ObjectId(3));
        janitor.release_all();
        assert_eq!(*host.destroyed.borrow(), vec![ObjectId(7), ObjectId(3)]);
    }

    #[test]
    fn test_owned_object_without_host_is_dropped() {
        let janitor = ResourceJanitor::new();
        janitor.give_object(ObjectId(1));
        janitor.release_all();
        assert!(janitor.is_empty());
    }

    #[test]
    fn test_removed_task_is_not_released() {
        let janitor = ResourceJanitor::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        let id = janitor.give_cleanup(move || h.set(h.get() + 1));
        assert_eq!(janitor.len(), 1);

        let task = janitor.remove_task(id);
        assert!(matches!(task, Some(Resource::Cleanup(_))));
        assert!(janitor.remove_task(id).is_none());

        janitor.release_all();
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_stale_task_id_matches_nothing() {
        let janitor = ResourceJanitor::new();
        let old = janitor.give_cleanup(|| {});
        janitor.release_all();

        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        janitor.give_cleanup(move || h.set(h.get() + 1));

        assert!(janitor.remove_task(old).is_none());
        janitor.release_all();
        assert_eq!(hits.get(), 1);
    }

    #[test]
    fn test_child_released_early_detaches_and_reattaches() {
        let parent = ResourceJanitor::new();
        let child = parent.new_child();
        assert_eq!(parent.len(), 1);

        child.release_all();
        assert!(parent.is_empty());

        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        child.give_cleanup(move || h.set(h.get() + 1));
        assert_eq!(parent.len(), 1);

        parent.release_all();
        assert_eq!(hits.get(), 1);
        assert!(parent.is_empty());
    }

    #[test]
    fn test_child_inherits_host() {
        let host = Rc::new(RecordingHost::default());
        let parent = ResourceJanitor::with_host(host.clone());
        parent.new_child().give_object(ObjectId(5));
        parent.release_all();
        assert_eq!(*host.destroyed.borrow(), vec![ObjectId(5)]);
    }

    #[test]
    fn test_subscriptions_and_values_are_silenced() {
        let janitor = ResourceJanitor::new();
        let value = ObservableValue::new(0);
        let hits = Rc::new(Cell::new(0));

        let h = Rc::clone(&hits);
        let sub = value.connect(move |_| {
            h.set(h.get() + 1);
            true
        });
        janitor.give_subscription(sub);

        let other = ObservableValue::new(0);
        let h = Rc::clone(&hits);
        other.connect(move |_| {
            h.set(h.get() + 1);
            true
        });
        janitor.give_listeners(other.clone());

        janitor.release_all();
        value.set(1);
        other.set(1);
        assert_eq!(hits.get(), 0);
    }

    #[test]
    fn test_child_janitor_released_through_parent() {
        let parent = ResourceJanitor::new();
        let child = ResourceJanitor::new();
        let hits = Rc::new(Cell::new(0));
        let h = Rc::clone(&hits);
        child.give_cleanup(move || h.set(h.get() + 1));
        parent.give_disposable(child.clone());

        parent.release_all();
        assert_eq!(hits.get(), 1);
        assert!(child.is_empty());
    }
}
