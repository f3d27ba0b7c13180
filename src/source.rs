use crate::reactive::{Observable, Subscription};
use crate::ObjectRef;

/// Where a binding's object reference comes from: a fixed value or a live
/// observable cell. The variant is chosen at construction, so no runtime
/// type inspection is ever needed.
#[derive(Clone)]
pub enum RefSource {
    Fixed(Option<ObjectRef>),
    Observed(Observable<Option<ObjectRef>>),
}

impl RefSource {
    /// The reference as of now
    pub fn current(&self) -> Option<ObjectRef> {
        match self {
            Self::Fixed(reference) => reference.clone(),
            Self::Observed(cell) => cell.get(),
        }
    }

    /// Change notifications. Fixed sources cannot change, so there is
    /// nothing to watch.
    pub fn watch<F>(&self, listener: F) -> Option<Subscription>
    where
        F: Fn(&Option<ObjectRef>) + Send + Sync + 'static,
    {
        match self {
            Self::Fixed(_) => None,
            Self::Observed(cell) => Some(cell.subscribe(listener)),
        }
    }

    pub fn is_observed(&self) -> bool {
        matches!(self, Self::Observed(_))
    }
}

impl From<ObjectRef> for RefSource {
    fn from(reference: ObjectRef) -> Self {
        Self::Fixed(Some(reference))
    }
}

impl From<Option<ObjectRef>> for RefSource {
    fn from(reference: Option<ObjectRef>) -> Self {
        Self::Fixed(reference)
    }
}

impl From<Observable<Option<ObjectRef>>> for RefSource {
    fn from(cell: Observable<Option<ObjectRef>>) -> Self {
        Self::Observed(cell)
    }
}

impl From<&Observable<Option<ObjectRef>>> for RefSource {
    fn from(cell: &Observable<Option<ObjectRef>>) -> Self {
        Self::Observed(cell.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn fixed_sources_have_nothing_to_watch() {
        let source = RefSource::from(ObjectRef::new("media", "ref1"));
        assert!(!source.is_observed());
        assert!(source.watch(|_| {}).is_none());
        assert_eq!(source.current(), Some(ObjectRef::new("media", "ref1")));
    }

    #[test]
    fn observed_sources_notify_on_change() {
        let cell = Observable::new(Some(ObjectRef::new("media", "ref1")));
        let source = RefSource::from(&cell);
        let fired = Arc::new(AtomicU32::new(0));
        let sink = fired.clone();
        let _sub = source.watch(move |_| {
            sink.fetch_add(1, Ordering::SeqCst);
        });

        cell.set(None);
        assert_eq!(source.current(), None);
        assert_eq!(fired.load(Ordering::SeqCst), 1);
    }
}
