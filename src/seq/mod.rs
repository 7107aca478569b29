//! Lazy sequence engine
//!
//! Every graph query in the crate is expressed as a [`Seq`]: a restartable,
//! pull-based description of a computation. Nothing runs until a terminal
//! operation pulls, and each terminal operation re-runs the computation from
//! scratch unless the sequence was [`Seq::cache`]d.
//!
//! ## Variants
//!
//! - **Plain**: every enumeration calls the source factory again.
//! - **Cached**: the first enumeration (full or partial) is memoized and
//!   replayed verbatim; the shared source resumes where the furthest consumer
//!   stopped.
//! - **Resumable**: enumerates a [`GrowingSource`] (e.g. the module registry)
//!   with one cursor per consumer, growing the source only when a consumer
//!   runs past what is already known.

use std::cell::RefCell;
use std::collections::HashSet;
use std::hash::Hash;
use std::rc::Rc;

type Factory<T> = dyn Fn() -> Box<dyn Iterator<Item = T>>;

/// A lazily computed, restartable ordered series of values
pub struct Seq<T> {
    factory: Rc<Factory<T>>,
}

impl<T> Clone for Seq<T> {
    fn clone(&self) -> Self {
        Self {
            factory: Rc::clone(&self.factory),
        }
    }
}

impl<T> std::fmt::Debug for Seq<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Seq").finish_non_exhaustive()
    }
}

impl<T: Clone + 'static> Seq<T> {
    /// Build a sequence from an iterator factory, invoked once per enumeration
    pub fn from_fn<F, I>(factory: F) -> Self
    where
        F: Fn() -> I + 'static,
        I: Iterator<Item = T> + 'static,
    {
        Self {
            factory: Rc::new(move || Box::new(factory()) as Box<dyn Iterator<Item = T>>),
        }
    }

    pub fn empty() -> Self {
        Self::from_fn(std::iter::empty)
    }

    /// Sequence over an already materialized vector
    pub fn from_vec(items: Vec<T>) -> Self {
        let items = Rc::new(items);
        Self::from_fn(move || {
            let items = Rc::clone(&items);
            (0..items.len()).map(move |i| items[i].clone())
        })
    }

    /// Single element computed on pull
    pub fn once_with<F>(producer: F) -> Self
    where
        F: Fn() -> T + 'static,
    {
        let producer = Rc::new(producer);
        Self::from_fn(move || {
            let producer = Rc::clone(&producer);
            std::iter::once_with(move || producer())
        })
    }

    /// Start a fresh enumeration
    pub fn iter(&self) -> Box<dyn Iterator<Item = T>> {
        (self.factory)()
    }

    pub fn filter<P>(&self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + 'static,
    {
        let source = self.clone();
        let predicate = Rc::new(predicate);
        Self::from_fn(move || {
            let predicate = Rc::clone(&predicate);
            source.iter().filter(move |item| predicate(item))
        })
    }

    pub fn map<U, F>(&self, mapper: F) -> Seq<U>
    where
        U: Clone + 'static,
        F: Fn(T) -> U + 'static,
    {
        let source = self.clone();
        let mapper = Rc::new(mapper);
        Seq::from_fn(move || {
            let mapper = Rc::clone(&mapper);
            source.iter().map(move |item| mapper(item))
        })
    }

    pub fn flat_map<U, F>(&self, mapper: F) -> Seq<U>
    where
        U: Clone + 'static,
        F: Fn(T) -> Seq<U> + 'static,
    {
        let source = self.clone();
        let mapper = Rc::new(mapper);
        Seq::from_fn(move || {
            let mapper = Rc::clone(&mapper);
            source.iter().flat_map(move |item| mapper(item).iter())
        })
    }

    /// Elements of `self` followed by elements of `other`
    pub fn concat(&self, other: &Seq<T>) -> Self {
        let first = self.clone();
        let second = other.clone();
        Self::from_fn(move || first.iter().chain(second.iter()))
    }

    pub fn limit(&self, max: usize) -> Self {
        let source = self.clone();
        Self::from_fn(move || source.iter().take(max))
    }

    pub fn distinct_by<K, F>(&self, key: F) -> Self
    where
        K: Eq + Hash + 'static,
        F: Fn(&T) -> K + 'static,
    {
        let source = self.clone();
        let key = Rc::new(key);
        Self::from_fn(move || {
            let key = Rc::clone(&key);
            let mut seen = HashSet::new();
            source.iter().filter(move |item| seen.insert(key(item)))
        })
    }

    /// Sorted view; the source is drained on the first pull, not on `iter()`
    pub fn sorted_by_key<K, F>(&self, key: F) -> Self
    where
        K: Ord,
        F: Fn(&T) -> K + 'static,
    {
        let source = self.clone();
        let key = Rc::new(key);
        Self::from_fn(move || {
            let source = source.clone();
            let key = Rc::clone(&key);
            std::iter::once_with(move || {
                let mut items: Vec<T> = source.iter().collect();
                items.sort_by_key(|item| key(item));
                items
            })
            .flatten()
        })
    }

    pub fn for_each<F>(&self, action: F)
    where
        F: FnMut(T),
    {
        self.iter().for_each(action)
    }

    pub fn count(&self) -> usize {
        self.iter().count()
    }

    pub fn find_first(&self) -> Option<T> {
        self.iter().next()
    }

    pub fn find<P>(&self, predicate: P) -> Option<T>
    where
        P: Fn(&T) -> bool,
    {
        self.iter().find(|item| predicate(item))
    }

    pub fn any<P>(&self, predicate: P) -> bool
    where
        P: Fn(&T) -> bool,
    {
        self.iter().any(|item| predicate(&item))
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    pub fn collect_vec(&self) -> Vec<T> {
        self.iter().collect()
    }

    /// Memoize the first enumeration and replay it on every later one
    ///
    /// Consumers share a single live source: a consumer that runs past the
    /// memoized prefix advances the source for everybody, so a partial
    /// enumeration is never repeated.
    pub fn cache(&self) -> Self {
        let origin = self.clone();
        let memo = Rc::new(RefCell::new(Memo {
            items: Vec::new(),
            source: None,
            started: false,
            done: false,
        }));
        Self::from_fn(move || MemoIter {
            memo: Rc::clone(&memo),
            origin: origin.clone(),
            index: 0,
            detached: None,
        })
    }
}

impl<T: Clone + Eq + Hash + 'static> Seq<T> {
    pub fn distinct(&self) -> Self {
        self.distinct_by(|item| item.clone())
    }
}

impl<T: Clone + Ord + 'static> Seq<T> {
    pub fn sorted(&self) -> Self {
        self.sorted_by_key(|item| item.clone())
    }
}

struct Memo<T> {
    items: Vec<T>,
    source: Option<Box<dyn Iterator<Item = T>>>,
    started: bool,
    done: bool,
}

struct MemoIter<T> {
    memo: Rc<RefCell<Memo<T>>>,
    origin: Seq<T>,
    index: usize,
    detached: Option<Box<dyn Iterator<Item = T>>>,
}

impl<T: Clone + 'static> Iterator for MemoIter<T> {
    type Item = T;

    fn next(&mut self) -> Option<T> {
        if let Some(detached) = self.detached.as_mut() {
            return detached.next();
        }

        {
            let memo = self.memo.borrow();
            if self.index < memo.items.len() {
                let item = memo.items[self.index].clone();
                self.index += 1;
                return Some(item);
            }
            if memo.done {
                return None;
            }
        }

        // The source is checked out while its step runs so no borrow is held.
        let checked_out = {
            let mut memo = self.memo.borrow_mut();
            if memo.started {
                memo.source.take()
            } else {
                memo.started = true;
                Some(self.origin.iter())
            }
        };

        let Some(mut source) = checked_out else {
            // Re-entrant pull while the shared source is mid-step.
            let mut detached: Box<dyn Iterator<Item = T>> =
                Box::new(self.origin.iter().skip(self.index));
            let next = detached.next();
            self.detached = Some(detached);
            return next;
        };

        let next = source.next();
        let mut memo = self.memo.borrow_mut();
        match next {
            Some(item) => {
                memo.items.push(item.clone());
                memo.source = Some(source);
                self.index = memo.items.len();
                Some(item)
            }
            None => {
                memo.done = true;
                None
            }
        }
    }
}

/// A monotonically growing backing store shared by resumable consumers
pub trait GrowingSource {
    type Item: Clone;
    type Error: Clone;

    /// Number of slots known so far
    fn available(&self) -> usize;

    /// Item in a slot; `None` marks a retired slot that consumers skip
    fn item_at(&self, index: usize) -> Option<Self::Item>;

    /// Advance the underlying discovery by one step
    ///
    /// Returns `Ok(false)` once nothing more can be discovered.
    fn grow(&self) -> Result<bool, Self::Error>;
}

impl<T, E> Seq<Result<T, E>>
where
    T: Clone + 'static,
    E: Clone + 'static,
{
    /// Resumable enumeration of a shared growing source
    pub fn resumable<S>(source: Rc<S>) -> Self
    where
        S: GrowingSource<Item = T, Error = E> + 'static,
    {
        Self::from_fn(move || ResumeIter {
            source: Rc::clone(&source),
            index: 0,
            failed: false,
        })
    }

    pub fn map_ok<U, F>(&self, mapper: F) -> Seq<Result<U, E>>
    where
        U: Clone + 'static,
        F: Fn(T) -> U + 'static,
    {
        self.map(move |item| item.map(&mapper))
    }

    pub fn and_then_ok<U, F>(&self, mapper: F) -> Seq<Result<U, E>>
    where
        U: Clone + 'static,
        F: Fn(T) -> Result<U, E> + 'static,
    {
        self.map(move |item| item.and_then(&mapper))
    }

    /// Filter successful items; errors always pass through
    pub fn filter_ok<P>(&self, predicate: P) -> Self
    where
        P: Fn(&T) -> bool + 'static,
    {
        self.filter(move |item| match item {
            Ok(value) => predicate(value),
            Err(_) => true,
        })
    }

    pub fn flat_map_ok<U, F>(&self, mapper: F) -> Seq<Result<U, E>>
    where
        U: Clone + 'static,
        F: Fn(T) -> Seq<Result<U, E>> + 'static,
    {
        self.flat_map(move |item| match item {
            Ok(value) => mapper(value),
            Err(e) => Seq::from_vec(vec![Err(e)]),
        })
    }

    pub fn try_collect(&self) -> Result<Vec<T>, E> {
        self.iter().collect()
    }

    pub fn try_find<P>(&self, predicate: P) -> Result<Option<T>, E>
    where
        P: Fn(&T) -> bool,
    {
        for item in self.iter() {
            let value = item?;
            if predicate(&value) {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }

    pub fn try_for_each<F>(&self, mut action: F) -> Result<(), E>
    where
        F: FnMut(T),
    {
        for item in self.iter() {
            action(item?);
        }
        Ok(())
    }
}

struct ResumeIter<S> {
    source: Rc<S>,
    index: usize,
    failed: bool,
}

impl<S: GrowingSource> Iterator for ResumeIter<S> {
    type Item = Result<S::Item, S::Error>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if self.failed {
                return None;
            }
            if self.index < self.source.available() {
                let slot = self.index;
                self.index += 1;
                if let Some(item) = self.source.item_at(slot) {
                    return Some(Ok(item));
                }
                continue;
            }
            match self.source.grow() {
                Ok(true) => continue,
                Ok(false) => return None,
                Err(e) => {
                    self.failed = true;
                    return Some(Err(e));
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    fn counted(pulls: Rc<Cell<usize>>, len: usize) -> Seq<usize> {
        Seq::from_fn(move || {
            let pulls = Rc::clone(&pulls);
            (0..len).inspect(move |_| pulls.set(pulls.get() + 1))
        })
    }

    #[test]
    fn test_operations_are_lazy() {
        let pulls = Rc::new(Cell::new(0));
        let seq = counted(pulls.clone(), 10)
            .map(|n| n * 2)
            .filter(|n| n % 4 == 0)
            .limit(2);
        assert_eq!(pulls.get(), 0);
        assert_eq!(seq.collect_vec(), vec![0, 4]);
        assert_eq!(pulls.get(), 3);
    }

    #[test]
    fn test_plain_sequence_restarts() {
        let pulls = Rc::new(Cell::new(0));
        let seq = counted(pulls.clone(), 5);
        assert_eq!(seq.count(), 5);
        assert_eq!(seq.count(), 5);
        assert_eq!(pulls.get(), 10);
    }

    #[test]
    fn test_cached_sequence_replays() {
        let pulls = Rc::new(Cell::new(0));
        let seq = counted(pulls.clone(), 5).cache();
        assert_eq!(seq.collect_vec(), vec![0, 1, 2, 3, 4]);
        assert_eq!(seq.collect_vec(), vec![0, 1, 2, 3, 4]);
        assert_eq!(pulls.get(), 5);
    }

    #[test]
    fn test_cached_partial_enumeration_resumes() {
        let pulls = Rc::new(Cell::new(0));
        let seq = counted(pulls.clone(), 6).cache();
        assert_eq!(seq.find_first(), Some(0));
        assert_eq!(pulls.get(), 1);
        assert_eq!(seq.limit(3).collect_vec(), vec![0, 1, 2]);
        assert_eq!(pulls.get(), 3);
        assert_eq!(seq.count(), 6);
        assert_eq!(pulls.get(), 6);
    }

    #[test]
    fn test_cached_interleaved_consumers() {
        let seq = Seq::from_vec(vec!['a', 'b', 'c']).cache();
        let mut first = seq.iter();
        let mut second = seq.iter();
        assert_eq!(first.next(), Some('a'));
        assert_eq!(second.next(), Some('a'));
        assert_eq!(second.next(), Some('b'));
        assert_eq!(first.next(), Some('b'));
        assert_eq!(first.next(), Some('c'));
        assert_eq!(second.next(), Some('c'));
        assert_eq!(first.next(), None);
        assert_eq!(second.next(), None);
    }

    #[test]
    fn test_distinct_sorted_concat() {
        let a = Seq::from_vec(vec![3, 1, 3]);
        let b = Seq::from_vec(vec![2, 1]);
        assert_eq!(a.concat(&b).distinct().collect_vec(), vec![3, 1, 2]);
        assert_eq!(a.concat(&b).sorted().collect_vec(), vec![1, 1, 2, 3, 3]);
    }

    #[test]
    fn test_flat_map() {
        let seq = Seq::from_vec(vec![1, 2]).flat_map(|n| Seq::from_vec(vec![n; n]));
        assert_eq!(seq.collect_vec(), vec![1, 2, 2]);
    }

    #[test]
    fn test_fallible_helpers() {
        let seq: Seq<Result<u32, String>> =
            Seq::from_vec(vec![Ok(1), Ok(2), Err("boom".to_string()), Ok(4)]);
        assert_eq!(seq.try_collect(), Err("boom".to_string()));
        assert_eq!(seq.filter_ok(|n| *n > 1).try_find(|n| *n == 2), Ok(Some(2)));
        assert_eq!(seq.map_ok(|n| n * 10).find_first(), Some(Ok(10)));
    }

    struct Counter {
        items: RefCell<Vec<u32>>,
        limit: u32,
        grows: Cell<usize>,
    }

    impl GrowingSource for Counter {
        type Item = u32;
        type Error = String;

        fn available(&self) -> usize {
            self.items.borrow().len()
        }

        fn item_at(&self, index: usize) -> Option<u32> {
            self.items.borrow().get(index).copied().filter(|n| *n != 2)
        }

        fn grow(&self) -> Result<bool, String> {
            self.grows.set(self.grows.get() + 1);
            let mut items = self.items.borrow_mut();
            let next = items.len() as u32;
            if next >= self.limit {
                return Ok(false);
            }
            items.push(next);
            Ok(true)
        }
    }

    #[test]
    fn test_resumable_shares_discovery() {
        let source = Rc::new(Counter {
            items: RefCell::new(Vec::new()),
            limit: 5,
            grows: Cell::new(0),
        });
        let seq = Seq::resumable(Rc::clone(&source));

        assert_eq!(seq.try_find(|n| *n == 1), Ok(Some(1)));
        assert_eq!(source.available(), 2);

        // Second consumer sees known items without growing, then continues
        assert_eq!(seq.try_find(|n| *n == 0), Ok(Some(0)));
        assert_eq!(source.available(), 2);

        // Retired slot (2) is skipped
        assert_eq!(seq.try_collect(), Ok(vec![0, 1, 3, 4]));
        let grows = source.grows.get();
        assert_eq!(seq.try_collect(), Ok(vec![0, 1, 3, 4]));
        assert_eq!(source.grows.get(), grows + 1);
    }
}
