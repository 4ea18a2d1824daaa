//! LRU List Module
//!
//! Recency ordering for cache eviction, stored as a doubly linked list
//! inside an arena so that links are indices instead of pointers.

// == Handle ==
/// Stable slot index of a value in an [`LruList`].
///
/// A handle stays valid until its value is removed; slots are then reused.
pub type Handle = usize;

#[derive(Debug)]
struct Node<T> {
    value: T,
    prev: Option<Handle>,
    next: Option<Handle>,
}

// == LRU List ==
/// Doubly linked recency list.
///
/// - Front (head) = most recently used
/// - Back (tail) = least recently used
#[derive(Debug)]
pub struct LruList<T> {
    slots: Vec<Option<Node<T>>>,
    free: Vec<Handle>,
    head: Option<Handle>,
    tail: Option<Handle>,
    len: usize,
}

impl<T> Default for LruList<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> LruList<T> {
    // == Constructor ==
    pub fn new() -> Self {
        Self {
            slots: Vec::new(),
            free: Vec::new(),
            head: None,
            tail: None,
            len: 0,
        }
    }

    // == Push Front ==
    /// Inserts a value as most recently used and returns its handle.
    pub fn push_front(&mut self, value: T) -> Handle {
        let node = Node {
            value,
            prev: None,
            next: None,
        };
        let handle = match self.free.pop() {
            Some(slot) => {
                self.slots[slot] = Some(node);
                slot
            }
            None => {
                self.slots.push(Some(node));
                self.slots.len() - 1
            }
        };

        self.link_front(handle);
        self.len += 1;
        handle
    }

    // == Touch ==
    /// Marks a value as recently used (moves it to the front).
    ///
    /// Unknown handles are ignored.
    pub fn touch(&mut self, handle: Handle) {
        if self.head == Some(handle) || self.node(handle).is_none() {
            return;
        }
        self.unlink(handle);
        self.link_front(handle);
    }

    // == Remove ==
    /// Removes a value from anywhere in the list.
    pub fn remove(&mut self, handle: Handle) -> Option<T> {
        self.node(handle)?;
        self.unlink(handle);
        self.len -= 1;
        self.free.push(handle);
        self.slots[handle].take().map(|node| node.value)
    }

    // == Evict Oldest ==
    /// Removes and returns the least recently used value.
    ///
    /// Returns None if the list is empty.
    pub fn evict_oldest(&mut self) -> Option<T> {
        let tail = self.tail?;
        self.remove(tail)
    }

    // == Peek ==
    /// Returns the least recently used value without removing it.
    pub fn peek_oldest(&self) -> Option<&T> {
        self.tail.and_then(|h| self.get(h))
    }

    pub fn get(&self, handle: Handle) -> Option<&T> {
        self.node(handle).map(|node| &node.value)
    }

    /// Replaces values in place; recency is untouched.
    pub fn get_mut(&mut self, handle: Handle) -> Option<&mut T> {
        self.node_mut(handle).map(|node| &mut node.value)
    }

    // == Find Oldest ==
    /// Handle of the least recently used value matching `pred`.
    pub fn find_oldest(&self, mut pred: impl FnMut(&T) -> bool) -> Option<Handle> {
        let mut cursor = self.tail;
        while let Some(handle) = cursor {
            let node = self.node(handle)?;
            if pred(&node.value) {
                return Some(handle);
            }
            cursor = node.prev;
        }
        None
    }

    /// Iterates from most to least recently used.
    pub fn iter(&self) -> Iter<'_, T> {
        Iter {
            list: self,
            cursor: self.head,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    fn node(&self, handle: Handle) -> Option<&Node<T>> {
        self.slots.get(handle).and_then(Option::as_ref)
    }

    fn node_mut(&mut self, handle: Handle) -> Option<&mut Node<T>> {
        self.slots.get_mut(handle).and_then(Option::as_mut)
    }

    fn link_front(&mut self, handle: Handle) {
        let old_head = self.head;
        if let Some(node) = self.node_mut(handle) {
            node.prev = None;
            node.next = old_head;
        }
        match old_head {
            Some(h) => {
                if let Some(node) = self.node_mut(h) {
                    node.prev = Some(handle);
                }
            }
            None => self.tail = Some(handle),
        }
        self.head = Some(handle);
    }

    fn unlink(&mut self, handle: Handle) {
        let (prev, next) = match self.node(handle) {
            Some(node) => (node.prev, node.next),
            None => return,
        };

        match prev {
            Some(p) => {
                if let Some(node) = self.node_mut(p) {
                    node.next = next;
                }
            }
            None => self.head = next,
        }
        match next {
            Some(n) => {
                if let Some(node) = self.node_mut(n) {
                    node.prev = prev;
                }
            }
            None => self.tail = prev,
        }

        if let Some(node) = self.node_mut(handle) {
            node.prev = None;
            node.next = None;
        }
    }
}

/// Front-to-back iterator over an [`LruList`].
pub struct Iter<'a, T> {
    list: &'a LruList<T>,
    cursor: Option<Handle>,
}

impl<'a, T> Iterator for Iter<'a, T> {
    type Item = &'a T;

    fn next(&mut self) -> Option<Self::Item> {
        let handle = self.cursor?;
        let node = self.list.node(handle)?;
        self.cursor = node.next;
        Some(&node.value)
    }
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;

    fn order(list: &LruList<&'static str>) -> Vec<&'static str> {
        list.iter().copied().collect()
    }

    #[test]
    fn test_lru_new() {
        let lru: LruList<&str> = LruList::new();
        assert!(lru.is_empty());
        assert_eq!(lru.len(), 0);
        assert_eq!(lru.peek_oldest(), None);
    }

    #[test]
    fn test_lru_push_front_order() {
        let mut lru = LruList::new();
        lru.push_front("key1");
        lru.push_front("key2");
        lru.push_front("key3");

        assert_eq!(lru.len(), 3);
        // key1 is oldest (added first)
        assert_eq!(lru.peek_oldest(), Some(&"key1"));
        assert_eq!(order(&lru), vec!["key3", "key2", "key1"]);
    }

    #[test]
    fn test_lru_touch_existing() {
        let mut lru = LruList::new();
        let k1 = lru.push_front("key1");
        lru.push_front("key2");
        lru.push_front("key3");

        lru.touch(k1);

        assert_eq!(lru.len(), 3);
        assert_eq!(order(&lru), vec!["key1", "key3", "key2"]);
        assert_eq!(lru.peek_oldest(), Some(&"key2"));
    }

    #[test]
    fn test_lru_touch_tail_updates_tail() {
        let mut lru = LruList::new();
        let a = lru.push_front("a");
        let b = lru.push_front("b");

        lru.touch(a);
        assert_eq!(lru.peek_oldest(), Some(&"b"));
        lru.touch(b);
        assert_eq!(lru.peek_oldest(), Some(&"a"));
        assert_eq!(order(&lru), vec!["b", "a"]);
    }

    #[test]
    fn test_lru_evict_oldest() {
        let mut lru = LruList::new();
        lru.push_front("key1");
        lru.push_front("key2");
        lru.push_front("key3");

        assert_eq!(lru.evict_oldest(), Some("key1"));
        assert_eq!(lru.len(), 2);
        assert_eq!(lru.evict_oldest(), Some("key2"));
        assert_eq!(lru.evict_oldest(), Some("key3"));
        assert_eq!(lru.evict_oldest(), None);
        assert!(lru.is_empty());
    }

    #[test]
    fn test_lru_remove_middle() {
        let mut lru = LruList::new();
        lru.push_front("key1");
        let k2 = lru.push_front("key2");
        lru.push_front("key3");

        assert_eq!(lru.remove(k2), Some("key2"));
        assert_eq!(order(&lru), vec!["key3", "key1"]);
        // Removing twice is a no-op
        assert_eq!(lru.remove(k2), None);
        assert_eq!(lru.len(), 2);
    }

    #[test]
    fn test_lru_slot_reuse_keeps_links_sound() {
        let mut lru = LruList::new();
        let a = lru.push_front("a");
        lru.push_front("b");
        lru.remove(a);

        let c = lru.push_front("c");
        assert_eq!(c, a, "freed slot should be reused");
        assert_eq!(order(&lru), vec!["c", "b"]);
        assert_eq!(lru.peek_oldest(), Some(&"b"));
    }

    #[test]
    fn test_lru_order_after_multiple_touches() {
        let mut lru = LruList::new();
        let a = lru.push_front("a");
        let b = lru.push_front("b");
        let c = lru.push_front("c");

        // [c, b, a] -> touch a -> [a, c, b] -> touch c -> [c, a, b] -> touch b -> [b, c, a]
        lru.touch(a);
        lru.touch(c);
        lru.touch(b);

        assert_eq!(lru.evict_oldest(), Some("a"));
        assert_eq!(lru.evict_oldest(), Some("c"));
        assert_eq!(lru.evict_oldest(), Some("b"));
    }

    #[test]
    fn test_lru_find_oldest_matching() {
        let mut lru = LruList::new();
        lru.push_front(1);
        let two = lru.push_front(2);
        let three = lru.push_front(3);
        lru.push_front(5);

        assert_eq!(lru.find_oldest(|v| v % 2 == 0), Some(two));
        lru.touch(two);
        assert_eq!(lru.find_oldest(|v| *v > 1), Some(three));
        assert_eq!(lru.find_oldest(|v| *v > 10), None);
    }

    #[test]
    fn test_lru_get_mut_keeps_position() {
        let mut lru = LruList::new();
        let a = lru.push_front("a");
        lru.push_front("b");

        *lru.get_mut(a).unwrap() = "z";
        assert_eq!(order(&lru), vec!["b", "z"]);
        assert_eq!(lru.peek_oldest(), Some(&"z"));
    }
}
