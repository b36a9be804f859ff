//! Process-wide container slot
//!
//! Holds at most one active container. Readers clone the `Arc` and keep
//! using it even while a reload swaps in a replacement.

use std::sync::{Arc, PoisonError, RwLock};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    Absent,
    Active,
}

pub struct ContainerSlot<C> {
    current: RwLock<Option<Arc<C>>>,
}

impl<C> ContainerSlot<C> {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(None),
        }
    }

    /// The installed container, if any
    pub fn current(&self) -> Option<Arc<C>> {
        self.current
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn state(&self) -> SlotState {
        match self.current.read().unwrap_or_else(PoisonError::into_inner).as_ref() {
            Some(_) => SlotState::Active,
            None => SlotState::Absent,
        }
    }

    /// Install `next` and hand back the container it replaced
    pub fn replace(&self, next: Arc<C>) -> Option<Arc<C>> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .replace(next)
    }

    /// Empty the slot and hand back what was installed
    pub fn take(&self) -> Option<Arc<C>> {
        self.current
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

impl<C> Default for ContainerSlot<C> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replace_returns_previous() {
        let slot: ContainerSlot<i32> = ContainerSlot::new();
        assert_eq!(slot.state(), SlotState::Absent);

        assert!(slot.replace(Arc::new(1)).is_none());
        assert_eq!(slot.state(), SlotState::Active);

        let previous = slot.replace(Arc::new(2)).unwrap();
        assert_eq!(*previous, 1);
        assert_eq!(*slot.current().unwrap(), 2);
    }

    #[test]
    fn test_reader_keeps_replaced_container() {
        let slot = ContainerSlot::new();
        slot.replace(Arc::new("first"));
        let held = slot.current().unwrap();

        slot.replace(Arc::new("second"));
        assert_eq!(*held, "first");
        assert_eq!(*slot.current().unwrap(), "second");
    }

    #[test]
    fn test_take_empties_slot() {
        let slot: ContainerSlot<i32> = ContainerSlot::new();
        assert!(slot.take().is_none());

        slot.replace(Arc::new(7));
        assert_eq!(slot.take().as_deref(), Some(&7));
        assert_eq!(slot.state(), SlotState::Absent);
        assert!(slot.take().is_none());
    }
}
