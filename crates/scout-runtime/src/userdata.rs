//! [`UserData`] – the typed, keyed data-exchange area shared by steps.
//!
//! Steps read their inputs from and write their outputs to named slots.  The
//! area is owned by whoever sequences the steps and lives for one task
//! episode; steps only ever borrow it mutably for the duration of
//! [`Step::execute`][crate::step::Step::execute].
//!
//! Each slot holds a value of one concrete type.  Reading a slot with the
//! wrong type is a [`ScoutError::SlotType`] rather than a panic.

use std::any::Any;
use std::collections::HashMap;

use scout_types::ScoutError;

/// Well-known slot names.
pub mod slots {
    /// `Option<Vec<DetectedObject>>` written by `FindObjects`.
    pub const FOUND_OBJECTS: &str = "found_objects";
    /// `Vec<DetectedObject>` the cavity finder should look for.
    pub const SELECTED_OBJECTS: &str = "selected_objects";
    /// `ResultSet` of cavities accumulated across `FindCavities` runs.
    pub const FOUND_CAVITIES: &str = "found_cavities";
    /// `u32` visual-servoing attempt counter.
    pub const VS_COUNT: &str = "vscount";
}

/// Keyed slots of arbitrary `Send + Sync` values.
#[derive(Default)]
pub struct UserData {
    slots: HashMap<String, Box<dyn Any + Send + Sync>>,
}

impl std::fmt::Debug for UserData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut keys: Vec<_> = self.slots.keys().collect();
        keys.sort();
        f.debug_struct("UserData").field("slots", &keys).finish()
    }
}

impl UserData {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `value` under `key`, replacing whatever was there.
    pub fn insert<T: Any + Send + Sync>(&mut self, key: &str, value: T) {
        self.slots.insert(key.to_string(), Box::new(value));
    }

    pub fn contains(&self, key: &str) -> bool {
        self.slots.contains_key(key)
    }

    /// Borrow the value under `key`.
    pub fn get<T: Any>(&self, key: &str) -> Result<&T, ScoutError> {
        self.slots
            .get(key)
            .ok_or_else(|| ScoutError::MissingSlot(key.to_string()))?
            .downcast_ref::<T>()
            .ok_or_else(|| ScoutError::SlotType(key.to_string()))
    }

    /// Mutably borrow the value under `key`.
    pub fn get_mut<T: Any>(&mut self, key: &str) -> Result<&mut T, ScoutError> {
        self.slots
            .get_mut(key)
            .ok_or_else(|| ScoutError::MissingSlot(key.to_string()))?
            .downcast_mut::<T>()
            .ok_or_else(|| ScoutError::SlotType(key.to_string()))
    }

    /// Mutably borrow the value under `key`, inserting `T::default()` first
    /// when the slot is empty.
    pub fn get_or_default<T: Any + Default + Send + Sync>(
        &mut self,
        key: &str,
    ) -> Result<&mut T, ScoutError> {
        self.slots
            .entry(key.to_string())
            .or_insert_with(|| Box::new(T::default()))
            .downcast_mut::<T>()
            .ok_or_else(|| ScoutError::SlotType(key.to_string()))
    }

    /// Remove and return the value under `key`.
    ///
    /// A value of the wrong type is left in place.
    pub fn take<T: Any>(&mut self, key: &str) -> Result<T, ScoutError> {
        let boxed = self
            .slots
            .remove(key)
            .ok_or_else(|| ScoutError::MissingSlot(key.to_string()))?;
        match boxed.downcast::<T>() {
            Ok(value) => Ok(*value),
            Err(original) => {
                self.slots.insert(key.to_string(), original);
                Err(ScoutError::SlotType(key.to_string()))
            }
        }
    }
}
