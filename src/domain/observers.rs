use std::collections::HashMap;

use crate::ports::ConnectionObserver;

/// Named event sinks owned by the registry
#[derive(Default)]
pub struct ObserverDirectory {
    observers: HashMap<String, Box<dyn ConnectionObserver>>,
}

impl ObserverDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store `observer` under `name`, handing back the one it replaces.
    pub fn add(&mut self, name: impl Into<String>, observer: Box<dyn ConnectionObserver>) -> Option<Box<dyn ConnectionObserver>> {
        self.observers.insert(name.into(), observer)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut (dyn ConnectionObserver + 'static)> {
        self.observers.get_mut(name).map(|o| o.as_mut())
    }

    pub fn remove(&mut self, name: &str) -> Option<Box<dyn ConnectionObserver>> {
        self.observers.remove(name)
    }

}
