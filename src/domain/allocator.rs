use super::ConnectionId;

/// Issues connection identifiers: 1, 2, 3, ... never reused.
#[derive(Debug, Default)]
pub struct IdAllocator {
    last: u64,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn next(&mut self) -> ConnectionId {
        self.last = self
            .last
            .checked_add(1)
            .unwrap_or_else(|| panic!("connection identifier space exhausted"));
        ConnectionId::new(self.last)
    }
}
