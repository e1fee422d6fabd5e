/// Identifies one issued request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Ticket(u64);

impl Ticket {
    /// Returns the sequence number.
    pub fn get(self) -> u64 {
        self.0
    }
}

/// Monotonic request counter enforcing last-issued-wins.
///
/// Lives inside the state it guards so issuing and committing happen
/// under the same lock.
#[derive(Debug, Clone, Default)]
pub struct RequestSequence {
    issued: u64,
}

impl RequestSequence {
    /// Creates a counter with nothing issued.
    pub fn new() -> Self {
        Self::default()
    }

    /// Issues a ticket, superseding every earlier one.
    pub fn issue(&mut self) -> Ticket {
        self.issued += 1;
        Ticket(self.issued)
    }

    /// Returns whether `ticket` is the most recently issued one.
    pub fn is_current(&self, ticket: Ticket) -> bool {
        ticket.0 == self.issued
    }
}

/// Outcome of a request that settled without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Settled {
    /// The result was written to state.
    Committed,
    /// A newer request had been issued; the result was discarded.
    Superseded,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_latest_ticket_is_current() {
        let mut sequence = RequestSequence::new();
        let first = sequence.issue();
        let second = sequence.issue();

        assert!(!sequence.is_current(first));
        assert!(sequence.is_current(second));
        assert!(first < second);
    }
}
