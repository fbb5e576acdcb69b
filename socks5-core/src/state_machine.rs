//! A small state-table driver used to instrument the SOCKS5 flow
//! controller's transitions (spec.md §4.5).
//!
//! Under the teacher's original non-blocking-socket event loop this drove
//! dispatch itself (`handler_read`/`handler_write`/`handler_block` picking
//! the active state's handler). Here dispatch is a plain `async` match in
//! `flow.rs` — tokio is the scheduler, not this driver — but the
//! arrival/departure hook contract is preserved so every transition is
//! still observable in one place, which is what the access log and tests
//! hook into.

/// Hooks invoked around state transitions. Implement on whatever carries
/// the per-connection logging context.
pub(crate) trait StateHooks {
    type State: Copy + Eq + std::fmt::Debug;

    fn on_arrival(&mut self, state: Self::State);
    fn on_departure(&mut self, state: Self::State);
}

/// Drives a sequence of states for one connection, firing `on_departure`
/// for the state being left and `on_arrival` for the state being entered
/// on every transition (spec.md §4.5: "if the returned state differs, call
/// `on_departure(old)` then `on_arrival(new)`"). The initial state gets an
/// `on_arrival` call immediately, matching `init`.
pub(crate) struct StateMachine<H: StateHooks> {
    hooks: H,
    current: H::State,
}

impl<H: StateHooks> StateMachine<H> {
    pub(crate) fn new(mut hooks: H, initial: H::State) -> Self {
        hooks.on_arrival(initial);
        Self { hooks, current: initial }
    }

    pub(crate) fn transition_to(&mut self, new_state: H::State) {
        if new_state != self.current {
            self.hooks.on_departure(self.current);
            self.current = new_state;
            self.hooks.on_arrival(self.current);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum TestState {
        A,
        B,
        C,
    }

    #[derive(Default)]
    struct RecordingHooks {
        arrivals: Vec<TestState>,
        departures: Vec<TestState>,
    }

    impl StateHooks for RecordingHooks {
        type State = TestState;

        fn on_arrival(&mut self, state: TestState) {
            self.arrivals.push(state);
        }

        fn on_departure(&mut self, state: TestState) {
            self.departures.push(state);
        }
    }

    #[test]
    fn initial_state_fires_only_arrival() {
        let sm = StateMachine::new(RecordingHooks::default(), TestState::A);
        assert_eq!(sm.hooks.arrivals, vec![TestState::A]);
        assert!(sm.hooks.departures.is_empty());
    }

    #[test]
    fn transition_fires_departure_then_arrival() {
        let mut sm = StateMachine::new(RecordingHooks::default(), TestState::A);
        sm.transition_to(TestState::B);
        sm.transition_to(TestState::C);
        assert_eq!(sm.hooks.arrivals, vec![TestState::A, TestState::B, TestState::C]);
        assert_eq!(sm.hooks.departures, vec![TestState::A, TestState::B]);
    }

    #[test]
    fn transition_to_same_state_is_a_no_op() {
        let mut sm = StateMachine::new(RecordingHooks::default(), TestState::A);
        sm.transition_to(TestState::A);
        assert_eq!(sm.hooks.arrivals, vec![TestState::A]);
        assert!(sm.hooks.departures.is_empty());
    }
}
