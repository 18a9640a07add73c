//! Authoritative session state: the seat map and the current position.
//!
//! [`SessionRegistry`] is the single source of truth for one game. It is
//! plain owned data with no interior locking — exclusively owned by the
//! session worker, which processes events strictly one at a time (see
//! [`crate::session`]).

use tracing::debug;

use crate::error::GambitError;
use crate::protocol::{ConnectionId, Side};

// ── SeatMap ─────────────────────────────────────────────────────────

/// The two move-authority seats and their occupants.
///
/// At most one connection occupies each seat, and a connection never holds
/// both seats: [`assign`](SeatMap::assign) refuses occupied seats, and
/// admission only assigns to open ones.
#[derive(Debug, Default)]
pub struct SeatMap {
    white: Option<ConnectionId>,
    black: Option<ConnectionId>,
}

impl SeatMap {
    /// Create an empty seat map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The occupant of `side`, if any.
    #[must_use]
    pub fn occupant(&self, side: Side) -> Option<ConnectionId> {
        match side {
            Side::White => self.white,
            Side::Black => self.black,
        }
    }

    /// The seat held by `identity`, if any.
    #[must_use]
    pub fn seat_of(&self, identity: ConnectionId) -> Option<Side> {
        if self.white == Some(identity) {
            Some(Side::White)
        } else if self.black == Some(identity) {
            Some(Side::Black)
        } else {
            None
        }
    }

    /// The first open seat in admission order: White, then Black.
    #[must_use]
    pub fn open_seat(&self) -> Option<Side> {
        if self.white.is_none() {
            Some(Side::White)
        } else if self.black.is_none() {
            Some(Side::Black)
        } else {
            None
        }
    }

    /// Seat `identity` at `side`.
    ///
    /// # Errors
    ///
    /// Returns [`GambitError::SeatOccupied`] without touching the map when
    /// the seat already has an occupant.
    pub fn assign(&mut self, side: Side, identity: ConnectionId) -> Result<(), GambitError> {
        let slot = match side {
            Side::White => &mut self.white,
            Side::Black => &mut self.black,
        };
        if slot.is_some() {
            return Err(GambitError::SeatOccupied { side });
        }
        *slot = Some(identity);
        Ok(())
    }

    /// Clear any seat held by `identity`, returning the freed seat.
    ///
    /// Idempotent: a second call for the same identity is a no-op returning
    /// `None`.
    pub fn vacate(&mut self, identity: ConnectionId) -> Option<Side> {
        if self.white == Some(identity) {
            self.white = None;
            Some(Side::White)
        } else if self.black == Some(identity) {
            self.black = None;
            Some(Side::Black)
        } else {
            None
        }
    }
}

// ── SessionRegistry ─────────────────────────────────────────────────

/// The seat map plus the authoritative position, generic over the engine's
/// opaque position type.
#[derive(Debug)]
pub struct SessionRegistry<P> {
    seats: SeatMap,
    position: P,
}

impl<P> SessionRegistry<P> {
    /// Create a registry holding `position` with both seats open.
    pub fn new(position: P) -> Self {
        Self {
            seats: SeatMap::new(),
            position,
        }
    }

    /// The current authoritative position.
    pub fn current_position(&self) -> &P {
        &self.position
    }

    /// Replace the authoritative position.
    ///
    /// No validation happens here — the move gateway is responsible for only
    /// storing positions the rules engine accepted.
    pub fn apply_move(&mut self, next: P) {
        self.position = next;
    }

    /// The occupant of `side`, if any.
    #[must_use]
    pub fn occupant(&self, side: Side) -> Option<ConnectionId> {
        self.seats.occupant(side)
    }

    /// The seat held by `identity`, if any.
    #[must_use]
    pub fn seat_of(&self, identity: ConnectionId) -> Option<Side> {
        self.seats.seat_of(identity)
    }

    /// The first open seat in admission order: White, then Black.
    #[must_use]
    pub fn open_seat(&self) -> Option<Side> {
        self.seats.open_seat()
    }

    /// Seat `identity` at `side`.
    ///
    /// # Errors
    ///
    /// Returns [`GambitError::SeatOccupied`] when the seat is taken.
    pub fn assign(&mut self, side: Side, identity: ConnectionId) -> Result<(), GambitError> {
        self.seats.assign(side, identity)
    }

    /// Clear any seat held by `identity`, returning the freed seat.
    pub fn vacate(&mut self, identity: ConnectionId) -> Option<Side> {
        let freed = self.seats.vacate(identity);
        if let Some(side) = freed {
            debug!(%identity, %side, "seat vacated");
        }
        freed
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::todo,
    clippy::unimplemented,
    clippy::indexing_slicing
)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn id(n: u128) -> ConnectionId {
        Uuid::from_u128(n)
    }

    #[test]
    fn open_seat_prefers_white() {
        let mut seats = SeatMap::new();
        assert_eq!(seats.open_seat(), Some(Side::White));

        seats.assign(Side::White, id(1)).unwrap();
        assert_eq!(seats.open_seat(), Some(Side::Black));

        seats.assign(Side::Black, id(2)).unwrap();
        assert_eq!(seats.open_seat(), None);
    }

    #[test]
    fn assign_to_occupied_seat_fails_and_keeps_occupant() {
        let mut seats = SeatMap::new();
        seats.assign(Side::White, id(1)).unwrap();

        let err = seats.assign(Side::White, id(2)).unwrap_err();
        assert!(matches!(
            err,
            GambitError::SeatOccupied { side: Side::White }
        ));
        assert_eq!(seats.occupant(Side::White), Some(id(1)));
    }

    #[test]
    fn seat_of_finds_either_seat() {
        let mut seats = SeatMap::new();
        seats.assign(Side::White, id(1)).unwrap();
        seats.assign(Side::Black, id(2)).unwrap();

        assert_eq!(seats.seat_of(id(1)), Some(Side::White));
        assert_eq!(seats.seat_of(id(2)), Some(Side::Black));
        assert_eq!(seats.seat_of(id(3)), None);
    }

    #[test]
    fn vacate_frees_the_held_seat() {
        let mut seats = SeatMap::new();
        seats.assign(Side::White, id(1)).unwrap();
        seats.assign(Side::Black, id(2)).unwrap();

        assert_eq!(seats.vacate(id(1)), Some(Side::White));
        assert_eq!(seats.occupant(Side::White), None);
        // The other seat is untouched.
        assert_eq!(seats.occupant(Side::Black), Some(id(2)));
    }

    #[test]
    fn vacate_is_idempotent() {
        let mut seats = SeatMap::new();
        seats.assign(Side::Black, id(7)).unwrap();

        assert_eq!(seats.vacate(id(7)), Some(Side::Black));
        assert_eq!(seats.vacate(id(7)), None);
        assert_eq!(seats.open_seat(), Some(Side::White));
    }

    #[test]
    fn vacate_unknown_identity_is_a_noop() {
        let mut seats = SeatMap::new();
        seats.assign(Side::White, id(1)).unwrap();

        assert_eq!(seats.vacate(id(99)), None);
        assert_eq!(seats.occupant(Side::White), Some(id(1)));
    }

    #[test]
    fn freed_seat_is_assignable_again() {
        let mut seats = SeatMap::new();
        seats.assign(Side::White, id(1)).unwrap();
        seats.vacate(id(1));

        seats.assign(Side::White, id(2)).unwrap();
        assert_eq!(seats.occupant(Side::White), Some(id(2)));
    }

    #[test]
    fn registry_replaces_position_wholesale() {
        let mut registry = SessionRegistry::new("start");
        assert_eq!(*registry.current_position(), "start");

        registry.apply_move("after-e4");
        assert_eq!(*registry.current_position(), "after-e4");
    }

    #[test]
    fn registry_delegates_seat_operations() {
        let mut registry = SessionRegistry::new(0u8);
        registry.assign(Side::White, id(1)).unwrap();

        assert_eq!(registry.seat_of(id(1)), Some(Side::White));
        assert_eq!(registry.open_seat(), Some(Side::Black));
        assert_eq!(registry.vacate(id(1)), Some(Side::White));
        assert_eq!(registry.open_seat(), Some(Side::White));
    }
}
