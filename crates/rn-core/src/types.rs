//! Small value types shared by the network and the circuit engine.

use core::fmt;
use core::ops::Not;

/// One of the two conductors of a bifilar cable or contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum Pole {
    First,
    Second,
}

impl Pole {
    pub const BOTH: [Pole; 2] = [Pole::First, Pole::Second];

    pub fn index(self) -> usize {
        match self {
            Pole::First => 0,
            Pole::Second => 1,
        }
    }
}

impl Not for Pole {
    type Output = Pole;

    fn not(self) -> Pole {
        match self {
            Pole::First => Pole::Second,
            Pole::Second => Pole::First,
        }
    }
}

impl fmt::Display for Pole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Pole::First => write!(f, "1"),
            Pole::Second => write!(f, "2"),
        }
    }
}

/// Cable end.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum Side {
    A,
    B,
}

impl Side {
    pub fn index(self) -> usize {
        match self {
            Side::A => 0,
            Side::B => 1,
        }
    }
}

impl Not for Side {
    type Output = Side;

    fn not(self) -> Side {
        match self {
            Side::A => Side::B,
            Side::B => Side::A,
        }
    }
}

/// How one pole of a contact is wired.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum ContactType {
    #[default]
    NotConnected,
    Connected,
    Passthrough,
}

impl ContactType {
    pub fn is_connected(self) -> bool {
        self != ContactType::NotConnected
    }
}

/// Kind of a registered circuit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CircuitKind {
    Open,
    Closed,
}

impl CircuitKind {
    pub const ALL: [CircuitKind; 2] = [CircuitKind::Open, CircuitKind::Closed];

    pub fn index(self) -> usize {
        match self {
            CircuitKind::Open => 0,
            CircuitKind::Closed => 1,
        }
    }
}

/// Strongest circuit present on a contact. Ordered by precedence.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default)]
pub enum AnyCircuit {
    #[default]
    None,
    Open,
    Closed,
}

impl AnyCircuit {
    pub fn is_none(self) -> bool {
        self == AnyCircuit::None
    }
}

impl From<CircuitKind> for AnyCircuit {
    fn from(kind: CircuitKind) -> Self {
        match kind {
            CircuitKind::Open => AnyCircuit::Open,
            CircuitKind::Closed => AnyCircuit::Closed,
        }
    }
}

/// Which poles of a cable carry circuits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CablePowerPole {
    First,
    Second,
    Both,
}

impl CablePowerPole {
    fn from_flags(first: bool, second: bool) -> Option<Self> {
        match (first, second) {
            (true, true) => Some(CablePowerPole::Both),
            (true, false) => Some(CablePowerPole::First),
            (false, true) => Some(CablePowerPole::Second),
            (false, false) => None,
        }
    }
}

/// Aggregate power state of a cable.
///
/// Precedence: both closed poles > one closed pole > both open poles >
/// one open pole > none.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CablePower {
    #[default]
    None,
    Open(CablePowerPole),
    Closed(CablePowerPole),
}

impl CablePower {
    /// Derive power from list emptiness, indexed `[First, Second]`.
    pub fn from_poles(closed: [bool; 2], open: [bool; 2]) -> Self {
        if let Some(poles) = CablePowerPole::from_flags(closed[0], closed[1]) {
            return CablePower::Closed(poles);
        }
        match CablePowerPole::from_flags(open[0], open[1]) {
            Some(poles) => CablePower::Open(poles),
            None => CablePower::None,
        }
    }

    /// Numeric precedence, higher wins.
    pub fn rank(self) -> u8 {
        match self {
            CablePower::None => 0,
            CablePower::Open(CablePowerPole::Both) => 2,
            CablePower::Open(_) => 1,
            CablePower::Closed(CablePowerPole::Both) => 4,
            CablePower::Closed(_) => 3,
        }
    }

    pub fn kind(self) -> Option<CircuitKind> {
        match self {
            CablePower::None => None,
            CablePower::Open(_) => Some(CircuitKind::Open),
            CablePower::Closed(_) => Some(CircuitKind::Closed),
        }
    }
}

impl fmt::Display for CablePower {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CablePower::None => write!(f, "none"),
            CablePower::Open(p) => write!(f, "open({p:?})"),
            CablePower::Closed(p) => write!(f, "closed({p:?})"),
        }
    }
}

/// How a cable is drawn. Has no effect on propagation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "snake_case")
)]
pub enum CableMode {
    #[default]
    Unifilar,
    Bifilar1,
    Bifilar2,
    BifilarBoth,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn negation_flips() {
        assert_eq!(!Pole::First, Pole::Second);
        assert_eq!(!Side::B, Side::A);
    }

    #[test]
    fn any_circuit_precedence() {
        assert!(AnyCircuit::Closed > AnyCircuit::Open);
        assert!(AnyCircuit::Open > AnyCircuit::None);
        assert_eq!(AnyCircuit::from(CircuitKind::Closed), AnyCircuit::Closed);
    }

    #[test]
    fn closed_beats_open_on_cable() {
        let p = CablePower::from_poles([false, true], [true, true]);
        assert_eq!(p, CablePower::Closed(CablePowerPole::Second));
        assert_eq!(CablePower::from_poles([false; 2], [false; 2]), CablePower::None);
    }
}

#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn double_negation_is_identity(first in any::<bool>(), a in any::<bool>()) {
            let pole = if first { Pole::First } else { Pole::Second };
            let side = if a { Side::A } else { Side::B };
            prop_assert_eq!(!!pole, pole);
            prop_assert_eq!(!!side, side);
            prop_assert_ne!(!pole, pole);
        }

        #[test]
        fn power_rank_is_monotonic(closed in any::<[bool; 2]>(), open in any::<[bool; 2]>()) {
            let p = CablePower::from_poles(closed, open);
            let with_more_closed = CablePower::from_poles([true, closed[1]], open);
            prop_assert!(with_more_closed.rank() >= p.rank());
            if closed == [false, false] {
                prop_assert!(p.rank() <= 2);
            } else {
                prop_assert!(p.rank() >= 3);
            }
        }
    }
}
