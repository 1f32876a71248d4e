//! Bifilar cables between two node contacts.

use rn_core::{CableId, CableMode, CablePower, CircuitId, CircuitKind, NodeId, Pole, Side};

/// One bound end of a cable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CableEnd {
    pub node: NodeId,
    pub contact: usize,
}

#[derive(Debug, Clone)]
pub struct Cable {
    pub id: CableId,
    pub mode: CableMode,
    pub(crate) ends: [Option<CableEnd>; 2],
    /// `[kind][pole]`
    circuits: [[Vec<CircuitId>; 2]; 2],
}

impl Cable {
    pub(crate) fn new(id: CableId, mode: CableMode) -> Self {
        Self {
            id,
            mode,
            ends: [None, None],
            circuits: Default::default(),
        }
    }

    pub fn get_node(&self, side: Side) -> Option<CableEnd> {
        self.ends[side.index()]
    }

    /// Which side `node`/`contact` is bound to, if any.
    pub fn side_of(&self, node: NodeId, contact: usize) -> Option<Side> {
        [Side::A, Side::B]
            .into_iter()
            .find(|s| self.get_node(*s) == Some(CableEnd { node, contact }))
    }

    pub fn circuits(&self, kind: CircuitKind, pole: Pole) -> &[CircuitId] {
        &self.circuits[kind.index()][pole.index()]
    }

    pub fn is_idle(&self) -> bool {
        self.circuits.iter().flatten().all(Vec::is_empty)
    }

    pub fn powered(&self) -> CablePower {
        let non_empty = |kind: CircuitKind| {
            [
                !self.circuits(kind, Pole::First).is_empty(),
                !self.circuits(kind, Pole::Second).is_empty(),
            ]
        };
        CablePower::from_poles(non_empty(CircuitKind::Closed), non_empty(CircuitKind::Open))
    }

    pub(crate) fn add_circuit(&mut self, circuit: CircuitId, kind: CircuitKind, pole: Pole) {
        let list = &mut self.circuits[kind.index()][pole.index()];
        // Pole lists are separate, a circuit passes at most once per list.
        assert!(
            !list.contains(&circuit),
            "circuit {circuit} already on cable {} pole {pole}",
            self.id
        );
        list.push(circuit);
    }

    pub(crate) fn remove_circuit(&mut self, circuit: CircuitId, kind: CircuitKind, pole: Pole) {
        let list = &mut self.circuits[kind.index()][pole.index()];
        let pos = list
            .iter()
            .position(|c| *c == circuit)
            .unwrap_or_else(|| panic!("circuit {circuit} not on cable {} pole {pole}", self.id));
        list.remove(pos);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rn_core::CablePowerPole;

    #[test]
    fn power_follows_lists() {
        let mut cable = Cable::new(CableId::from_index(0), CableMode::Bifilar1);
        let c = CircuitId::from_index(0);
        assert_eq!(cable.powered(), CablePower::None);
        cable.add_circuit(c, CircuitKind::Open, Pole::First);
        assert_eq!(cable.powered(), CablePower::Open(CablePowerPole::First));
        cable.add_circuit(c, CircuitKind::Closed, Pole::Second);
        assert_eq!(cable.powered(), CablePower::Closed(CablePowerPole::Second));
        cable.remove_circuit(c, CircuitKind::Closed, Pole::Second);
        cable.remove_circuit(c, CircuitKind::Open, Pole::First);
        assert!(cable.is_idle());
    }

    #[test]
    #[should_panic(expected = "already on cable")]
    fn double_pass_on_same_pole_is_fatal() {
        let mut cable = Cable::new(CableId::from_index(0), CableMode::default());
        let c = CircuitId::from_index(0);
        cable.add_circuit(c, CircuitKind::Open, Pole::First);
        cable.add_circuit(c, CircuitKind::Open, Pole::First);
    }
}
