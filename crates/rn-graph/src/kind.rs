//! Node kinds and their wiring tables.
//!
//! Every kind answers one question: given current entering through a
//! contact on a pole, which contacts/poles may it leave through? The answer
//! is a pure function of the kind's configuration and state.

use rn_core::{ButtonId, ContactType, Pole, RelayId};

use crate::contact::{Contact, ContactPole};

pub const COMMON: usize = 0;
pub const UP: usize = 1;
pub const DOWN: usize = 2;

/// Polarity behavior of a relay coil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CoilType {
    /// Picks up on either polarity.
    #[default]
    Normal,
    /// Needs current entering on the first pole.
    Polarized,
    /// Needs current entering on the second pole.
    PolarizedInverted,
}

/// Position of the moving part of a relay contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ContactPosition {
    Up,
    Down,
    #[default]
    Middle,
}

/// State of a push button.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ButtonState {
    #[default]
    Normal,
    Pressed,
    Extracted,
}

impl ButtonState {
    pub fn index(self) -> usize {
        match self {
            ButtonState::Normal => 0,
            ButtonState::Pressed => 1,
            ButtonState::Extracted => 2,
        }
    }
}

/// Outcome of changing which deviator contacts are closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StateChange {
    /// A contact went from open to closed.
    pub gained: bool,
    /// A contact went from closed to open.
    pub lost: bool,
}

impl StateChange {
    pub fn is_noop(self) -> bool {
        !self.gained && !self.lost
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PowerSource {
    pub enabled: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct OnOffSwitch {
    pub on: bool,
}

/// Four-way passthrough. Contact 0 can never be disabled.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Junction {
    pub disabled_contact: Option<usize>,
}

impl Junction {
    pub fn is_contact_enabled(&self, contact: usize) -> bool {
        contact < 4 && self.disabled_contact != Some(contact)
    }
}

/// Common/Up/Down changeover shared by relay and button contacts.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deviator {
    /// Drawing only.
    pub flip: bool,
    pub central_connector: bool,
    swap: bool,
    /// Stored already swapped: `[up, down]`.
    on: [bool; 2],
}

impl Default for Deviator {
    fn default() -> Self {
        Self {
            flip: false,
            central_connector: true,
            swap: false,
            on: [false, false],
        }
    }
}

impl Deviator {
    pub fn swap(&self) -> bool {
        self.swap
    }

    /// Changing swap exchanges the stored contact values.
    pub fn set_swap(&mut self, swap: bool) {
        if self.swap != swap {
            self.swap = swap;
            self.on.swap(0, 1);
        }
    }

    pub fn is_contact_on(&self, contact: usize) -> bool {
        match contact {
            UP => self.on[0],
            DOWN => self.on[1],
            _ => false,
        }
    }

    pub fn set_contact_state(&mut self, mut up: bool, mut down: bool) -> StateChange {
        if self.swap {
            std::mem::swap(&mut up, &mut down);
        }
        let change = StateChange {
            gained: (up && !self.on[0]) || (down && !self.on[1]),
            lost: (!up && self.on[0]) || (!down && self.on[1]),
        };
        self.on = [up, down];
        change
    }

    fn connections(&self, contacts: &[Contact], incoming: ContactPole) -> Vec<ContactPole> {
        let source = incoming.contact;
        let Some(contact) = contacts.get(source) else {
            return Vec::new();
        };
        let up_on = self.is_contact_on(UP) && self.central_connector;
        let down_on = self.is_contact_on(DOWN);

        let mut targets = Vec::with_capacity(2);
        if contact.contact_type(incoming.pole) == ContactType::Passthrough
            && (source == COMMON || source == DOWN)
        {
            targets.push(if source == COMMON { DOWN } else { COMMON });
        } else {
            match source {
                COMMON => {
                    if up_on {
                        targets.push(UP);
                    }
                    if down_on {
                        targets.push(DOWN);
                    }
                }
                UP if up_on => {
                    targets.push(COMMON);
                    if down_on {
                        targets.push(DOWN);
                    }
                }
                DOWN if down_on => {
                    targets.push(COMMON);
                    if up_on {
                        targets.push(UP);
                    }
                }
                _ => {}
            }
        }
        targets
            .into_iter()
            .map(|c| ContactPole::new(c, incoming.pole))
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelayContact {
    pub relay: Option<RelayId>,
    pub deviator: Deviator,
    position: ContactPosition,
}

impl RelayContact {
    /// Contact following `relay`, resting in the middle until the relay
    /// state is applied.
    pub fn new(relay: RelayId) -> Self {
        Self {
            relay: Some(relay),
            ..Self::default()
        }
    }

    pub fn position(&self) -> ContactPosition {
        self.position
    }

    /// Middle opens both sides.
    pub fn set_position(&mut self, position: ContactPosition) -> StateChange {
        self.position = position;
        self.deviator.set_contact_state(
            position == ContactPosition::Up,
            position == ContactPosition::Down,
        )
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ButtonContact {
    pub button: Option<ButtonId>,
    pub deviator: Deviator,
    /// `[up, down]` contact state per button state.
    pub table: [[bool; 3]; 2],
}

impl ButtonContact {
    pub fn apply(&mut self, state: ButtonState) -> StateChange {
        let i = state.index();
        self.deviator
            .set_contact_state(self.table[0][i], self.table[1][i])
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct RelayCoil {
    pub relay: Option<RelayId>,
    pub coil_type: CoilType,
    pub second_contact: bool,
    pub delay_up_ms: u64,
    pub delay_down_ms: u64,
}

impl RelayCoil {
    fn connections(&self, incoming: ContactPole, invert: bool) -> Vec<ContactPole> {
        if incoming.contact > 1 || (!self.second_contact && incoming.contact != 0) {
            return Vec::new();
        }
        if self.relay.is_none() {
            return Vec::new();
        }
        let accepted = match self.coil_type {
            CoilType::Normal => true,
            CoilType::Polarized => (incoming.pole == Pole::First) != invert,
            CoilType::PolarizedInverted => (incoming.pole == Pole::Second) != invert,
        };
        if !accepted {
            return Vec::new();
        }
        // Current returns on the same contact, opposite pole.
        vec![ContactPole::new(incoming.contact, !incoming.pole)]
    }
}

/// Closed set of node kinds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeKind {
    PowerSource(PowerSource),
    Switch(OnOffSwitch),
    Junction(Junction),
    RelayContact(RelayContact),
    ButtonContact(ButtonContact),
    RelayCoil(RelayCoil),
}

impl NodeKind {
    pub fn name(&self) -> &'static str {
        match self {
            NodeKind::PowerSource(_) => "power source",
            NodeKind::Switch(_) => "on/off switch",
            NodeKind::Junction(_) => "junction",
            NodeKind::RelayContact(_) => "relay contact",
            NodeKind::ButtonContact(_) => "button contact",
            NodeKind::RelayCoil(_) => "relay coil",
        }
    }

    pub fn is_source(&self) -> bool {
        matches!(self, NodeKind::PowerSource(_))
    }

    pub fn deviator(&self) -> Option<&Deviator> {
        match self {
            NodeKind::RelayContact(c) => Some(&c.deviator),
            NodeKind::ButtonContact(c) => Some(&c.deviator),
            _ => None,
        }
    }

    pub(crate) fn contact_layout(&self) -> Vec<Contact> {
        match self {
            NodeKind::PowerSource(_) => vec![Contact::new("1", "2")],
            NodeKind::Switch(_) => vec![Contact::new("1", "2"), Contact::new("3", "4")],
            NodeKind::Junction(_) => vec![
                Contact::new("1", "2"),
                Contact::new("3", "4"),
                Contact::new("5", "6"),
                Contact::new("7", "8"),
            ],
            NodeKind::RelayContact(_) | NodeKind::ButtonContact(_) => vec![
                Contact::new("11", "12"),
                Contact::new("21", "22"),
                Contact::new("31", "32"),
            ],
            NodeKind::RelayCoil(_) => vec![Contact::new("1", "2"), Contact::new("3", "4")],
        }
    }

    /// Whether a cable may be bound to `contact` at all.
    pub fn is_contact_usable(&self, contact: usize) -> bool {
        match self {
            NodeKind::Junction(j) => j.is_contact_enabled(contact),
            NodeKind::RelayCoil(c) => contact == 0 || (contact == 1 && c.second_contact),
            NodeKind::RelayContact(r) => contact != UP || r.deviator.central_connector,
            NodeKind::ButtonContact(b) => contact != UP || b.deviator.central_connector,
            _ => true,
        }
    }

    /// Legal continuations for current entering at `incoming`.
    ///
    /// `invert` asks the question backwards: where could current have come
    /// from to leave through `incoming`. Only polarized coils are asymmetric.
    pub fn active_connections(
        &self,
        contacts: &[Contact],
        incoming: ContactPole,
        invert: bool,
    ) -> Vec<ContactPole> {
        if incoming.contact >= contacts.len() {
            return Vec::new();
        }
        match self {
            NodeKind::PowerSource(_) => Vec::new(),
            NodeKind::Switch(s) => {
                if !s.on {
                    return Vec::new();
                }
                let other = if incoming.contact == 0 { 1 } else { 0 };
                vec![ContactPole::new(other, incoming.pole)]
            }
            NodeKind::Junction(j) => {
                if !j.is_contact_enabled(incoming.contact) {
                    return Vec::new();
                }
                // Unwired contacts are listed too; the walk leaves them dangling.
                (0..contacts.len())
                    .filter(|&i| i != incoming.contact && j.is_contact_enabled(i))
                    .map(|i| ContactPole::new(i, incoming.pole))
                    .collect()
            }
            NodeKind::RelayContact(r) => r.deviator.connections(contacts, incoming),
            NodeKind::ButtonContact(b) => b.deviator.connections(contacts, incoming),
            NodeKind::RelayCoil(c) => c.connections(incoming, invert),
        }
    }
}


#[cfg(test)]
mod proptests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #[test]
        fn deviator_connections_are_symmetric(up in any::<bool>(), down in any::<bool>(), central in any::<bool>()) {
            let mut rc = RelayContact::default();
            rc.deviator.central_connector = central;
            rc.deviator.set_contact_state(up, down);
            let kind = NodeKind::RelayContact(rc);
            let contacts = kind.contact_layout();
            for from in 0..3 {
                for to in kind.active_connections(&contacts, ContactPole::new(from, Pole::First), false) {
                    let back = kind.active_connections(&contacts, ContactPole::new(to.contact, Pole::First), false);
                    prop_assert!(back.iter().any(|c| c.contact == from));
                    prop_assert_eq!(to.pole, Pole::First);
                }
            }
        }

        #[test]
        fn junction_never_returns_incoming(disabled in 1usize..4, from in 0usize..4) {
            let kind = NodeKind::Junction(Junction { disabled_contact: Some(disabled) });
            let contacts = kind.contact_layout();
            let out = kind.active_connections(&contacts, ContactPole::new(from, Pole::Second), false);
            prop_assert!(out.iter().all(|c| c.contact != from && c.contact != disabled));
        }
    }
}
