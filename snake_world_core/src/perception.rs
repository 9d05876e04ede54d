//! Turning the simulation into something an agent can learn from.
//!
//! [`absolute_state`] reads the one-ring vision and food direction in
//! compass terms. [`to_egocentric`] rotates that into front/left/right terms
//! so mirrored situations share one Q-table entry.

use std::{fmt, str::FromStr};

use crate::{
    environment::{GridSimulation, Vision},
    snake::Heading,
};

/// Tri-state content of a neighbouring cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Sight {
    /// Wall, body or anything else that kills on contact
    Blocked,
    #[default]
    Empty,
    Food,
}

impl Sight {
    /// Numeric code: `-1` blocked, `0` empty, `+1` food.
    pub const fn code(self) -> i8 {
        match self {
            Sight::Blocked => -1,
            Sight::Empty => 0,
            Sight::Food => 1,
        }
    }

    const fn bits(self) -> u16 {
        match self {
            Sight::Blocked => 0,
            Sight::Empty => 1,
            Sight::Food => 2,
        }
    }

    const fn from_bits(bits: u16) -> Self {
        match bits & 0b11 {
            0 => Sight::Blocked,
            2 => Sight::Food,
            _ => Sight::Empty,
        }
    }
}

impl From<Vision> for Sight {
    fn from(vision: Vision) -> Self {
        match vision {
            Vision::Space => Sight::Empty,
            Vision::Food => Sight::Food,
            Vision::Wall | Vision::Body | Vision::Head | Vision::OutOfScope => Sight::Blocked,
        }
    }
}

/// Perception in the absolute (compass) frame, rebuilt every tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SystemState {
    pub food_north: bool,
    pub food_south: bool,
    pub food_east: bool,
    pub food_west: bool,
    pub obj_north: Sight,
    pub obj_south: Sight,
    pub obj_east: Sight,
    pub obj_west: Sight,
    pub obj_north_east: Sight,
    pub obj_north_west: Sight,
    pub obj_south_east: Sight,
    pub obj_south_west: Sight,
    pub heading: Heading,
}

impl SystemState {
    /// Nothing around, no food anywhere.
    pub fn empty(heading: Heading) -> Self {
        Self {
            food_north: false,
            food_south: false,
            food_east: false,
            food_west: false,
            obj_north: Sight::Empty,
            obj_south: Sight::Empty,
            obj_east: Sight::Empty,
            obj_west: Sight::Empty,
            obj_north_east: Sight::Empty,
            obj_north_west: Sight::Empty,
            obj_south_east: Sight::Empty,
            obj_south_west: Sight::Empty,
            heading,
        }
    }
}

/// Reads the current simulation into a [`SystemState`].
pub fn absolute_state(simulation: &GridSimulation) -> SystemState {
    let head = simulation.head();
    let food = simulation.food();
    let look = |dx: i32, dy: i32| Sight::from(simulation.query_cell(head.offset(dx, dy)));

    SystemState {
        food_north: food.y < head.y,
        food_south: food.y > head.y,
        food_east: food.x > head.x,
        food_west: food.x < head.x,
        obj_north: look(0, -1),
        obj_south: look(0, 1),
        obj_east: look(1, 0),
        obj_west: look(-1, 0),
        obj_north_east: look(1, -1),
        obj_north_west: look(-1, -1),
        obj_south_east: look(1, 1),
        obj_south_west: look(-1, 1),
        heading: simulation.heading(),
    }
}

/// Perception relative to the direction of travel.
///
/// Equality and hashing ignore `heading`: two states that look the same from
/// the snake's point of view are the same learning state.
#[derive(Debug, Clone, Copy)]
pub struct EgocentricState {
    pub obj_front: Sight,
    pub obj_left: Sight,
    pub obj_right: Sight,
    pub food_front: bool,
    pub food_back: bool,
    pub food_left: bool,
    pub food_right: bool,
    pub heading: Heading,
}

impl EgocentricState {
    /// Packed Q-table key.
    pub fn key(&self) -> StateKey {
        let mut bits = self.obj_left.bits()
            | self.obj_front.bits() << 2
            | self.obj_right.bits() << 4;
        for (i, flag) in [self.food_left, self.food_front, self.food_right, self.food_back]
            .into_iter()
            .enumerate()
        {
            if flag {
                bits |= 1 << (6 + i);
            }
        }
        StateKey(bits)
    }
}

impl PartialEq for EgocentricState {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for EgocentricState {}

impl std::hash::Hash for EgocentricState {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl fmt::Display for EgocentricState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.key().fmt(f)
    }
}

/// Rotates the compass-frame state into the snake's frame.
///
/// West and north are the mirror images of east and south with left and
/// right swapped.
pub fn to_egocentric(state: &SystemState) -> EgocentricState {
    let s = state;
    let (obj_front, obj_left, obj_right, food_front, food_back, food_left, food_right) =
        match s.heading {
            Heading::East => (
                s.obj_east,
                s.obj_north,
                s.obj_south,
                s.food_east,
                s.food_west,
                s.food_north,
                s.food_south,
            ),
            Heading::West => (
                s.obj_west,
                s.obj_south,
                s.obj_north,
                s.food_west,
                s.food_east,
                s.food_south,
                s.food_north,
            ),
            Heading::South => (
                s.obj_south,
                s.obj_east,
                s.obj_west,
                s.food_south,
                s.food_north,
                s.food_east,
                s.food_west,
            ),
            Heading::North => (
                s.obj_north,
                s.obj_west,
                s.obj_east,
                s.food_north,
                s.food_south,
                s.food_west,
                s.food_east,
            ),
        };
    EgocentricState {
        obj_front,
        obj_left,
        obj_right,
        food_front,
        food_back,
        food_left,
        food_right,
        heading: s.heading,
    }
}

/// Heading-free identity of an [`EgocentricState`], packed into ten bits.
///
/// Bits 0-5 hold the left/front/right sights (two bits each); bits 6-9 the
/// left/front/right/back food flags. Its string form looks like
/// `[<^  ],[-1,+0,+1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct StateKey(u16);

impl StateKey {
    fn sight(self, slot: u16) -> Sight {
        Sight::from_bits(self.0 >> (slot * 2))
    }

    fn food(self, slot: u16) -> bool {
        self.0 & (1 << (6 + slot)) != 0
    }

    /// Expands the key back into a state facing `heading`.
    pub fn to_state(self, heading: Heading) -> EgocentricState {
        EgocentricState {
            obj_left: self.sight(0),
            obj_front: self.sight(1),
            obj_right: self.sight(2),
            food_left: self.food(0),
            food_front: self.food(1),
            food_right: self.food(2),
            food_back: self.food(3),
            heading,
        }
    }
}

/// Marker characters for the left/front/right/back food flags.
const FOOD_MARKS: [char; 4] = ['<', '^', '>', 'v'];

impl fmt::Display for StateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("[")?;
        for (slot, mark) in FOOD_MARKS.iter().enumerate() {
            let shown = if self.food(slot as u16) { *mark } else { ' ' };
            write!(f, "{shown}")?;
        }
        write!(
            f,
            "],[{:+},{:+},{:+}]",
            self.sight(0).code(),
            self.sight(1).code(),
            self.sight(2).code()
        )
    }
}

/// A string that is not a canonical state key.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StateKeyError {
    #[error("state key must look like \"[<^>v],[+0,+0,+0]\"")]
    Malformed,
    #[error("unexpected food marker {found:?} where {expected:?} or ' ' belongs")]
    FoodMarker { expected: char, found: char },
    #[error("obstacle code {0:?} is not exactly one of -1, +0, +1")]
    ObstacleCode(String),
}

impl FromStr for StateKey {
    type Err = StateKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let rest = s.strip_prefix('[').ok_or(StateKeyError::Malformed)?;
        let mut chars = rest.chars();
        let mut bits = 0u16;
        for (slot, expected) in FOOD_MARKS.into_iter().enumerate() {
            match chars.next() {
                Some(' ') => {}
                Some(found) if found == expected => bits |= 1 << (6 + slot),
                Some(found) => return Err(StateKeyError::FoodMarker { expected, found }),
                None => return Err(StateKeyError::Malformed),
            }
        }
        let codes = chars
            .as_str()
            .strip_prefix("],[")
            .and_then(|rest| rest.strip_suffix(']'))
            .ok_or(StateKeyError::Malformed)?;

        let mut slots = 0;
        for (slot, code) in codes.split(',').enumerate() {
            if slot >= 3 {
                return Err(StateKeyError::Malformed);
            }
            let sight = match code {
                "-1" => Sight::Blocked,
                "+0" => Sight::Empty,
                "+1" => Sight::Food,
                _ => return Err(StateKeyError::ObstacleCode(code.to_string())),
            };
            bits |= sight.bits() << (slot * 2);
            slots += 1;
        }
        if slots != 3 {
            return Err(StateKeyError::Malformed);
        }
        Ok(StateKey(bits))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        Position,
        action::{RelativeAction, to_absolute},
        config::WorldConfig,
    };

    /// Sets the obstacle and food flag on the compass side `heading` points to.
    fn mark(state: &mut SystemState, side: Heading, sight: Sight, food: bool) {
        match side {
            Heading::North => (state.obj_north, state.food_north) = (sight, food),
            Heading::South => (state.obj_south, state.food_south) = (sight, food),
            Heading::East => (state.obj_east, state.food_east) = (sight, food),
            Heading::West => (state.obj_west, state.food_west) = (sight, food),
        }
    }

    #[test]
    fn test_east_obstacle_is_front() {
        let mut state = SystemState::empty(Heading::East);
        state.obj_east = Sight::Blocked;
        let ego = to_egocentric(&state);
        assert_eq!(ego.obj_front, Sight::Blocked);
        assert_eq!(ego.obj_left, Sight::Empty);
        assert_eq!(ego.obj_right, Sight::Empty);
    }

    #[test]
    fn test_egocentric_agrees_with_action_translator() {
        // Whatever sits on the side an action would move into must show up
        // in that action's egocentric slot.
        for heading in Heading::ALL {
            for action in RelativeAction::ALL {
                let side = to_absolute(action, heading);
                let mut state = SystemState::empty(heading);
                mark(&mut state, side, Sight::Food, true);
                let ego = to_egocentric(&state);
                let (obj, food) = match action {
                    RelativeAction::Left => (ego.obj_left, ego.food_left),
                    RelativeAction::Front => (ego.obj_front, ego.food_front),
                    RelativeAction::Right => (ego.obj_right, ego.food_right),
                };
                assert_eq!(obj, Sight::Food, "{action:?} while heading {heading:?}");
                assert!(food, "{action:?} while heading {heading:?}");
                assert!(!ego.food_back);
            }

            let (dx, dy) = heading.delta();
            let behind = Heading::from_delta(-dx, -dy).unwrap();
            let mut state = SystemState::empty(heading);
            mark(&mut state, behind, Sight::Empty, true);
            assert!(to_egocentric(&state).food_back);
        }
    }

    #[test]
    fn test_mirror_symmetry() {
        // East with food to the north is the mirror of west with food to the south.
        let mut east = SystemState::empty(Heading::East);
        east.food_north = true;
        east.obj_south = Sight::Blocked;
        let mut west = SystemState::empty(Heading::West);
        west.food_south = true;
        west.obj_north = Sight::Blocked;
        assert_eq!(to_egocentric(&east), to_egocentric(&west));
        assert_eq!(to_egocentric(&east).to_string(), "[<   ],[+0,+0,-1]");
    }

    #[test]
    fn test_heading_not_part_of_identity() {
        let north = to_egocentric(&SystemState::empty(Heading::North));
        let south = to_egocentric(&SystemState::empty(Heading::South));
        assert_eq!(north, south);
        assert_eq!(north.key(), south.key());
    }

    #[test]
    fn test_key_string_round_trip() {
        let mut state = SystemState::empty(Heading::South);
        state.food_east = true;
        state.food_north = true;
        state.obj_south = Sight::Food;
        state.obj_west = Sight::Blocked;
        let ego = to_egocentric(&state);
        let text = ego.to_string();
        assert_eq!(text, "[<  v],[+0,+1,-1]");
        let key: StateKey = text.parse().unwrap();
        assert_eq!(key, ego.key());
        assert_eq!(key.to_state(Heading::South), ego);
    }

    #[test]
    fn test_key_parse_errors() {
        assert_eq!("".parse::<StateKey>(), Err(StateKeyError::Malformed));
        assert_eq!("[<^>v]".parse::<StateKey>(), Err(StateKeyError::Malformed));
        assert_eq!(
            "[x   ],[+0,+0,+0]".parse::<StateKey>(),
            Err(StateKeyError::FoodMarker { expected: '<', found: 'x' })
        );
        assert_eq!(
            "[    ],[+0,+2,+0]".parse::<StateKey>(),
            Err(StateKeyError::ObstacleCode("+2".to_string()))
        );
        assert_eq!("[    ],[+0,+0]".parse::<StateKey>(), Err(StateKeyError::Malformed));
        assert_eq!(
            "[    ],[+0,+0,+0,+0]".parse::<StateKey>(),
            Err(StateKeyError::Malformed)
        );
        assert!("[<^>v],[-1,-1,-1]".parse::<StateKey>().is_ok());
    }

    #[test]
    fn test_key_parse_rejects_non_canonical_codes() {
        for code in ["0", "-0", "1", "+00", " +0"] {
            let text = format!("[    ],[+0,{code},+0]");
            assert_eq!(
                text.parse::<StateKey>(),
                Err(StateKeyError::ObstacleCode(code.to_string())),
                "{text}"
            );
        }
        for text in ["[    ],[+0,+0,+0]", "[<^>v],[-1,+1,-1]", "[ ^ v],[+1,+0,-1]"] {
            assert_eq!(text.parse::<StateKey>().unwrap().to_string(), text);
        }
    }

    #[test]
    fn test_absolute_state_from_simulation() {
        let mut simulation = GridSimulation::new(&WorldConfig {
            seed: Some(9),
            ..WorldConfig::default()
        });
        let head = simulation.head();
        simulation.place_food_at(head.offset(1, 0));
        let state = absolute_state(&simulation);
        assert!(state.food_east);
        assert!(!state.food_west && !state.food_north && !state.food_south);
        assert_eq!(state.obj_east, Sight::Food);
        assert_eq!(state.obj_north, Sight::Empty);
        assert_eq!(state.heading, Heading::North);

        // Spawn row sits one above the bottom interior row.
        assert_eq!(state.obj_south, Sight::Empty);
        assert_eq!(state.obj_south_east, Sight::Empty);

        simulation.place_food_at(Position::new(1, 1));
        let state = absolute_state(&simulation);
        assert!(state.food_north && state.food_west);
    }
}
