use std::fmt;

use indexmap::{IndexMap, IndexSet};
use serde::{Deserialize, Serialize};

/// Newtype for fixture identity. Prevents mixing up fixture ids with other strings.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FixtureId(pub String);

impl fmt::Display for FixtureId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for FixtureId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Newtype for group identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct GroupName(pub String);

impl fmt::Display for GroupName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for GroupName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// Newtype for order identity (a named permutation of fixtures).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderName(pub String);

impl fmt::Display for OrderName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for OrderName {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

/// The group that always contains every fixture in declaration order.
pub const ALL_GROUP: &str = "ALL";

// ── Channels & Addressing ───────────────────────────────────────────

/// Logical channel functions a moving-head fixture can expose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogicalChannel {
    Pan,
    Tilt,
    Dimmer,
    Shutter,
    Color,
    Gobo,
}

impl fmt::Display for LogicalChannel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LogicalChannel::Pan => "pan",
            LogicalChannel::Tilt => "tilt",
            LogicalChannel::Dimmer => "dimmer",
            LogicalChannel::Shutter => "shutter",
            LogicalChannel::Color => "color",
            LogicalChannel::Gobo => "gobo",
        };
        write!(f, "{name}")
    }
}

/// DMX channel address within a universe. Valid range: 1..=512.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DmxAddress(u16);

impl DmxAddress {
    /// Create a DMX address. Returns None if out of valid range (1-512).
    pub fn new(addr: u16) -> Option<Self> {
        if (1..=512).contains(&addr) {
            Some(Self(addr))
        } else {
            None
        }
    }

    pub fn get(self) -> u16 {
        self.0
    }
}

/// Per-fixture patch: which DMX address each logical channel lives at,
/// and which channels run inverted (value → 255 − value).
///
/// Channels absent from the map simply don't exist on the fixture; the
/// mapper skips them rather than erroring.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChannelMap {
    pub channels: IndexMap<LogicalChannel, DmxAddress>,
    #[serde(default)]
    pub inverted: IndexSet<LogicalChannel>,
}

impl ChannelMap {
    pub fn address(&self, channel: LogicalChannel) -> Option<DmxAddress> {
        self.channels.get(&channel).copied()
    }

    pub fn is_inverted(&self, channel: LogicalChannel) -> bool {
        self.inverted.contains(&channel)
    }
}

// ── Calibration ─────────────────────────────────────────────────────

/// Usable travel of one axis in normalized units. `min <= center <= max`,
/// all within [0, 1].
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct AxisCalibration {
    pub min: f64,
    pub center: f64,
    pub max: f64,
}

impl Default for AxisCalibration {
    fn default() -> Self {
        Self {
            min: 0.0,
            center: 0.5,
            max: 1.0,
        }
    }
}

impl AxisCalibration {
    /// Clamp a normalized position into the usable travel.
    pub fn clamp(&self, v: f64) -> f64 {
        v.clamp(self.min, self.max)
    }

    pub fn span(&self) -> f64 {
        self.max - self.min
    }
}

/// Per-fixture (or rig-wide default) calibration data.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Calibration {
    #[serde(default)]
    pub pan: AxisCalibration,
    #[serde(default)]
    pub tilt: AxisCalibration,
    /// Lowest dimmer level the fixture can hold without flickering out.
    #[serde(default)]
    pub dimmer_floor: f64,
    /// Physical degrees covered by the full normalized pan travel.
    pub pan_range_deg: f64,
    /// Physical degrees covered by the full normalized tilt travel.
    pub tilt_range_deg: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            pan: AxisCalibration::default(),
            tilt: AxisCalibration::default(),
            dimmer_floor: 0.0,
            pan_range_deg: 540.0,
            tilt_range_deg: 270.0,
        }
    }
}

impl Calibration {
    pub fn axis(&self, channel: LogicalChannel) -> Option<&AxisCalibration> {
        match channel {
            LogicalChannel::Pan => Some(&self.pan),
            LogicalChannel::Tilt => Some(&self.tilt),
            _ => None,
        }
    }

    /// Physical degree span of a movement axis, if the channel is one.
    pub fn degree_range(&self, channel: LogicalChannel) -> Option<f64> {
        match channel {
            LogicalChannel::Pan => Some(self.pan_range_deg),
            LogicalChannel::Tilt => Some(self.tilt_range_deg),
            _ => None,
        }
    }
}

// ── Fixtures & Rig ──────────────────────────────────────────────────

/// One fixture in the rig: identity, patch, and optional calibration
/// override. Calibration falls back to the rig-wide default.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FixtureProfile {
    pub id: FixtureId,
    pub name: String,
    pub channels: ChannelMap,
    #[serde(default)]
    pub calibration: Option<Calibration>,
}

/// Everything wrong a rig description can be.
#[derive(Debug, Clone, Serialize, thiserror::Error)]
pub enum RigError {
    #[error("duplicate fixture id `{id}`")]
    DuplicateFixture { id: FixtureId },
    #[error("group `{group}` references unknown fixture `{id}`")]
    UnknownGroupMember { group: GroupName, id: FixtureId },
    #[error("order `{order}` references unknown fixture `{id}`")]
    UnknownOrderMember { order: OrderName, id: FixtureId },
    #[error("order `{order}` lists fixture `{id}` more than once")]
    DuplicateOrderMember { order: OrderName, id: FixtureId },
}

/// The rig: an ordered set of fixtures plus named groups and orders.
///
/// Construction validates every cross-reference, so a `RigProfile` value
/// is internally consistent for the whole compilation run. The `ALL`
/// group is populated automatically when the description omits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RigProfileRaw")]
pub struct RigProfile {
    fixtures: Vec<FixtureProfile>,
    groups: IndexMap<GroupName, Vec<FixtureId>>,
    orders: IndexMap<OrderName, Vec<FixtureId>>,
    default_calibration: Calibration,
}

#[derive(Deserialize)]
struct RigProfileRaw {
    fixtures: Vec<FixtureProfile>,
    #[serde(default)]
    groups: IndexMap<GroupName, Vec<FixtureId>>,
    #[serde(default)]
    orders: IndexMap<OrderName, Vec<FixtureId>>,
    #[serde(default)]
    default_calibration: Calibration,
}

impl TryFrom<RigProfileRaw> for RigProfile {
    type Error = RigError;
    fn try_from(raw: RigProfileRaw) -> Result<Self, RigError> {
        RigProfile::new(raw.fixtures, raw.groups, raw.orders, raw.default_calibration)
    }
}

impl RigProfile {
    /// Build a validated rig. Checks fixture uniqueness and that every
    /// group/order member names a declared fixture; orders additionally
    /// reject duplicates.
    pub fn new(
        fixtures: Vec<FixtureProfile>,
        mut groups: IndexMap<GroupName, Vec<FixtureId>>,
        orders: IndexMap<OrderName, Vec<FixtureId>>,
        default_calibration: Calibration,
    ) -> Result<Self, RigError> {
        let mut known: IndexSet<&FixtureId> = IndexSet::new();
        for fixture in &fixtures {
            if !known.insert(&fixture.id) {
                return Err(RigError::DuplicateFixture {
                    id: fixture.id.clone(),
                });
            }
        }

        for (group, members) in &groups {
            for id in members {
                if !known.contains(id) {
                    return Err(RigError::UnknownGroupMember {
                        group: group.clone(),
                        id: id.clone(),
                    });
                }
            }
        }

        for (order, members) in &orders {
            let mut seen: IndexSet<&FixtureId> = IndexSet::new();
            for id in members {
                if !known.contains(id) {
                    return Err(RigError::UnknownOrderMember {
                        order: order.clone(),
                        id: id.clone(),
                    });
                }
                if !seen.insert(id) {
                    return Err(RigError::DuplicateOrderMember {
                        order: order.clone(),
                        id: id.clone(),
                    });
                }
            }
        }

        let all = GroupName(ALL_GROUP.to_owned());
        if !groups.contains_key(&all) {
            let everyone: Vec<FixtureId> = fixtures.iter().map(|f| f.id.clone()).collect();
            groups.insert(all, everyone);
        }

        Ok(Self {
            fixtures,
            groups,
            orders,
            default_calibration,
        })
    }

    pub fn fixtures(&self) -> &[FixtureProfile] {
        &self.fixtures
    }

    pub fn fixture(&self, id: &FixtureId) -> Option<&FixtureProfile> {
        self.fixtures.iter().find(|f| &f.id == id)
    }

    pub fn group(&self, name: &GroupName) -> Option<&[FixtureId]> {
        self.groups.get(name).map(Vec::as_slice)
    }

    pub fn order(&self, name: &OrderName) -> Option<&[FixtureId]> {
        self.orders.get(name).map(Vec::as_slice)
    }

    /// Calibration for a fixture: its own entry, or the rig default.
    pub fn calibration(&self, id: &FixtureId) -> Calibration {
        self.fixture(id)
            .and_then(|f| f.calibration)
            .unwrap_or(self.default_calibration)
    }
}
