use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt::{Debug, Display, Formatter};
use std::str::FromStr;

/// The mechanism axes understood by the simulator.
///
/// Every axis except [AxisKind::Filter] is single choice: exactly one candidate is active when a
/// run is issued. The filter axis holds a set of simultaneously active entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AxisKind {
    MechType,
    ScaleNum,
    ScaleDownExec,
    ScaleUpExec,
    Sche,
    InstanceCachePolicy,
    Filter,
}

impl AxisKind {
    pub const ALL: [AxisKind; 7] = [
        AxisKind::MechType,
        AxisKind::ScaleNum,
        AxisKind::ScaleDownExec,
        AxisKind::ScaleUpExec,
        AxisKind::Sche,
        AxisKind::InstanceCachePolicy,
        AxisKind::Filter,
    ];

    pub fn name(self) -> &'static str {
        match self {
            AxisKind::MechType => "mech_type",
            AxisKind::ScaleNum => "scale_num",
            AxisKind::ScaleDownExec => "scale_down_exec",
            AxisKind::ScaleUpExec => "scale_up_exec",
            AxisKind::Sche => "sche",
            AxisKind::InstanceCachePolicy => "instance_cache_policy",
            AxisKind::Filter => "filter",
        }
    }

    pub fn is_filter(self) -> bool {
        self == AxisKind::Filter
    }

    /// Every candidate name the simulator knows for this axis, in declaration order.
    pub fn candidate_names(self) -> Vec<&'static str> {
        fn names<C: Candidate>() -> Vec<&'static str> {
            C::ALL.iter().map(|c| c.name()).collect()
        }

        match self {
            AxisKind::MechType => names::<MechType>(),
            AxisKind::ScaleNum => names::<ScaleNum>(),
            AxisKind::ScaleDownExec => names::<ScaleDownExec>(),
            AxisKind::ScaleUpExec => names::<ScaleUpExec>(),
            AxisKind::Sche => names::<Sche>(),
            AxisKind::InstanceCachePolicy => names::<InstanceCachePolicy>(),
            AxisKind::Filter => names::<Filter>(),
        }
    }
}

impl Display for AxisKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for AxisKind {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AxisKind::ALL
            .into_iter()
            .find(|axis| axis.name() == s)
            .ok_or_else(|| ConfigError::UnknownAxis(s.to_string()))
    }
}

/// A closed set of candidate names for one axis.
pub trait Candidate:
    Copy + Eq + Ord + Debug + Display + FromStr<Err = ConfigError> + Send + Sync + 'static
{
    const AXIS: AxisKind;
    const ALL: &'static [Self];

    fn name(self) -> &'static str;
}

macro_rules! candidates {
    (
        $(#[$meta:meta])*
        $ty:ident for $axis:ident { $($variant:ident => $name:literal),+ $(,)? }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        pub enum $ty {
            $(
                #[serde(rename = $name)]
                $variant,
            )+
        }

        impl Candidate for $ty {
            const AXIS: AxisKind = AxisKind::$axis;
            const ALL: &'static [Self] = &[$($ty::$variant),+];

            fn name(self) -> &'static str {
                match self {
                    $($ty::$variant => $name,)+
                }
            }
        }

        impl Display for $ty {
            fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.name())
            }
        }

        impl FromStr for $ty {
            type Err = ConfigError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($name => Ok($ty::$variant),)+
                    other => Err(ConfigError::UnknownCandidate {
                        axis: AxisKind::$axis,
                        candidate: other.to_string(),
                    }),
                }
            }
        }
    };
}

candidates! {
    /// How scaling and scheduling are composed.
    MechType for MechType {
        NoScale => "no_scale",
        ScaleScheSeparated => "scale_sche_separated",
        ScaleScheJoint => "scale_sche_joint",
    }
}

candidates! {
    /// Decides how many instances each function should have.
    ScaleNum for ScaleNum {
        No => "no",
        Hpa => "hpa",
        Lass => "lass",
        Ai => "ai",
        TempScaler => "temp_scaler",
        FullPlacement => "full_placement",
        Rela => "rela",
    }
}

candidates! {
    ScaleDownExec for ScaleDownExec {
        Default => "default",
    }
}

candidates! {
    ScaleUpExec for ScaleUpExec {
        No => "no",
        LeastTask => "least_task",
    }
}

candidates! {
    /// Request scheduler.
    Sche for Sche {
        RuleBased => "rule_based",
        TimeAware => "time_aware",
        Fnsche => "fnsche",
        Pos => "pos",
        LoadLeast => "load_least",
        Heft => "heft",
        BpBalance => "bp_balance",
        Faasflow => "faasflow",
        Priority => "priority",
        Rotate => "rotate",
        Greedy => "greedy",
        Pass => "pass",
        ConsistentHash => "consistenthash",
        Random => "random",
        Hash => "hash",
    }
}

candidates! {
    InstanceCachePolicy for InstanceCachePolicy {
        NoEvict => "no_evict",
        Lru => "lru",
        Fifo => "fifo",
    }
}

candidates! {
    /// Scale-down filters. Several may be active at once.
    Filter for Filter {
        CarefulDown => "careful_down",
    }
}

/// The active candidate of a single choice axis together with its parameter.
///
/// The parameter is kept as the simulator sees it: a string, empty when the candidate takes none.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Selected<C> {
    pub candidate: C,
    #[serde(default)]
    pub param: String,
}

impl<C: Candidate> Selected<C> {
    pub fn new(candidate: C, param: impl Into<String>) -> Self {
        Self {
            candidate,
            param: param.into(),
        }
    }

    /// Parse the candidate name, failing for names the axis does not know.
    pub fn parse(candidate: &str, param: impl Into<String>) -> Result<Self, ConfigError> {
        Ok(Self::new(candidate.parse()?, param))
    }

    pub fn name(&self) -> &'static str {
        self.candidate.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn axis_names_round_trip() {
        for axis in AxisKind::ALL {
            assert_eq!(axis, axis.name().parse::<AxisKind>().unwrap());
        }
    }

    #[test]
    fn unknown_candidate_names_the_axis() {
        let err = "magic".parse::<Sche>().unwrap_err();
        assert_eq!(
            err,
            ConfigError::UnknownCandidate {
                axis: AxisKind::Sche,
                candidate: "magic".to_string()
            }
        );
    }

    #[test]
    fn candidate_names_follow_declaration_order() {
        assert_eq!(
            vec!["no_evict", "lru", "fifo"],
            AxisKind::InstanceCachePolicy.candidate_names()
        );
    }

    #[test]
    fn serde_uses_simulator_names() {
        let json = serde_json::to_string(&Sche::ConsistentHash).unwrap();
        assert_eq!("\"consistenthash\"", json);
        let back: ScaleNum = serde_json::from_str("\"temp_scaler\"").unwrap();
        assert_eq!(ScaleNum::TempScaler, back);
    }
}
