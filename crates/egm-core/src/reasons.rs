//! Disable and enable reasons.
//!
//! A device is logically enabled only while its [`DisableReason`] set is
//! empty. Each [`EnableReason`] lifts a fixed subset of disable reasons, see
//! [`EnableReason::lifts`]. Severity between disable reasons is an explicit
//! table ([`DisableReason::SEVERITY_ORDER`]) rather than the bit values.

use bitflags::bitflags;
use std::fmt;

bitflags! {
    /// Why a device is currently unavailable. Several reasons may coexist.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DisableReason: u8 {
        /// A hardware fault or configuration defect.
        const ERROR = 0x01;
        /// The device itself reported that it is disabled.
        const DEVICE = 0x02;
        /// A host or service request (e.g. protocol host, maintenance mode).
        const SERVICE = 0x04;
        /// The device is not configured for use.
        const CONFIGURATION = 0x08;
    }
}

bitflags! {
    /// Why an enable was requested.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct EnableReason: u8 {
        /// Automatic recovery after all faults cleared.
        const RESET = 0x01;
        /// The device itself reported that it is enabled.
        const DEVICE = 0x02;
        /// An operator acknowledged the condition.
        const OPERATOR = 0x04;
    }
}

impl DisableReason {
    /// Most severe first. `most_severe` and `describe` follow this order.
    pub const SEVERITY_ORDER: [DisableReason; 4] = [
        DisableReason::ERROR,
        DisableReason::CONFIGURATION,
        DisableReason::DEVICE,
        DisableReason::SERVICE,
    ];

    /// Rank of a single reason in [`Self::SEVERITY_ORDER`] (0 is most severe).
    ///
    /// Returns `None` for the empty set or a combination of reasons.
    pub fn severity_rank(self) -> Option<usize> {
        Self::SEVERITY_ORDER.iter().position(|r| *r == self)
    }

    /// The most severe reason contained in this set.
    pub fn most_severe(self) -> Option<DisableReason> {
        Self::SEVERITY_ORDER
            .iter()
            .copied()
            .find(|reason| self.contains(*reason))
    }

    fn label(self) -> &'static str {
        if self == DisableReason::ERROR {
            "Error"
        } else if self == DisableReason::DEVICE {
            "Device"
        } else if self == DisableReason::SERVICE {
            "Service"
        } else if self == DisableReason::CONFIGURATION {
            "Configuration"
        } else {
            "Unknown"
        }
    }

    /// Operator-facing text listing every reason, most severe first.
    pub fn describe(self) -> String {
        if self.is_empty() {
            return "None".to_string();
        }
        Self::SEVERITY_ORDER
            .iter()
            .filter(|reason| self.contains(**reason))
            .map(|reason| reason.label())
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl fmt::Display for DisableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.describe())
    }
}

impl EnableReason {
    /// The disable reasons this enable reason is allowed to lift.
    pub fn lifts(self) -> DisableReason {
        let mut lifted = DisableReason::empty();
        if self.contains(EnableReason::RESET) {
            lifted |= DisableReason::ERROR;
        }
        if self.contains(EnableReason::DEVICE) {
            lifted |= DisableReason::DEVICE;
        }
        if self.contains(EnableReason::OPERATOR) {
            lifted |= DisableReason::ERROR | DisableReason::SERVICE | DisableReason::CONFIGURATION;
        }
        lifted
    }
}

impl fmt::Display for EnableReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let names: Vec<&str> = [
            (EnableReason::RESET, "Reset"),
            (EnableReason::DEVICE, "Device"),
            (EnableReason::OPERATOR, "Operator"),
        ]
        .iter()
        .filter(|(reason, _)| self.contains(*reason))
        .map(|(_, name)| *name)
        .collect();

        if names.is_empty() {
            write!(f, "None")
        } else {
            write!(f, "{}", names.join(", "))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case(DisableReason::ERROR | DisableReason::SERVICE, DisableReason::ERROR)]
    #[case(DisableReason::SERVICE | DisableReason::DEVICE, DisableReason::DEVICE)]
    #[case(DisableReason::SERVICE | DisableReason::CONFIGURATION, DisableReason::CONFIGURATION)]
    #[case(DisableReason::SERVICE, DisableReason::SERVICE)]
    fn test_most_severe(#[case] set: DisableReason, #[case] expected: DisableReason) {
        assert_eq!(set.most_severe(), Some(expected));
    }

    #[test]
    fn test_most_severe_empty() {
        assert_eq!(DisableReason::empty().most_severe(), None);
    }

    #[test]
    fn test_severity_rank_is_total_over_single_reasons() {
        let mut ranks: Vec<usize> = DisableReason::SEVERITY_ORDER
            .iter()
            .map(|r| r.severity_rank().unwrap())
            .collect();
        ranks.sort_unstable();
        assert_eq!(ranks, vec![0, 1, 2, 3]);
        assert_eq!((DisableReason::ERROR | DisableReason::DEVICE).severity_rank(), None);
    }

    #[test]
    fn test_describe_orders_by_severity() {
        let set = DisableReason::SERVICE | DisableReason::ERROR | DisableReason::DEVICE;
        assert_eq!(set.describe(), "Error, Device, Service");
        assert_eq!(DisableReason::empty().to_string(), "None");
    }

    #[rstest]
    #[case(EnableReason::RESET, DisableReason::ERROR)]
    #[case(EnableReason::DEVICE, DisableReason::DEVICE)]
    #[case(
        EnableReason::OPERATOR,
        DisableReason::ERROR | DisableReason::SERVICE | DisableReason::CONFIGURATION
    )]
    fn test_enable_reason_lifts(#[case] reason: EnableReason, #[case] expected: DisableReason) {
        assert_eq!(reason.lifts(), expected);
    }

    #[test]
    fn test_operator_does_not_lift_device() {
        assert!(!EnableReason::OPERATOR.lifts().contains(DisableReason::DEVICE));
    }

    #[test]
    fn test_enable_reason_display() {
        assert_eq!(EnableReason::RESET.to_string(), "Reset");
        assert_eq!(
            (EnableReason::DEVICE | EnableReason::OPERATOR).to_string(),
            "Device, Operator"
        );
    }
}
