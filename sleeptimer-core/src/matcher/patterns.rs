//! Command pattern tables recognised on the serial line.

use super::{Pattern, Segment};

/// `SLEEPTIME <minutes>min:<mode>` as printed by the sleep script on the host.
pub const SLEEPTIME: Pattern = Pattern::new(
    "sleeptime",
    &[
        Segment::Literal(b"SLEEPTIME "),
        Segment::Digits,
        Segment::Literal(b"min:"),
        Segment::Flag,
    ],
);

/// Final kernel message once the host has halted.
pub const HALT: Pattern = Pattern::new("halt", &[Segment::Literal(b"reboot: System halted")]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tables_are_well_formed() {
        assert_eq!(SLEEPTIME.segments().len(), 4);
        assert_eq!(HALT.segments().len(), 1);
        for pattern in [SLEEPTIME, HALT] {
            for segment in pattern.segments() {
                if let Segment::Literal(text) = segment {
                    assert!(!text.is_empty(), "{} has an empty literal", pattern.name());
                }
            }
        }
    }
}
