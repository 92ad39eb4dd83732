// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Device/printer status-reasons bitfield. Uses the PWG 5100.3 common status
// reason set so a device transport's status bitfield and a printer's
// `printer-state-reasons` keyword attribute share one representation.

use bitflags::bitflags;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct DeviceStatusReason: u32 {
        const NONE                = 0;
        const MEDIA_JAM           = 1 << 0;
        const MEDIA_EMPTY         = 1 << 1;
        const MEDIA_LOW           = 1 << 2;
        const MEDIA_NEEDED        = 1 << 3;
        const COVER_OPEN          = 1 << 4;
        const DOOR_OPEN           = 1 << 5;
        const INPUT_TRAY_MISSING  = 1 << 6;
        const OUTPUT_TRAY_MISSING = 1 << 7;
        const OUTPUT_AREA_FULL    = 1 << 8;
        const MARKER_SUPPLY_EMPTY = 1 << 9;
        const MARKER_SUPPLY_LOW   = 1 << 10;
        const MARKER_WASTE_FULL   = 1 << 11;
        const MARKER_WASTE_ALMOST_FULL = 1 << 12;
        const FUSER_OVER_TEMP     = 1 << 13;
        const FUSER_UNDER_TEMP    = 1 << 14;
        const SPOOL_AREA_FULL     = 1 << 15;
        const CONNECTING_TO_DEVICE = 1 << 16;
        const TIMED_OUT           = 1 << 17;
        const STOPPING            = 1 << 18;
        const STOPPED_PARTLY      = 1 << 19;
        const PAUSED              = 1 << 20;
        const SHUTDOWN            = 1 << 21;
        const DOOR_OPEN_OR_INTERLOCK = 1 << 22;
        const OFFLINE             = 1 << 23;
    }
}

impl DeviceStatusReason {
    /// Map to the IPP `printer-state-reasons` keyword, with the `-error`,
    /// `-warning`, or `-report` severity suffix a conformant client expects.
    pub fn to_keywords(self) -> Vec<String> {
        let table: &[(Self, &str, &str)] = &[
            (Self::MEDIA_JAM, "media-jam", "error"),
            (Self::MEDIA_EMPTY, "media-empty", "error"),
            (Self::MEDIA_LOW, "media-low", "warning"),
            (Self::MEDIA_NEEDED, "media-needed", "error"),
            (Self::COVER_OPEN, "cover-open", "error"),
            (Self::DOOR_OPEN, "door-open", "error"),
            (Self::INPUT_TRAY_MISSING, "input-tray-missing", "error"),
            (Self::OUTPUT_TRAY_MISSING, "output-tray-missing", "warning"),
            (Self::OUTPUT_AREA_FULL, "output-area-full", "error"),
            (Self::MARKER_SUPPLY_EMPTY, "marker-supply-empty", "error"),
            (Self::MARKER_SUPPLY_LOW, "marker-supply-low", "warning"),
            (Self::MARKER_WASTE_FULL, "marker-waste-full", "error"),
            (Self::MARKER_WASTE_ALMOST_FULL, "marker-waste-almost-full", "warning"),
            (Self::FUSER_OVER_TEMP, "fuser-over-temp", "error"),
            (Self::FUSER_UNDER_TEMP, "fuser-under-temp", "error"),
            (Self::SPOOL_AREA_FULL, "spool-area-full", "error"),
            (Self::CONNECTING_TO_DEVICE, "connecting-to-device", "report"),
            (Self::TIMED_OUT, "timed-out", "error"),
            (Self::STOPPING, "stopping", "report"),
            (Self::STOPPED_PARTLY, "stopped-partly", "warning"),
            (Self::PAUSED, "paused", "report"),
            (Self::SHUTDOWN, "shutdown", "report"),
            (Self::DOOR_OPEN_OR_INTERLOCK, "interlock-open", "error"),
            (Self::OFFLINE, "offline", "error"),
        ];
        table
            .iter()
            .filter(|(flag, _, _)| self.contains(*flag))
            .map(|(_, kw, sev)| format!("{kw}-{sev}"))
            .collect()
    }

    /// Whether any contained reason should hold new jobs back (matches the
    /// "blocking" subset of PWG 5100.3, i.e. anything that is an `-error`).
    pub fn is_blocking(self) -> bool {
        !(self
            & (Self::MEDIA_JAM
                | Self::MEDIA_EMPTY
                | Self::MEDIA_NEEDED
                | Self::COVER_OPEN
                | Self::DOOR_OPEN
                | Self::INPUT_TRAY_MISSING
                | Self::OUTPUT_AREA_FULL
                | Self::MARKER_SUPPLY_EMPTY
                | Self::MARKER_WASTE_FULL
                | Self::FUSER_OVER_TEMP
                | Self::FUSER_UNDER_TEMP
                | Self::SPOOL_AREA_FULL
                | Self::TIMED_OUT
                | Self::DOOR_OPEN_OR_INTERLOCK
                | Self::OFFLINE))
            .is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_empty_blocks() {
        assert!(DeviceStatusReason::MEDIA_EMPTY.is_blocking());
    }

    #[test]
    fn media_low_does_not_block() {
        assert!(!DeviceStatusReason::MEDIA_LOW.is_blocking());
    }

    #[test]
    fn keyword_rendering_has_severity_suffix() {
        let r = DeviceStatusReason::MEDIA_JAM | DeviceStatusReason::MARKER_SUPPLY_LOW;
        let kws = r.to_keywords();
        assert!(kws.contains(&"media-jam-error".to_string()));
        assert!(kws.contains(&"marker-supply-low-warning".to_string()));
    }
}
