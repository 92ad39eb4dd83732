// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// IEEE-1284 device ID parsing. The string is a semicolon-delimited list of
// `key:value` pairs reported by a device's transport (USB descriptor,
// SNMP `prtGeneralPrinterName`, or a socket-scheme banner); several keys
// are conventional aliases of each other and must be merged under one
// canonical name.

use std::collections::HashMap;

/// A parsed IEEE-1284 device ID, keyed by canonical field name.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceId {
    fields: HashMap<String, String>,
}

const MANUFACTURER_KEYS: &[&str] = &["MANUFACTURER", "MFG"];
const MODEL_KEYS: &[&str] = &["MODEL", "MDL"];
const COMMAND_SET_KEYS: &[&str] = &["COMMAND SET", "CMD"];
const SERIAL_KEYS: &[&str] = &["SERIALNUMBER", "SERN", "SN", "SER"];

fn canonicalize(key: &str) -> &'static str {
    let upper = key.trim().to_ascii_uppercase();
    if MANUFACTURER_KEYS.contains(&upper.as_str()) {
        "MANUFACTURER"
    } else if MODEL_KEYS.contains(&upper.as_str()) {
        "MODEL"
    } else if COMMAND_SET_KEYS.contains(&upper.as_str()) {
        "COMMAND SET"
    } else if SERIAL_KEYS.contains(&upper.as_str()) {
        "SERIALNUMBER"
    } else {
        // leaked as a 'static via leaking is wasteful; store original instead
        "OTHER"
    }
}

impl DeviceId {
    /// Parse a raw IEEE-1284 device ID string such as
    /// `"MFG:Acme;MDL:LaserJet 9000;CMD:PCL,PJL,PDF;CLS:PRINTER;"`. Newlines
    /// embedded within the string are normalized to `;` before splitting,
    /// since some devices wrap long values across lines instead of
    /// terminating them properly.
    pub fn parse(raw: &str) -> Self {
        let normalized = raw.replace("\r\n", ";").replace(['\n', '\r'], ";");
        let mut fields = HashMap::new();
        for pair in normalized.split(';') {
            let pair = pair.trim();
            if pair.is_empty() {
                continue;
            }
            let Some((key, value)) = pair.split_once(':') else {
                continue;
            };
            let value = value.trim().to_string();
            let canon = canonicalize(key);
            if canon == "OTHER" {
                fields.insert(key.trim().to_ascii_uppercase(), value);
            } else {
                fields.insert(canon.to_string(), value);
            }
        }
        Self { fields }
    }

    pub fn manufacturer(&self) -> Option<&str> {
        self.fields.get("MANUFACTURER").map(String::as_str)
    }

    pub fn model(&self) -> Option<&str> {
        self.fields.get("MODEL").map(String::as_str)
    }

    /// Command sets understood by the device, split on commas.
    pub fn command_sets(&self) -> Vec<String> {
        self.fields
            .get("COMMAND SET")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).collect())
            .unwrap_or_default()
    }

    pub fn serial_number(&self) -> Option<&str> {
        self.fields.get("SERIALNUMBER").map(String::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.fields.get(&key.to_ascii_uppercase()).map(String::as_str)
    }

    /// `"<manufacturer> <model>"`, falling back sensibly when either is
    /// absent; never returns an empty string for a non-empty device ID.
    pub fn make_and_model(&self) -> String {
        match (self.manufacturer(), self.model()) {
            (Some(mfg), Some(mdl)) => format!("{mfg} {mdl}"),
            (Some(mfg), None) => mfg.to_string(),
            (None, Some(mdl)) => mdl.to_string(),
            (None, None) => "Unknown device".to_string(),
        }
    }

    /// Serialize back to canonical IEEE-1284 form: `MFG:…;MDL:…;CMD:…;
    /// SERIALNUMBER:…;`, in that order, omitting fields that aren't present.
    /// `DeviceId::parse(&id.to_ieee1284())` round-trips to an equal value.
    pub fn to_ieee1284(&self) -> String {
        let mut out = String::new();
        if let Some(mfg) = self.manufacturer() {
            out.push_str("MFG:");
            out.push_str(mfg);
            out.push(';');
        }
        if let Some(mdl) = self.model() {
            out.push_str("MDL:");
            out.push_str(mdl);
            out.push(';');
        }
        let command_sets = self.command_sets();
        if !command_sets.is_empty() {
            out.push_str("CMD:");
            out.push_str(&command_sets.join(","));
            out.push(';');
        }
        if let Some(serial) = self.serial_number() {
            out.push_str("SERIALNUMBER:");
            out.push_str(serial);
            out.push(';');
        }
        out
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.to_ieee1284())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_canonical_keys() {
        let id = DeviceId::parse("MFG:Acme;MDL:LaserJet 9000;CMD:PCL,PJL;SERN:AB123;");
        assert_eq!(id.manufacturer(), Some("Acme"));
        assert_eq!(id.model(), Some("LaserJet 9000"));
        assert_eq!(id.command_sets(), vec!["PCL", "PJL"]);
        assert_eq!(id.serial_number(), Some("AB123"));
    }

    #[test]
    fn aliases_merge_to_same_field() {
        let long = DeviceId::parse("MANUFACTURER:Acme;MODEL:X1;COMMAND SET:PDF;SERIALNUMBER:S1;");
        let short = DeviceId::parse("MFG:Acme;MDL:X1;CMD:PDF;SERN:S1;");
        assert_eq!(long, short);
    }

    #[test]
    fn serial_number_aliases() {
        for key in ["SERIALNUMBER", "SERN", "SN", "SER"] {
            let id = DeviceId::parse(&format!("{key}:Z9;"));
            assert_eq!(id.serial_number(), Some("Z9"));
        }
    }

    #[test]
    fn make_and_model_falls_back() {
        let id = DeviceId::parse("CMD:PCL;");
        assert_eq!(id.make_and_model(), "Unknown device");
    }

    #[test]
    fn ignores_malformed_pairs() {
        let id = DeviceId::parse("MFG:Acme;garbage;MDL:X;");
        assert_eq!(id.manufacturer(), Some("Acme"));
        assert_eq!(id.model(), Some("X"));
    }

    #[test]
    fn serialize_then_parse_round_trips() {
        let original = DeviceId::parse("MFG:Acme;MDL:LaserJet 9000;CMD:PCL,PJL;SERN:AB123;");
        let serialized = original.to_ieee1284();
        assert_eq!(serialized, "MFG:Acme;MDL:LaserJet 9000;CMD:PCL,PJL;SERIALNUMBER:AB123;");
        assert_eq!(DeviceId::parse(&serialized), original);
    }

    #[test]
    fn embedded_newlines_normalize_to_semicolons() {
        let id = DeviceId::parse("MFG:Acme;\nMDL:X1;\r\nCMD:PDF;");
        assert_eq!(id.manufacturer(), Some("Acme"));
        assert_eq!(id.model(), Some("X1"));
        assert_eq!(id.command_sets(), vec!["PDF"]);
    }
}
