//! Declarative region, template and override descriptors.
//!
//! These are the data a descriptor loader produces. A [`DescriptorSet`] can
//! be read from JSON so the simulator and tests can supply one.

use std::collections::BTreeMap;
use std::path::Path;

use egm_core::Result;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Justification {
    #[default]
    Left,
    Center,
    Right,
}

/// Placement of a region on the ticket, in printer dots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RegionGeometry {
    pub x: u16,
    pub y: u16,
    pub width: u16,
    pub height: u16,
    /// Rotation in degrees (0, 90, 180, 270).
    #[serde(default)]
    pub rotation: u16,
}

/// A printable field area.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintableRegion {
    pub id: u32,
    /// Ticket field rendered into this region.
    pub name: String,
    pub geometry: RegionGeometry,
    pub font: String,
    #[serde(default)]
    pub justification: Justification,
}

impl PrintableRegion {
    pub fn new(id: u32, name: impl Into<String>, font: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            geometry: RegionGeometry::default(),
            font: font.into(),
            justification: Justification::default(),
        }
    }

    pub fn with_geometry(mut self, geometry: RegionGeometry) -> Self {
        self.geometry = geometry;
        self
    }

    pub fn with_justification(mut self, justification: Justification) -> Self {
        self.justification = justification;
        self
    }
}

/// A ticket layout: an ordered list of region ids.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrintableTemplate {
    pub id: u32,
    /// Ticket type this template prints (e.g. "cashout").
    pub name: String,
    pub regions: Vec<u32>,
}

impl PrintableTemplate {
    pub fn new(id: u32, name: impl Into<String>, regions: impl Into<Vec<u32>>) -> Self {
        Self {
            id,
            name: name.into(),
            regions: regions.into(),
        }
    }
}

/// Substitutions for one printer family.
///
/// Applies when `manufacturer_protocol` matches exactly and `firmware_id`
/// either matches or is `None` (any firmware).
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct OverrideRule {
    pub manufacturer_protocol: String,
    pub firmware_id: Option<String>,
    /// Region id to replacement font.
    pub fonts: BTreeMap<u32, String>,
    /// Template id to replacement region list.
    pub templates: BTreeMap<u32, Vec<u32>>,
}

impl OverrideRule {
    pub fn new(manufacturer_protocol: impl Into<String>) -> Self {
        Self {
            manufacturer_protocol: manufacturer_protocol.into(),
            ..Default::default()
        }
    }

    pub fn for_firmware(mut self, firmware_id: impl Into<String>) -> Self {
        self.firmware_id = Some(firmware_id.into());
        self
    }

    pub fn font(mut self, region: u32, font: impl Into<String>) -> Self {
        self.fonts.insert(region, font.into());
        self
    }

    pub fn template(mut self, template: u32, regions: impl Into<Vec<u32>>) -> Self {
        self.templates.insert(template, regions.into());
        self
    }
}

/// Everything a descriptor loader hands to the resolver.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DescriptorSet {
    pub regions: Vec<PrintableRegion>,
    pub templates: Vec<PrintableTemplate>,
    pub overrides: Vec<OverrideRule>,
}

impl DescriptorSet {
    pub fn from_json_str(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_set_from_json() {
        let set = DescriptorSet::from_json_str(
            r#"{
                "regions": [
                    { "id": 1, "name": "amount", "font": "F2",
                      "geometry": { "x": 10, "y": 20, "width": 300, "height": 40 } }
                ],
                "templates": [ { "id": 101, "name": "cashout", "regions": [1] } ],
                "overrides": [
                    { "manufacturer_protocol": "JCM GDS", "fonts": { "1": "F9" } }
                ]
            }"#,
        )
        .unwrap();

        assert_eq!(set.regions[0].justification, Justification::Left);
        assert_eq!(set.regions[0].geometry.rotation, 0);
        assert_eq!(set.templates[0].regions, vec![1]);
        assert_eq!(set.overrides[0].fonts.get(&1).map(String::as_str), Some("F9"));
        assert_eq!(set.overrides[0].firmware_id, None);
    }

    #[test]
    fn test_override_builder() {
        let rule = OverrideRule::new("TransAct GDS")
            .for_firmware("EP950-1.22")
            .font(3, "F1")
            .template(101, vec![1, 3]);

        assert_eq!(rule.firmware_id.as_deref(), Some("EP950-1.22"));
        assert_eq!(rule.templates[&101], vec![1, 3]);
    }
}
