//! Region/template lookup with manufacturer overrides.
//!
//! [`ResolverOverrideStore`] holds the base descriptors and the override
//! rules. It is never modified by override application: a printer gets a
//! [`WorkingSet`], a copy with the rule for its manufacturer, protocol and
//! firmware applied, which is what commands are built from.

use std::collections::BTreeMap;

use egm_core::{Error, Result};
use egm_hardware::DeviceInfo;
use tracing::{debug, warn};

use crate::descriptors::{DescriptorSet, OverrideRule, PrintableRegion, PrintableTemplate};

#[derive(Debug, Clone, Default)]
pub struct ResolverOverrideStore {
    regions: BTreeMap<u32, PrintableRegion>,
    templates: BTreeMap<u32, PrintableTemplate>,
    overrides: Vec<OverrideRule>,
}

impl ResolverOverrideStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_descriptors(set: DescriptorSet) -> Self {
        let mut store = Self::new();
        store.load(set.regions, set.templates);
        store.load_overrides(set.overrides);
        store
    }

    /// Replace the base descriptors.
    pub fn load(
        &mut self,
        regions: impl IntoIterator<Item = PrintableRegion>,
        templates: impl IntoIterator<Item = PrintableTemplate>,
    ) {
        self.regions = regions.into_iter().map(|r| (r.id, r)).collect();
        self.templates = templates.into_iter().map(|t| (t.id, t)).collect();
        debug!(
            "Loaded {} regions and {} templates",
            self.regions.len(),
            self.templates.len()
        );
    }

    /// Replace the override rules.
    pub fn load_overrides(&mut self, rules: impl IntoIterator<Item = OverrideRule>) {
        self.overrides = rules.into_iter().collect();
    }

    /// Add or replace one region.
    pub fn add_region(&mut self, region: PrintableRegion) {
        self.regions.insert(region.id, region);
    }

    /// Add or replace one template.
    pub fn add_template(&mut self, template: PrintableTemplate) {
        self.templates.insert(template.id, template);
    }

    pub fn region(&self, id: u32) -> Option<&PrintableRegion> {
        self.regions.get(&id)
    }

    pub fn template(&self, id: u32) -> Option<&PrintableTemplate> {
        self.templates.get(&id)
    }

    /// Most specific rule for a printer.
    ///
    /// `manufacturer_protocol` must match exactly. A rule naming the same
    /// firmware wins over a rule for any firmware; `None` means the
    /// descriptors are used as they are.
    pub fn resolve_override(
        &self,
        manufacturer_protocol: &str,
        firmware_id: Option<&str>,
    ) -> Option<&OverrideRule> {
        let mut candidates = self
            .overrides
            .iter()
            .filter(|rule| rule.manufacturer_protocol == manufacturer_protocol);

        let exact = candidates
            .clone()
            .find(|rule| rule.firmware_id.is_some() && rule.firmware_id.as_deref() == firmware_id);

        exact.or_else(|| candidates.find(|rule| rule.firmware_id.is_none()))
    }

    /// Descriptors as they apply to the printer described by `info`.
    pub fn working_set(&self, info: &DeviceInfo) -> WorkingSet {
        let key = info.manufacturer_protocol();
        let rule = self.resolve_override(&key, info.firmware_id.as_deref());
        match rule {
            Some(rule) => debug!(
                "Applying overrides for '{}' (firmware {:?})",
                key, rule.firmware_id
            ),
            None => debug!("No overrides for '{}'", key),
        }

        let regions = self
            .regions
            .values()
            .map(|region| match rule {
                Some(rule) => apply_font_override(region, rule),
                None => region.clone(),
            })
            .map(|r| (r.id, r))
            .collect();
        let templates = self
            .templates
            .values()
            .map(|template| match rule {
                Some(rule) => apply_template_override(template, rule),
                None => template.clone(),
            })
            .map(|t| (t.id, t))
            .collect();

        WorkingSet { regions, templates }
    }
}

/// Copy of `region` with the rule's font substituted, if it names one.
pub fn apply_font_override(region: &PrintableRegion, rule: &OverrideRule) -> PrintableRegion {
    let mut region = region.clone();
    if let Some(font) = rule.fonts.get(&region.id) {
        region.font = font.clone();
    }
    region
}

/// Copy of `template` with the rule's region list substituted, if it names one.
pub fn apply_template_override(
    template: &PrintableTemplate,
    rule: &OverrideRule,
) -> PrintableTemplate {
    let mut template = template.clone();
    if let Some(regions) = rule.templates.get(&template.id) {
        template.regions = regions.clone();
    }
    template
}

/// A template with its regions looked up, in template order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedTemplate {
    pub template: PrintableTemplate,
    pub regions: Vec<PrintableRegion>,
}

/// Per-printer descriptors, overrides applied.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WorkingSet {
    regions: BTreeMap<u32, PrintableRegion>,
    templates: BTreeMap<u32, PrintableTemplate>,
}

impl WorkingSet {
    pub fn regions(&self) -> impl Iterator<Item = &PrintableRegion> {
        self.regions.values()
    }

    pub fn templates(&self) -> impl Iterator<Item = &PrintableTemplate> {
        self.templates.values()
    }

    /// Find the template printing `ticket_type` and its regions.
    ///
    /// # Errors
    ///
    /// [`Error::TemplateNotFound`] or [`Error::RegionNotFound`]; both are
    /// configuration defects.
    pub fn resolve(&self, ticket_type: &str) -> Result<ResolvedTemplate> {
        let template = self
            .templates
            .values()
            .find(|t| t.name == ticket_type)
            .ok_or_else(|| Error::TemplateNotFound(ticket_type.to_string()))?;

        let regions = template
            .regions
            .iter()
            .map(|id| {
                self.regions.get(id).cloned().ok_or_else(|| {
                    warn!("Template {} references missing region {}", template.id, id);
                    Error::RegionNotFound {
                        template: template.id,
                        region: *id,
                    }
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(ResolvedTemplate {
            template: template.clone(),
            regions,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn store() -> ResolverOverrideStore {
        let mut store = ResolverOverrideStore::new();
        store.load(
            vec![
                PrintableRegion::new(1, "amount", "F2"),
                PrintableRegion::new(2, "validation", "F3"),
                PrintableRegion::new(3, "barcode", "BC1"),
            ],
            vec![
                PrintableTemplate::new(101, "cashout", vec![1, 2, 3]),
                PrintableTemplate::new(102, "jackpot", vec![1, 4]),
            ],
        );
        store.load_overrides(vec![
            OverrideRule::new("JCM GDS").font(1, "F7"),
            OverrideRule::new("JCM GDS")
                .for_firmware("GEN2-2.0")
                .font(1, "F9")
                .template(101, vec![3, 1]),
            OverrideRule::new("TransAct GDS").font(2, "F1"),
        ]);
        store
    }

    #[rstest]
    #[case("JCM GDS", Some("GEN2-2.0"), Some(Some("GEN2-2.0")))]
    #[case("JCM GDS", Some("GEN2-1.0"), Some(None))]
    #[case("JCM GDS", None, Some(None))]
    #[case("JCM TCL", Some("GEN2-2.0"), None)]
    #[case("jcm gds", None, None)]
    fn test_resolve_override(
        #[case] key: &str,
        #[case] firmware: Option<&str>,
        #[case] expected_firmware: Option<Option<&str>>,
    ) {
        let store = store();
        let rule = store.resolve_override(key, firmware);
        assert_eq!(rule.map(|r| r.firmware_id.as_deref()), expected_firmware);
    }

    #[test]
    fn test_working_set_applies_firmware_rule() {
        let store = store();
        let info = DeviceInfo::new("JCM", "GEN2U", "GDS").with_firmware_id("GEN2-2.0");
        let working = store.working_set(&info);

        let resolved = working.resolve("cashout").unwrap();
        let ids: Vec<u32> = resolved.regions.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![3, 1]);
        assert_eq!(resolved.regions[1].font, "F9");

        // Base descriptors untouched
        assert_eq!(store.region(1).unwrap().font, "F2");
        assert_eq!(store.template(101).unwrap().regions, vec![1, 2, 3]);
    }

    #[test]
    fn test_working_set_without_rule() {
        let store = store();
        let info = DeviceInfo::new("Nanoptix", "PayCheck 4", "TCL");
        let working = store.working_set(&info);
        assert_eq!(working.resolve("cashout").unwrap().regions[0].font, "F2");
    }

    #[test]
    fn test_resolve_missing_template() {
        let working = store().working_set(&DeviceInfo::new("Mock", "Mock", "MOCK"));
        assert!(matches!(
            working.resolve("voucher"),
            Err(Error::TemplateNotFound(name)) if name == "voucher"
        ));
    }

    #[test]
    fn test_resolve_missing_region() {
        let working = store().working_set(&DeviceInfo::new("Mock", "Mock", "MOCK"));
        assert!(matches!(
            working.resolve("jackpot"),
            Err(Error::RegionNotFound { template: 102, region: 4 })
        ));
    }

    #[test]
    fn test_load_replaces_contents() {
        let mut store = store();
        store.load(vec![PrintableRegion::new(9, "x", "F1")], Vec::new());
        assert!(store.region(1).is_none());
        assert!(store.template(101).is_none());
        assert!(store.region(9).is_some());
    }

    #[test]
    fn test_add_template_replaces_by_id() {
        let mut store = store();
        store.add_template(PrintableTemplate::new(102, "jackpot", vec![1]));
        let working = store.working_set(&DeviceInfo::new("Mock", "Mock", "MOCK"));
        assert_eq!(working.resolve("jackpot").unwrap().regions.len(), 1);
    }

    #[test]
    fn test_apply_overrides_are_pure() {
        let region = PrintableRegion::new(2, "validation", "F3");
        let rule = OverrideRule::new("TransAct GDS").font(2, "F1");
        let overridden = apply_font_override(&region, &rule);
        assert_eq!(overridden.font, "F1");
        assert_eq!(region.font, "F3");

        let template = PrintableTemplate::new(5, "x", vec![1]);
        assert_eq!(apply_template_override(&template, &rule), template);
    }
}
