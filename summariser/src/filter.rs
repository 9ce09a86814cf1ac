use crate::report::{AliasRule, ReportError};
use campaign_core::prelude::{FlatConfig, Fingerprint};
use itertools::Itertools;
use std::collections::BTreeMap;

/// Whether every `field == value` pair holds for `flat`.
///
/// Naming a field that flat configurations do not have is an error rather than a mismatch.
pub(crate) fn matches_all(
    flat: &FlatConfig,
    predicate: &BTreeMap<String, String>,
) -> Result<bool, ReportError> {
    for (field, expected) in predicate {
        let actual = flat
            .get(field)
            .ok_or_else(|| ReportError::UnknownField(field.clone()))?;
        if actual != expected {
            return Ok(false);
        }
    }
    Ok(true)
}

/// Keep the fingerprints whose flat configuration matches every filter entry and at least one
/// alias rule, with their run files sorted by name.
pub fn select_fingerprints(
    index: &BTreeMap<Fingerprint, Vec<String>>,
    filter: &BTreeMap<String, String>,
    targets_alias: &[AliasRule],
) -> Result<BTreeMap<Fingerprint, Vec<String>>, ReportError> {
    let mut selected = BTreeMap::new();
    for (fingerprint, files) in index {
        let flat = fingerprint.decode();
        if !matches_all(&flat, filter)? {
            log::debug!("Filtered out {fingerprint}");
            continue;
        }

        let mut targeted = false;
        for rule in targets_alias {
            if matches_all(&flat, &rule.0)? {
                targeted = true;
                break;
            }
        }
        if !targeted {
            log::debug!("No alias rule for {fingerprint}");
            continue;
        }

        selected.insert(fingerprint.clone(), files.iter().cloned().sorted().collect());
    }

    Ok(selected)
}
