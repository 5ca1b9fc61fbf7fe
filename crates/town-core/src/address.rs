//! Agent addresses differ between the status source (`rig/name` for hooks)
//! and the issue tracker (`rig/role/name` assignees). These helpers map both
//! onto comparable forms.

const POLECAT_SEGMENT: &str = "polecats";

/// Trims surrounding whitespace and trailing separators (`mayor/` -> `mayor`).
pub fn canonical_address(address: &str) -> String {
    address.trim().trim_end_matches('/').to_string()
}

/// The rig segment of an address. An address without `/` is a single segment.
pub fn rig_of(address: &str) -> &str {
    let trimmed = address.trim();
    match trimmed.split_once('/') {
        Some((rig, _)) => rig,
        None => trimmed,
    }
}

/// Expands a two-segment `rig/name` address into `rig/polecats/name`.
pub fn polecat_address(address: &str) -> Option<String> {
    let canonical = canonical_address(address);
    let mut segments = canonical.split('/');
    let rig = segments.next()?;
    let name = segments.next()?;
    if segments.next().is_some() || rig.is_empty() || name.is_empty() {
        return None;
    }
    Some(format!("{rig}/{POLECAT_SEGMENT}/{name}"))
}

/// Every form under which a declared hook may appear as a tracker assignee,
/// in match order.
pub fn address_candidates(address: &str) -> Vec<String> {
    let canonical = canonical_address(address);
    if canonical.is_empty() {
        return Vec::new();
    }
    let mut candidates = vec![canonical.clone()];
    if let Some(polecat) = polecat_address(&canonical) {
        candidates.push(polecat);
    }
    candidates
}
