// src/services/filter.rs

//! Criteria filter.

use crate::models::{SelectionPolicy, SiteRecord};

/// Whether a site satisfies the policy.
///
/// The site must serve the policy architecture (or declare that it serves
/// all of them) and have an endpoint for every required protocol. Release
/// is not checked here: the directory lists mirrors of the whole archive.
pub fn matches(site: &SiteRecord, policy: &SelectionPolicy) -> bool {
    site.architectures.serves(&policy.architecture) && site.serves_protocols(&policy.protocols)
}

/// Borrowing filter over a record slice, in directory order.
pub fn candidates<'a>(
    sites: &'a [SiteRecord],
    policy: &'a SelectionPolicy,
) -> impl Iterator<Item = &'a SiteRecord> + 'a {
    sites.iter().filter(move |site| matches(site, policy))
}
