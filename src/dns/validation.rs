//! Namespace-ownership validation for names under the zone apex
//!
//! Every stored name must belong to exactly one subdomain sitting directly
//! under the apex. The checks here are deliberately literal: the
//! repeated-apex rule guards against one subdomain embedding the apex again
//! to forge ownership of another, and a short reserved list keeps the
//! service's own labels out of user hands.

use crate::dns::errors::{Result, ZoneError};

/// The fixed zone apex all playground subdomains are delegated under.
pub const ZONE_APEX: &str = "messwithdns.net.";

/// Labels the service itself answers for; never valid as an owner label.
const RESERVED_LABELS: &[&str] = &["www", "ns1", "ns2"];

/// Check that `name` is a well-formed name owned by `subdomain`.
///
/// Each rule is a distinct failure so callers can report precisely what was
/// wrong with a submitted record name.
pub fn subdomain_error(name: &str, subdomain: &str) -> Result<()> {
    if !name.ends_with('.') {
        return Err(ZoneError::Validation(format!(
            "{} is not fully qualified (must end with .)",
            name
        )));
    }

    let labels: Vec<&str> = name.split('.').collect();
    // the final element after splitting is the empty root label; any other
    // empty label means consecutive dots
    if labels[..labels.len() - 1].iter().any(|l| l.is_empty()) {
        return Err(ZoneError::Validation(format!(
            "{} contains an empty label",
            name
        )));
    }

    if name.matches(ZONE_APEX).count() > 1 {
        return Err(ZoneError::Validation(format!(
            "{} contains {} more than once",
            name, ZONE_APEX
        )));
    }

    if RESERVED_LABELS.contains(&subdomain) {
        return Err(ZoneError::Validation(format!(
            "{} is a reserved subdomain",
            subdomain
        )));
    }

    if owner_label(name) != subdomain {
        return Err(ZoneError::Validation(format!(
            "{} is not directly under {}.{}",
            name, subdomain, ZONE_APEX
        )));
    }

    Ok(())
}

/// The label directly under the apex, identifying which subdomain owns
/// `name`. Empty if the name is the apex itself or does not end in the apex.
pub fn owner_label(name: &str) -> &str {
    let rest = match name.strip_suffix(ZONE_APEX) {
        Some(rest) => rest,
        None => return "",
    };
    // the apex itself, or a name like "xmesswithdns.net." where the apex is
    // not on a label boundary
    let rest = match rest.strip_suffix('.') {
        Some(rest) => rest,
        None => return "",
    };
    rest.rsplit('.').next().unwrap_or("")
}
