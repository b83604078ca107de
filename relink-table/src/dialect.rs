//! Identifier normalization against the remote source's dialect.
//!
//! Identifiers read from a remote catalog arrive in whatever case the source
//! stores them. Normalization maps them to the canonical form the local
//! engine expects, driven by the dialect flags captured at connect time plus
//! a vendor-family override for sources whose flag reporting is unreliable.

use relink_remote::DialectFlags;

/// Vendor family derived from the connection URL prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorFamily {
    /// MySQL and MariaDB report dialect flags that cannot be trusted for
    /// case normalization; identifiers are uppercased unconditionally.
    MySql,
    Generic,
}

/// Classify the remote source by its connection URL.
pub fn vendor_family_for_url(url: &str) -> VendorFamily {
    let lower = url.to_ascii_lowercase();
    let rest = lower.strip_prefix("jdbc:").unwrap_or(&lower);
    if rest.starts_with("mysql:") || rest.starts_with("mariadb:") {
        VendorFamily::MySql
    } else {
        VendorFamily::Generic
    }
}

/// Canonicalize one identifier read from the remote catalog.
///
/// The rules apply in order; the first that matches wins:
/// 1. MySQL-family sources: uppercase unconditionally (their names are not
///    case sensitive on any platform).
/// 2. Source stores identifiers mixed-case or lower-cased and the name equals
///    its own lower-cased form: the unquoted stored form, uppercase it.
/// 3. Source stores mixed case but does not support mixed-case identifiers:
///    the stored case is meaningless, uppercase (TeraData).
/// 4. Source stores mixed case even when quoted: identifiers are case
///    insensitive regardless of quoting, uppercase (MS SQL Server).
/// 5. Otherwise: unchanged.
pub fn normalize_identifier(name: &str, flags: DialectFlags, vendor: VendorFamily) -> String {
    if vendor == VendorFamily::MySql {
        name.to_ascii_uppercase()
    } else if (flags.stores_mixed_case || flags.stores_lower_case)
        && name == name.to_ascii_lowercase()
    {
        name.to_ascii_uppercase()
    } else if flags.stores_mixed_case && !flags.supports_mixed_case {
        name.to_ascii_uppercase()
    } else if flags.stores_mixed_case && flags.stores_mixed_case_quoted {
        name.to_ascii_uppercase()
    } else {
        name.to_string()
    }
}
