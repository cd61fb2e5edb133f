//! Lifecycle version consistency against the secured version.

use crate::model::CheckFailure;

/// Compare the database lifecycle version with the secured one.
///
/// A database version ahead of the secured one is expected while the newest
/// traceability operation has not run yet (WARN); if a later operation exists
/// and still secured an older version, the object is KO.
pub fn check_version(
    lfc_version: i64,
    secured_version: i64,
    is_last_securisation: bool,
) -> Result<(), CheckFailure> {
    if lfc_version == secured_version {
        return Ok(());
    }
    if lfc_version < secured_version {
        return Err(CheckFailure::ko(format!(
            "Invalid version. Database version ({lfc_version}) cannot be lower than secured one ({secured_version})"
        )));
    }
    if is_last_securisation {
        Err(CheckFailure::warn(format!(
            "Invalid version. Database version ({lfc_version}) not yet secured. Last secured version was ({secured_version})"
        )))
    } else {
        Err(CheckFailure::ko(format!(
            "Invalid version. Database version ({lfc_version}) has not been secured. Last secured version was ({secured_version})"
        )))
    }
}
