//! Writing enrichment back into a record.

use serde_json::Value;

use super::flatten::flatten;
use super::normalize::CanonicalGeoRecord;
use super::Record;

/// Adds `canonical` to `record` under `out_key`.
///
/// An empty canonical record leaves `record` untouched. Otherwise the
/// nested form replaces whatever was at `out_key`, or, with `flatten`, each
/// `out_key_*` leaf is inserted individually. Unrelated fields are kept;
/// literal key collisions are overwritten.
pub fn merge(
    mut record: Record,
    out_key: &str,
    canonical: &CanonicalGeoRecord,
    flatten: bool,
) -> Record {
    if canonical.is_empty() {
        return record;
    }

    let enrichment = canonical.to_map();
    if flatten {
        record.extend(self::flatten(&enrichment, &[out_key]));
    } else {
        record.insert(out_key.to_string(), Value::Object(enrichment));
    }
    record
}
