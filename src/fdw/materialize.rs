//! Conversion of one remote result row into a local tuple.

use crate::error::{FdwError, Result};
use crate::host::{RelationDesc, TupleSlot};
use crate::remote::{ColumnDesc, RemoteCursor};
use crate::types::AttrNum;
use crate::value::convert_raw;

/// Fills a full-width local row from the cursor's current remote row.
///
/// Result columns are matched to local attributes by name (first match
/// wins). Attributes with no matching descriptor stay null and consume no
/// remote column position; matched attributes read the next position in
/// left-to-right order, which keeps the correspondence between the
/// projection list and the values actually retrieved.
pub fn materialize_row(
    rel: &RelationDesc,
    retrieved_attrs: &[AttrNum],
    columns: &[ColumnDesc],
    cursor: &dyn RemoteCursor,
) -> Result<TupleSlot> {
    let mut slot = TupleSlot::new(rel.width());
    let mut position = 0usize;
    for &num in retrieved_attrs {
        let attr = rel
            .attr(num)
            .ok_or(FdwError::Invalid("retrieved attribute missing from relation"))?;
        let Some(desc) = columns.iter().find(|c| c.name == attr.name) else {
            // Renamed or missing remote columns degrade to null rather than
            // failing the scan.
            continue;
        };
        let len = cursor.field_len(position)?;
        let raw = if len == 0 { None } else { cursor.field(position)? };
        if let Some(value) = convert_raw(raw, desc.ty, attr.ty, &attr.name)? {
            let index = rel
                .attr_index(num)
                .ok_or(FdwError::Invalid("retrieved attribute missing from relation"))?;
            slot.set(index, value);
        }
        position += 1;
    }
    Ok(slot)
}
