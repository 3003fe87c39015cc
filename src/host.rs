//! Data carriers exchanged with the host planning and execution framework.

use crate::types::{AttrNum, TableId};
use crate::value::{LocalType, Value};

/// One column of the local relation.
#[derive(Clone, Debug)]
pub struct AttrDesc {
    pub num: AttrNum,
    pub name: String,
    pub ty: LocalType,
}

impl AttrDesc {
    pub fn new(num: u16, name: impl Into<String>, ty: LocalType) -> Self {
        Self {
            num: AttrNum(num),
            name: name.into(),
            ty,
        }
    }
}

/// Relation metadata looked up from the host catalog by table identifier.
#[derive(Clone, Debug)]
pub struct RelationDesc {
    pub id: TableId,
    pub name: String,
    pub attrs: Vec<AttrDesc>,
}

impl RelationDesc {
    pub fn new(id: u32, name: impl Into<String>, attrs: Vec<AttrDesc>) -> Self {
        Self {
            id: TableId(id),
            name: name.into(),
            attrs,
        }
    }

    pub fn attr(&self, num: AttrNum) -> Option<&AttrDesc> {
        self.attrs.iter().find(|a| a.num == num)
    }

    /// Position of the attribute within the relation's slot layout.
    pub fn attr_index(&self, num: AttrNum) -> Option<usize> {
        self.attrs.iter().position(|a| a.num == num)
    }

    pub fn width(&self) -> usize {
        self.attrs.len()
    }
}

/// Local row container filled by the materializer.
///
/// Every slot position is either a converted value or null; a freshly
/// created slot is all-null.
#[derive(Clone, Debug, PartialEq)]
pub struct TupleSlot {
    values: Vec<Option<Value>>,
}

impl TupleSlot {
    pub fn new(width: usize) -> Self {
        Self {
            values: vec![None; width],
        }
    }

    pub fn width(&self) -> usize {
        self.values.len()
    }

    pub fn set(&mut self, index: usize, value: Value) {
        self.values[index] = Some(value);
    }

    pub fn value(&self, index: usize) -> Option<&Value> {
        self.values.get(index).and_then(Option::as_ref)
    }

    pub fn is_null(&self, index: usize) -> bool {
        self.value(index).is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fresh_slots_are_all_null() {
        let slot = TupleSlot::new(3);
        assert_eq!(slot.width(), 3);
        assert!((0..3).all(|i| slot.is_null(i)));
    }

    #[test]
    fn attr_lookup_is_by_number_not_position() {
        let rel = RelationDesc::new(
            1,
            "t",
            vec![
                AttrDesc::new(4, "d", LocalType::Int4),
                AttrDesc::new(2, "b", LocalType::Text),
            ],
        );
        assert_eq!(rel.attr(AttrNum(2)).map(|a| a.name.as_str()), Some("b"));
        assert_eq!(rel.attr_index(AttrNum(2)), Some(1));
        assert!(rel.attr(AttrNum(1)).is_none());
    }
}
