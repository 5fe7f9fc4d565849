//! Invariant checks excluded from coverage reports.

#![cfg_attr(coverage_nightly, coverage(off))]

use crate::schema::{EnumDef, EnumId, Schema, TableDef, TableId, UnionDef, UnionId};

impl Schema {
    pub(crate) fn ensure_table(&self, id: TableId) -> &TableDef {
        self.tables.get(id.0 as usize).unwrap_or_else(|| {
            panic!(
                "Schema: table id {} not found ({} tables; ids must come from the same schema)",
                id.0,
                self.tables.len()
            )
        })
    }

    pub(crate) fn ensure_enum(&self, id: EnumId) -> &EnumDef {
        self.enums.get(id.0 as usize).unwrap_or_else(|| {
            panic!(
                "Schema: enum id {} not found ({} enums; ids must come from the same schema)",
                id.0,
                self.enums.len()
            )
        })
    }

    pub(crate) fn ensure_union(&self, id: UnionId) -> &UnionDef {
        self.unions.get(id.0 as usize).unwrap_or_else(|| {
            panic!(
                "Schema: union id {} not found ({} unions; ids must come from the same schema)",
                id.0,
                self.unions.len()
            )
        })
    }
}
