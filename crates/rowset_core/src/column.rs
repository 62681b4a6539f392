use crate::ColumnMeta;
use crate::sql_type::SqlType;
use bitflags::bitflags;
use serde::{Deserialize, Serialize};

bitflags! {
    /// Per-column attributes reported by the result set and table metadata.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct ColumnFlags: u8 {
        /// Computed or generated by the database; never written by inserts.
        const GENERATED = 1 << 0;
        /// The source allows edits to this column.
        const EDITABLE = 1 << 1;
        const NULLABLE = 1 << 2;
    }
}

/// Description of one result column. Immutable once a result set is loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDescriptor {
    pub name: String,
    pub sql_type: SqlType,
    pub type_name: String,
    pub flags: ColumnFlags,
}

impl ColumnDescriptor {
    pub fn new(name: impl Into<String>, sql_type: SqlType, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sql_type,
            type_name: type_name.into(),
            flags: ColumnFlags::EDITABLE | ColumnFlags::NULLABLE,
        }
    }

    pub fn with_flags(mut self, flags: ColumnFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn is_generated(&self) -> bool {
        self.flags.contains(ColumnFlags::GENERATED)
    }

    pub fn is_nullable(&self) -> bool {
        self.flags.contains(ColumnFlags::NULLABLE)
    }

    /// Editability as reported by the source alone.
    ///
    /// Key-column overrides are applied by the grid, not here.
    pub fn is_source_editable(&self) -> bool {
        self.flags.contains(ColumnFlags::EDITABLE) && !self.is_generated()
    }

    pub fn is_lob(&self) -> bool {
        self.sql_type.is_lob()
    }
}

/// Column attributes fetched from table metadata rather than the result set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnAttributes {
    pub name: String,
    pub generated: bool,
    pub editable: bool,
}

impl ColumnAttributes {
    pub fn new(name: impl Into<String>, generated: bool, editable: bool) -> Self {
        Self {
            name: name.into(),
            generated,
            editable,
        }
    }
}

/// A foreign key on a single referencing column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ForeignKeyConstraint {
    pub column_name: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

impl ForeignKeyConstraint {
    pub fn new(
        column_name: impl Into<String>,
        referenced_table: impl Into<String>,
        referenced_column: impl Into<String>,
    ) -> Self {
        Self {
            column_name: column_name.into(),
            referenced_table: referenced_table.into(),
            referenced_column: referenced_column.into(),
        }
    }
}

/// Key constraints of the table behind a grid.
///
/// The default (no keys) is the degraded shape used when constraint metadata
/// cannot be fetched: the grid becomes read-only and offers no value lists.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableConstraints {
    pub primary_keys: Vec<String>,
    pub foreign_keys: Vec<ForeignKeyConstraint>,
}

impl TableConstraints {
    pub fn new(primary_keys: Vec<String>, foreign_keys: Vec<ForeignKeyConstraint>) -> Self {
        Self {
            primary_keys,
            foreign_keys,
        }
    }

    pub fn has_primary_key(&self) -> bool {
        !self.primary_keys.is_empty()
    }

    pub fn is_primary_key(&self, column: &str) -> bool {
        self.primary_keys.iter().any(|pk| pk == column)
    }

    pub fn is_foreign_key(&self, column: &str) -> bool {
        self.foreign_keys.iter().any(|fk| fk.column_name == column)
    }

    pub fn foreign_key_columns(&self) -> Vec<&str> {
        self.foreign_keys
            .iter()
            .map(|fk| fk.column_name.as_str())
            .collect()
    }

    pub fn foreign_key_for(&self, column: &str) -> Option<&ForeignKeyConstraint> {
        self.foreign_keys.iter().find(|fk| fk.column_name == column)
    }
}

/// Build column descriptors from result metadata plus table column attributes.
///
/// Result columns without a matching attribute entry (joins, expressions)
/// keep the defaults: not generated, editable.
pub fn describe_columns(
    columns: &[ColumnMeta],
    attributes: &[ColumnAttributes],
) -> Vec<ColumnDescriptor> {
    columns
        .iter()
        .map(|meta| {
            let attrs = attributes.iter().find(|a| a.name == meta.name);

            let mut flags = ColumnFlags::empty();
            if meta.nullable {
                flags |= ColumnFlags::NULLABLE;
            }
            match attrs {
                Some(attrs) => {
                    if attrs.generated {
                        flags |= ColumnFlags::GENERATED;
                    }
                    if attrs.editable && !attrs.generated {
                        flags |= ColumnFlags::EDITABLE;
                    }
                }
                None => flags |= ColumnFlags::EDITABLE,
            }

            ColumnDescriptor {
                name: meta.name.clone(),
                sql_type: SqlType::from_code(meta.sql_type),
                type_name: meta.type_name.clone(),
                flags,
            }
        })
        .collect()
}
