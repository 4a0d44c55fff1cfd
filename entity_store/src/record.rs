//! Row-to-entity mapping
//!
//! Columns are matched to fields by name, ignoring case. A field whose column
//! is absent from the row keeps its default value, and columns that match no
//! field are ignored.

use std::collections::HashMap;

use type_mapping::{CoercionError, SqlValue};

use crate::traits::Entity;

/// One row of a result set
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ResultRow {
    columns: Vec<String>,
    values: Vec<Option<SqlValue>>,
}

impl ResultRow {
    /// Build a row from parallel column and value lists; a missing trailing
    /// value reads as NULL
    pub fn new(columns: Vec<String>, mut values: Vec<Option<SqlValue>>) -> Self {
        values.resize(columns.len(), None);
        Self { columns, values }
    }

    pub fn from_pairs<I, S>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, Option<SqlValue>)>,
        S: Into<String>,
    {
        let (columns, values) = pairs
            .into_iter()
            .map(|(column, value)| (column.into(), value))
            .unzip();
        Self { columns, values }
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    /// Value at `ordinal`; `None` for NULL or an out-of-range ordinal
    pub fn value(&self, ordinal: usize) -> Option<&SqlValue> {
        self.values.get(ordinal).and_then(Option::as_ref)
    }

    /// Value of the first column named `column`, ignoring case
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|name| name.eq_ignore_ascii_case(column))
            .and_then(|ordinal| self.value(ordinal))
    }
}

/// Case-insensitive column name to ordinal lookup for one result set
#[derive(Debug, Clone, Default)]
pub struct ColumnIndex {
    ordinals: HashMap<String, usize>,
}

impl ColumnIndex {
    pub fn new(columns: &[String]) -> Self {
        let mut ordinals = HashMap::with_capacity(columns.len());
        for (ordinal, column) in columns.iter().enumerate() {
            // first occurrence of a duplicated name wins
            ordinals.entry(column.to_lowercase()).or_insert(ordinal);
        }
        Self { ordinals }
    }

    pub fn ordinal(&self, column: &str) -> Option<usize> {
        self.ordinals.get(&column.to_lowercase()).copied()
    }
}

/// Construct `T` from one row
pub fn map_record<T: Entity>(row: &ResultRow) -> Result<T, CoercionError> {
    map_with_index(&ColumnIndex::new(row.columns()), row)
}

/// Map every row of a result set, building the column index once
pub fn map_rows<T: Entity>(rows: &[ResultRow]) -> Result<Vec<T>, CoercionError> {
    let Some(first) = rows.first() else {
        return Ok(Vec::new());
    };
    let index = ColumnIndex::new(first.columns());
    rows.iter().map(|row| map_with_index(&index, row)).collect()
}

fn map_with_index<T: Entity>(index: &ColumnIndex, row: &ResultRow) -> Result<T, CoercionError> {
    let mut entity = T::default();
    for (field_index, field) in T::fields().iter().enumerate() {
        if let Some(ordinal) = index.ordinal(field.column) {
            entity.set_field(field_index, row.value(ordinal).cloned())?;
        }
    }
    Ok(entity)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Entity, SqlEnum};

    #[derive(Debug, Clone, Copy, PartialEq, Default, SqlEnum)]
    #[repr(i16)]
    enum Level {
        #[default]
        Beginner = 1,
        Advanced = 2,
    }

    #[derive(Debug, Default, PartialEq, Entity)]
    struct Pupil {
        #[column(name = "PupilID")]
        id: i32,
        pupil_name: String,
        nickname: Option<String>,
        level: Level,
        enrolled: bool,
    }

    fn row(pairs: Vec<(&str, Option<SqlValue>)>) -> ResultRow {
        ResultRow::from_pairs(pairs)
    }

    #[test]
    fn test_maps_matching_columns_ignoring_case() {
        let row = row(vec![
            ("pupilid", Some(SqlValue::Integer(7))),
            ("PUPILNAME", Some(SqlValue::Text("Ana".into()))),
            ("Nickname", None),
            ("Level", Some(SqlValue::SmallInt(2))),
            ("Enrolled", Some(SqlValue::Boolean(true))),
        ]);

        let pupil: Pupil = map_record(&row).unwrap();
        assert_eq!(
            pupil,
            Pupil {
                id: 7,
                pupil_name: "Ana".into(),
                nickname: None,
                level: Level::Advanced,
                enrolled: true,
            }
        );
    }

    #[test]
    fn test_missing_columns_keep_defaults_and_extras_are_ignored() {
        let row = row(vec![
            ("PupilID", Some(SqlValue::BigInt(3))),
            ("FavouriteColour", Some(SqlValue::Text("green".into()))),
        ]);

        let pupil: Pupil = map_record(&row).unwrap();
        assert_eq!(pupil.id, 3);
        assert_eq!(pupil.pupil_name, "");
        assert_eq!(pupil.level, Level::Beginner);
        assert!(!pupil.enrolled);
    }

    #[test]
    fn test_null_columns_follow_null_policy() {
        let row = row(vec![
            ("PupilID", None),
            ("PupilName", None),
            ("Level", None),
        ]);

        let pupil: Pupil = map_record(&row).unwrap();
        assert_eq!(pupil, Pupil::default());
    }

    #[test]
    fn test_first_duplicate_column_wins() {
        let row = row(vec![
            ("PupilName", Some(SqlValue::Text("first".into()))),
            ("pupilname", Some(SqlValue::Text("second".into()))),
        ]);

        let pupil: Pupil = map_record(&row).unwrap();
        assert_eq!(pupil.pupil_name, "first");
    }

    #[test]
    fn test_coercion_failure_names_field() {
        let row = row(vec![("Level", Some(SqlValue::SmallInt(9)))]);

        let err = map_record::<Pupil>(&row).unwrap_err();
        assert!(matches!(err, CoercionError::Field { field: "level", .. }));
        assert!(err.to_string().contains("Level"));
    }

    #[test]
    fn test_map_rows() {
        let rows = vec![
            row(vec![("PupilID", Some(SqlValue::Integer(1)))]),
            row(vec![("PupilID", Some(SqlValue::Integer(2)))]),
        ];

        let pupils: Vec<Pupil> = map_rows(&rows).unwrap();
        assert_eq!(pupils.iter().map(|p| p.id).collect::<Vec<_>>(), [1, 2]);
        assert!(map_rows::<Pupil>(&[]).unwrap().is_empty());
    }

    #[test]
    fn test_row_accessors() {
        let row = ResultRow::new(vec!["A".into(), "B".into()], vec![Some(SqlValue::Integer(1))]);
        assert_eq!(row.len(), 2);
        assert_eq!(row.get("a"), Some(&SqlValue::Integer(1)));
        assert_eq!(row.get("B"), None);
        assert_eq!(row.value(5), None);
    }
}
