//! Labels rows by the value of one column and groups them, summing numeric
//! data and dropping non numeric data. Acts like an SQL `GROUP BY` over a
//! data matrix.
use crate::report::Row;
use crate::store::RawValue;
use std::collections::HashMap;

#[derive(Debug, Clone)]
enum Column {
    Sum(RawValue),
    Dropped,
}

impl Column {
    fn absorb(&mut self, value: &RawValue) {
        let next = match (&*self, value) {
            (Column::Dropped, _) => Column::Dropped,
            (_, v) if !v.is_numeric() => Column::Dropped,
            (Column::Sum(RawValue::Int(a)), RawValue::Int(b)) => match a.checked_add(*b) {
                Some(total) => Column::Sum(RawValue::Int(total)),
                None => Column::Sum(RawValue::Float(*a as f64 + *b as f64)),
            },
            (Column::Sum(acc), v) => match (acc.as_f64(), v.as_f64()) {
                (Some(a), Some(b)) => Column::Sum(RawValue::Float(a + b)),
                _ => Column::Dropped,
            },
        };
        *self = next;
    }
}

struct Group {
    key: Option<RawValue>,
    columns: Vec<(String, Column)>,
}

/// Groups `rows` by their `key` column.
///
/// Groups come out in order of first appearance. The key column leads each
/// output row (rows lacking it form one group without a key cell), followed
/// by the surviving columns in first-seen order.
pub fn aggregate(rows: Vec<Row>, key: &str) -> Vec<Row> {
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut groups: Vec<Group> = Vec::new();

    for row in rows {
        let key_value = row.get(key).cloned();
        let label = format!("{:?}", key_value);
        let slot = *index.entry(label).or_insert_with(|| {
            groups.push(Group { key: key_value.clone(), columns: Vec::new() });
            groups.len() - 1
        });
        let group = &mut groups[slot];

        for (slug, value) in row {
            if slug == key {
                continue;
            }
            match group.columns.iter_mut().find(|(s, _)| *s == slug) {
                Some((_, column)) => column.absorb(&value),
                None => {
                    let column = if value.is_numeric() { Column::Sum(value) } else { Column::Dropped };
                    group.columns.push((slug, column));
                }
            }
        }
    }

    tracing::debug!(key, groups = groups.len(), "rows aggregated");
    groups
        .into_iter()
        .map(|group| {
            let mut out = Row::new();
            if let Some(k) = group.key {
                out.push(key, k);
            }
            for (slug, column) in group.columns {
                if let Column::Sum(total) = column {
                    out.push(slug, total);
                }
            }
            out
        })
        .collect()
}
