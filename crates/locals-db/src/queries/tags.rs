use crate::models::TagRow;
use crate::{Database, Result};

impl Database {
    pub fn list_tags(&self) -> Result<Vec<TagRow>> {
        self.with_conn(|conn| {
            let mut stmt =
                conn.prepare("SELECT id, tag_name, description FROM tags ORDER BY tag_name")?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(TagRow {
                        id: row.get(0)?,
                        tag_name: row.get(1)?,
                        description: row.get(2)?,
                    })
                })?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }
}
