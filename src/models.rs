use diesel::prelude::*;
use diesel::sql_types::Text;

#[derive(QueryableByName, Debug, Clone)]
pub struct SourceColumn {
    #[diesel(sql_type = Text)]
    pub column_name: String,
}

/// One source row rendered by `row_to_json`, keyed by raw column name.
#[derive(QueryableByName, Debug, Clone)]
pub struct JsonRow {
    #[diesel(sql_type = Text)]
    pub row: String,
}
