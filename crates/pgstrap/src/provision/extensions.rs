use pgstrap_sql::{CatalogObject, CreateExtensionStmt};

use super::{Outcome, Step};
use crate::traced::AdminConnection;
use crate::{Error, Stage};

/// Enable missing extensions in the database `conn` is scoped to.
pub async fn apply_extensions<C: AdminConnection>(
    conn: &C,
    database: &str,
    extensions: &[String],
) -> Result<Outcome, Error> {
    let mut step = Step::new(
        conn,
        Stage::Extensions {
            database: database.to_string(),
        },
    );

    for extension in extensions {
        step.ensure(CatalogObject::extension(extension), || {
            Ok(CreateExtensionStmt::if_not_exists(extension).into())
        })
        .await?;
    }

    Ok(step.finish())
}
