//! Revision lookup via HEAD

use super::{document_path, CouchSource};
use settee_core::{EntityModel, Record, Result, Revision};
use settee_transport::Method;

impl CouchSource {
    /// Current revision of a document, read from the `ETag` of a HEAD request.
    ///
    /// The identifier is `id`, else the primary key in the record's data, else
    /// the record's id; empty identifiers are skipped. `None` when there is no
    /// identifier, the store reports an error, or no `ETag` comes back.
    pub fn get_revision(
        &self,
        model: &EntityModel,
        record: &Record,
        id: Option<&str>,
    ) -> Result<Option<Revision>> {
        let id = id
            .filter(|id| !id.is_empty())
            .map(str::to_string)
            .or_else(|| model.id_in(&record.data))
            .or_else(|| record.identifier().map(str::to_string));
        let Some(id) = id else {
            return Ok(None);
        };

        let database = self.database_for(model)?;
        let response = self.query(Method::Head, &document_path(&database, &id), &[], None)?;
        if response.errors.is_error() {
            return Ok(None);
        }
        Ok(response.header("ETag").and_then(Revision::from_etag))
    }
}
