//! Read path: translated queries and counts

use super::CouchSource;
use crate::translate::{shape_response, translate};
use settee_core::{EntityModel, FieldSelection, Outcome, QueryDescriptor, ResultRow, Result};
use settee_transport::Method;
use tracing::debug;

impl CouchSource {
    /// Run one abstract query.
    ///
    /// A miss or any other tolerable store error yields
    /// [`Outcome::Rejected`]; fatal errors abort.
    pub fn read(&self, model: &EntityModel, query: &QueryDescriptor) -> Result<Outcome<Vec<ResultRow>>> {
        let database = self.database_for(model)?;
        let request = translate(query, model, &database);
        let response = self.query(Method::Get, &request.path, &request.query_pairs(), None)?;

        if response.errors.is_error() {
            debug!(
                target: "settee::source",
                entity = %model.name,
                path = %request.path,
                error = %response.errors,
                "read rejected"
            );
            return Ok(Outcome::Rejected(response.errors));
        }

        Ok(Outcome::Done(shape_response(&request, &response.body, &model.alias)))
    }

    /// Number of documents matching `query`, ignoring its ordering.
    ///
    /// With several result rows the row count is returned, otherwise the
    /// single row's count. `None` when the store rejects the read.
    pub fn count(&self, model: &EntityModel, query: &QueryDescriptor) -> Result<Option<u64>> {
        let mut query = query.clone();
        query.fields = FieldSelection::Count;
        query.order = None;

        let rows = match self.read(model, &query)? {
            Outcome::Done(rows) => rows,
            Outcome::Rejected(_) => return Ok(None),
        };
        if rows.len() > 1 {
            return Ok(Some(rows.len() as u64));
        }
        Ok(Some(rows.first().and_then(ResultRow::as_count).unwrap_or(0)))
    }
}
