//! Record-layer contract
//!
//! Anything that can persist [`Record`]s for an [`EntityModel`] implements
//! [`DocumentSource`]. Negative store answers (a miss, a conflict) come back
//! as [`Outcome::Rejected`] or `false`; only failures that make the source
//! unusable are `Err`.

use crate::source::CouchSource;
use settee_core::{EntityModel, FieldMap, Outcome, QueryDescriptor, Record, Result, ResultRow, Revision};

/// CRUD + query contract used by the record layer
pub trait DocumentSource: Send + Sync {
    /// Store a new document; see [`CouchSource::create`]
    fn create(
        &self,
        model: &EntityModel,
        record: &mut Record,
        fields: Option<FieldMap>,
    ) -> Result<Outcome<FieldMap>>;

    /// Run a query; see [`CouchSource::read`]
    fn read(&self, model: &EntityModel, query: &QueryDescriptor) -> Result<Outcome<Vec<ResultRow>>>;

    /// Overwrite an existing document; see [`CouchSource::update`]
    fn update(
        &self,
        model: &EntityModel,
        record: &mut Record,
        fields: FieldMap,
    ) -> Result<Outcome<Revision>>;

    /// Delete a document at a known revision; see [`CouchSource::delete`]
    fn delete(&self, model: &EntityModel, record: &Record, conditions: &FieldMap) -> Result<bool>;

    /// Current revision of a document; see [`CouchSource::get_revision`]
    fn get_revision(
        &self,
        model: &EntityModel,
        record: &Record,
        id: Option<&str>,
    ) -> Result<Option<Revision>>;
}

impl DocumentSource for CouchSource {
    fn create(
        &self,
        model: &EntityModel,
        record: &mut Record,
        fields: Option<FieldMap>,
    ) -> Result<Outcome<FieldMap>> {
        CouchSource::create(self, model, record, fields)
    }

    fn read(&self, model: &EntityModel, query: &QueryDescriptor) -> Result<Outcome<Vec<ResultRow>>> {
        CouchSource::read(self, model, query)
    }

    fn update(
        &self,
        model: &EntityModel,
        record: &mut Record,
        fields: FieldMap,
    ) -> Result<Outcome<Revision>> {
        CouchSource::update(self, model, record, fields)
    }

    fn delete(&self, model: &EntityModel, record: &Record, conditions: &FieldMap) -> Result<bool> {
        CouchSource::delete(self, model, record, conditions)
    }

    fn get_revision(
        &self,
        model: &EntityModel,
        record: &Record,
        id: Option<&str>,
    ) -> Result<Option<Revision>> {
        CouchSource::get_revision(self, model, record, id)
    }
}
