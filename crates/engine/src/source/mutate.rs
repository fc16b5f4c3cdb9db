//! Write path: create, update and delete
//!
//! Writes are compare-and-swap on the document revision. The store rejects a
//! PUT or DELETE carrying a stale revision with `409 conflict`, which comes
//! back as [`Outcome::Rejected`] (or `false` for delete).

use super::{document_path, CouchSource};
use serde_json::Value;
use settee_core::{
    generate_id, EntityModel, FieldMap, Outcome, Record, Result, Revision, SourceError,
};
use settee_transport::Method;
use tracing::debug;

impl CouchSource {
    /// Store a new document.
    ///
    /// The identifier is the record's, else the one in the field map, else a
    /// fresh UUID. `fields` defaults to the record's current data. On success
    /// the record holds the written fields plus the identifier and the new
    /// revision, and that map is returned.
    pub fn create(
        &self,
        model: &EntityModel,
        record: &mut Record,
        fields: Option<FieldMap>,
    ) -> Result<Outcome<FieldMap>> {
        let mut data = fields.unwrap_or_else(|| record.data.clone());
        let id = record
            .identifier()
            .map(str::to_string)
            .or_else(|| model.id_in(&data))
            .unwrap_or_else(generate_id);
        self.tag_kind(model, &mut data);

        let database = self.database_for(model)?;
        let body = Value::Object(data.clone());
        let response = self.query(Method::Put, &document_path(&database, &id), &[], Some(&body))?;
        if !response.confirmed() {
            return Ok(Outcome::Rejected(response.errors));
        }

        let stored_id = response
            .body
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(id);
        data.insert(model.primary_key.clone(), Value::String(stored_id.clone()));
        if let Some(rev) = response.body.get("rev") {
            data.insert(model.revision_key.clone(), rev.clone());
        }
        debug!(target: "settee::source", entity = %model.name, id = %stored_id, "created");

        record.id = Some(stored_id);
        record.data = data.clone();
        Ok(Outcome::Done(data))
    }

    /// Write `fields` over an existing document.
    ///
    /// Without a revision in `fields`, the current document is fetched first;
    /// its fields are kept under the caller's and its revision is sent along.
    /// Like [`create`](Self::create), the entity-kind tag is added when the
    /// written map lacks it.
    ///
    /// # Errors
    ///
    /// Returns `MissingIdentifier` when neither the record nor `fields` names
    /// the document.
    pub fn update(
        &self,
        model: &EntityModel,
        record: &mut Record,
        fields: FieldMap,
    ) -> Result<Outcome<Revision>> {
        let id = record
            .identifier()
            .map(str::to_string)
            .or_else(|| model.id_in(&fields))
            .ok_or_else(|| SourceError::MissingIdentifier {
                entity: model.name.clone(),
            })?;

        let database = self.database_for(model)?;
        let path = document_path(&database, &id);

        let mut data = if fields.contains_key(&model.revision_key) {
            fields
        } else {
            let current = self.query(Method::Get, &path, &[], None)?;
            if current.errors.is_error() {
                return Ok(Outcome::Rejected(current.errors));
            }
            let mut merged = match current.body {
                Value::Object(map) => map,
                _ => FieldMap::new(),
            };
            let revision = merged.get(&model.revision_key).cloned();
            merged.extend(fields);
            if let Some(revision) = revision {
                merged.insert(model.revision_key.clone(), revision);
            }
            merged
        };
        self.tag_kind(model, &mut data);

        let body = Value::Object(data.clone());
        let response = self.query(Method::Put, &path, &[], Some(&body))?;
        if !response.confirmed() {
            return Ok(Outcome::Rejected(response.errors));
        }

        let stored_id = response
            .body
            .get("id")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or(id);
        let revision = response
            .body
            .get("rev")
            .and_then(Value::as_str)
            .map(Revision::new)
            .unwrap_or_else(|| Revision::new(""));
        data.insert(model.primary_key.clone(), Value::String(stored_id.clone()));
        data.insert(
            model.revision_key.clone(),
            Value::String(revision.as_str().to_string()),
        );
        debug!(target: "settee::source", entity = %model.name, id = %stored_id, rev = %revision, "updated");

        record.id = Some(stored_id);
        record.data = data;
        Ok(Outcome::Done(revision))
    }

    /// Delete a document at a known revision.
    ///
    /// The identifier comes from `conditions`, else the record. The revision
    /// comes from `conditions`, else the record's data, else a HEAD probe.
    /// Returns `false` without sending anything when either is unknown.
    pub fn delete(&self, model: &EntityModel, record: &Record, conditions: &FieldMap) -> Result<bool> {
        let Some(id) = model
            .id_in(conditions)
            .or_else(|| record.identifier().map(str::to_string))
        else {
            return Ok(false);
        };

        let revision = match model
            .revision_in(conditions)
            .or_else(|| record.revision(model))
        {
            Some(revision) => Some(revision),
            None => self.get_revision(model, record, Some(id.as_str()))?,
        };
        let Some(revision) = revision else {
            return Ok(false);
        };

        let database = self.database_for(model)?;
        let params = [("rev".to_string(), revision.as_str().to_string())];
        let response = self.query(Method::Delete, &document_path(&database, &id), &params, None)?;
        let deleted = response.confirmed();
        debug!(target: "settee::source", entity = %model.name, %id, deleted, "delete");
        Ok(deleted)
    }
}
