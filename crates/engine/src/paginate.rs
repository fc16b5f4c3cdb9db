//! Page-numbered listing over per-field views
//!
//! Ordering by `Post.title` reads the view `post/byTitle`; with no single
//! ordering field the entity's display field names the view. Views are
//! expected to exist already: a missing one is reported, not replaced.

use crate::source::CouchSource;
use settee_core::{Direction, EntityModel, Outcome, OrderBy, QueryDescriptor, ResultRow, Result, SourceError};
use tracing::debug;

fn capitalize(field: &str) -> String {
    let mut chars = field.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// View name for an ordering field (`Post.title` → `byTitle`)
pub fn view_name(field: &str) -> String {
    let bare = field.rsplit('.').next().unwrap_or(field);
    format!("by{}", capitalize(bare))
}

/// Build the view query for page `page` (1-based) of `limit` rows.
pub fn build_query(model: &EntityModel, order: &[OrderBy], limit: u64, page: u64) -> QueryDescriptor {
    let page = page.max(1);
    let mut query = QueryDescriptor::view(model.kind(), view_name(&model.display_field))
        .param("include_docs", false)
        .param("limit", limit)
        .param("skip", limit.saturating_mul(page - 1));

    if let [only] = order {
        query.view = Some(view_name(&only.field));
        if only.direction == Direction::Desc {
            query = query.param("descending", true);
        }
    }
    query
}

impl CouchSource {
    /// Page `page` of `limit` rows of `model`, ordered through a view.
    ///
    /// Rows carry the view values, tagged with the entity alias.
    ///
    /// # Errors
    ///
    /// Returns `ViewUnavailable` when the store rejects the view query.
    pub fn paginate(
        &self,
        model: &EntityModel,
        order: &[OrderBy],
        limit: u64,
        page: u64,
    ) -> Result<Vec<ResultRow>> {
        let query = build_query(model, order, limit, page);
        match self.read(model, &query)? {
            Outcome::Done(rows) => Ok(rows),
            Outcome::Rejected(errors) => {
                let design = query.design.unwrap_or_default();
                let view = query.view.unwrap_or_default();
                debug!(
                    target: "settee::paginate",
                    %design,
                    %view,
                    error = %errors,
                    "pagination view rejected"
                );
                Err(SourceError::ViewUnavailable {
                    design,
                    view,
                    description: errors.describe(),
                })
            }
        }
    }
}
