//! Query compilation: typed list commands into filter/sort/pagination plans.
//!
//! [`QueryCompiler::compile`] is pure. [`QueryCompiler::execute`] issues a
//! single [`DataStore::read_page`] so items and total come from one snapshot.

use std::collections::BTreeSet;
use std::sync::Arc;

use eventboard_core::query::skip_for;
use eventboard_core::{ListQuery, Page, PredicateNode, QueryFilter, Resource, SortSpec, TextField};
use tracing::debug;

use crate::storage::StoreError;
use crate::traits::DataStore;

/// Executable form of a [`ListQuery`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryPlan {
    pub filter: QueryFilter,
    pub sort: SortSpec,
    pub skip: u64,
    pub take: u64,
    /// Page number echoed back in the result.
    pub page: u64,
}

/// Builds and runs list queries against an injected [`DataStore`].
#[derive(Clone)]
pub struct QueryCompiler {
    store: Arc<dyn DataStore>,
}

impl QueryCompiler {
    #[must_use]
    pub fn new(store: Arc<dyn DataStore>) -> Self {
        Self { store }
    }

    /// Compiles a validated list command into a plan.
    ///
    /// Each present filter adds one conjunct; absent filters add nothing.
    /// Free-text search is a single `Or` conjunct spanning the searchable fields.
    /// Date bounds are taken as given: `end_date >= start_date` is enforced by
    /// request validation, and an inverted range simply matches nothing here.
    #[must_use]
    pub fn compile(query: &ListQuery) -> QueryPlan {
        let mut conjuncts = Vec::new();

        if let Some(category) = &query.category {
            conjuncts.push(PredicateNode::Eq {
                field: TextField::Category,
                value: category.clone(),
            });
        }
        if let Some(tags) = query.tags.as_ref().filter(|t| !t.is_empty()) {
            conjuncts.push(PredicateNode::any_tag(tags));
        }
        if let Some(start) = query.start_date {
            conjuncts.push(PredicateNode::DateOnOrAfter(start));
        }
        if let Some(end) = query.end_date {
            conjuncts.push(PredicateNode::DateOnOrBefore(end));
        }
        if let Some(term) = &query.search {
            conjuncts.push(PredicateNode::Or(
                TextField::SEARCHABLE
                    .iter()
                    .map(|field| PredicateNode::contains(*field, term))
                    .collect(),
            ));
        }

        QueryPlan {
            filter: QueryFilter { conjuncts },
            sort: query.sort,
            skip: skip_for(query.page, query.limit),
            take: query.limit,
            page: query.page,
        }
    }

    /// Runs a plan as one atomic read.
    ///
    /// # Errors
    ///
    /// Propagates data store failures unchanged.
    pub async fn execute(&self, plan: &QueryPlan) -> Result<Page<Resource>, StoreError> {
        let read = self
            .store
            .read_page(&plan.filter, &plan.sort, plan.skip, plan.take)
            .await?;
        debug!(
            conjuncts = plan.filter.conjuncts.len(),
            skip = plan.skip,
            take = plan.take,
            total = read.total,
            "list query executed"
        );
        Ok(Page::new(read.items, read.total, plan.page, plan.take))
    }

    /// Compiles and executes in one step.
    ///
    /// # Errors
    ///
    /// Propagates data store failures unchanged.
    pub async fn list(&self, query: &ListQuery) -> Result<Page<Resource>, StoreError> {
        self.execute(&Self::compile(query)).await
    }
}

/// Distinct non-empty categories, sorted ascending.
#[must_use]
pub fn aggregate_categories(raw: impl IntoIterator<Item = String>) -> Vec<String> {
    raw.into_iter()
        .filter(|c| !c.trim().is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Tags trimmed, lower-cased, de-duplicated, and sorted; empties dropped.
#[must_use]
pub fn aggregate_tags(raw: impl IntoIterator<Item = String>) -> Vec<String> {
    raw.into_iter()
        .map(|t| t.trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}
