// 🔎 Filter Engine - derives views of the registry from the selection
//
// Every operation borrows the store and returns index-based views, so a
// render pass never copies records. Values that do not occur in the data
// simply produce empty views; nothing here fails.

use crate::record::{Column, Record};
use crate::selection::SelectionState;
use crate::store::RecordStore;
use std::cmp::Ordering;

// ============================================================================
// FILTERED VIEW
// ============================================================================

/// Read-only window onto a subset of the store, in a defined order.
#[derive(Debug, Clone)]
pub struct FilteredView<'a> {
    store: &'a RecordStore,
    indices: Vec<usize>,
}

impl<'a> FilteredView<'a> {
    fn new(store: &'a RecordStore, indices: Vec<usize>) -> Self {
        Self { store, indices }
    }

    pub fn empty(store: &'a RecordStore) -> Self {
        Self::new(store, Vec::new())
    }

    pub fn len(&self) -> usize {
        self.indices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// Positions of the matching records in the store
    pub fn indices(&self) -> &[usize] {
        &self.indices
    }

    pub fn first(&self) -> Option<&'a Record> {
        self.indices.first().and_then(|&i| self.store.get(i))
    }

    pub fn iter(&self) -> impl Iterator<Item = &'a Record> + '_ {
        let store = self.store;
        self.indices.iter().filter_map(move |&i| store.get(i))
    }
}

// ============================================================================
// OWNER LOOKUP
// ============================================================================

/// Outcome of resolving an owner-name lookup to a single business.
///
/// The registry does not guarantee one business per owner, so the caller
/// gets to see when the answer is ambiguous.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OwnerLookup<'a> {
    NotFound,
    Unique(&'a Record),
    /// More than one record; `first` is the earliest in store order.
    Ambiguous { first: &'a Record, matches: usize },
}

impl<'a> OwnerLookup<'a> {
    pub fn resolve(view: &FilteredView<'a>) -> Self {
        match (view.first(), view.len()) {
            (None, _) => OwnerLookup::NotFound,
            (Some(record), 1) => OwnerLookup::Unique(record),
            (Some(first), matches) => OwnerLookup::Ambiguous { first, matches },
        }
    }

    /// Record to display, if any
    pub fn record(&self) -> Option<&'a Record> {
        match *self {
            OwnerLookup::NotFound => None,
            OwnerLookup::Unique(record) => Some(record),
            OwnerLookup::Ambiguous { first, .. } => Some(first),
        }
    }
}

// ============================================================================
// FILTER ENGINE
// ============================================================================

/// Views produced for one render pass.
#[derive(Debug, Clone)]
pub struct PanelViews<'a> {
    /// Records plotted on the category scatter map
    pub category: FilteredView<'a>,
    /// Zip code + license status listing, sorted by business name
    pub zip_status: FilteredView<'a>,
    /// Facilities of the selected business
    pub business: FilteredView<'a>,
    /// Business owned by the selected owner
    pub owner: OwnerLookup<'a>,
}

#[derive(Debug, Clone, Copy)]
pub struct FilterEngine<'a> {
    store: &'a RecordStore,
}

impl<'a> FilterEngine<'a> {
    pub fn new(store: &'a RecordStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &'a RecordStore {
        self.store
    }

    fn select<P>(&self, predicate: P) -> FilteredView<'a>
    where
        P: Fn(&Record) -> bool,
    {
        let indices = self
            .store
            .records()
            .iter()
            .enumerate()
            .filter(|(_, record)| predicate(*record))
            .map(|(i, _)| i)
            .collect();
        FilteredView::new(self.store, indices)
    }

    /// All records in `category`. Unknown categories give an empty view.
    pub fn filter_by_category(&self, category: &str) -> FilteredView<'a> {
        self.select(|r| r.text(Column::LicenseCategory) == Some(category))
    }

    /// Records in any of `zip_codes` with the given license status, sorted by
    /// business name (byte order, missing names last, ties in store order).
    pub fn filter_by_zip_and_status(&self, zip_codes: &[String], status: &str) -> FilteredView<'a> {
        if zip_codes.is_empty() {
            return FilteredView::empty(self.store);
        }

        let mut view = self.select(|r| {
            r.text(Column::LicenseStatus) == Some(status)
                && r.text(Column::ZipCode)
                    .map(|zip| zip_codes.iter().any(|z| z == zip))
                    .unwrap_or(false)
        });

        let store = self.store;
        view.indices.sort_by(|&a, &b| {
            let name = |i: usize| store.get(i).and_then(|r| r.text(Column::BusinessName));
            compare_names(name(a), name(b))
        });
        view
    }

    /// Every facility registered under exactly `name`, in store order.
    pub fn lookup_by_business_name(&self, name: &str) -> FilteredView<'a> {
        self.select(|r| r.text(Column::BusinessName) == Some(name))
    }

    /// Every record whose owner is exactly `name`, in store order.
    ///
    /// Use [`OwnerLookup::resolve`] to decide what to show.
    pub fn lookup_by_owner_name(&self, name: &str) -> FilteredView<'a> {
        self.select(|r| r.text(Column::OwnerName) == Some(name))
    }

    /// Compute every filter panel for one render pass.
    pub fn evaluate(&self, selection: &SelectionState) -> PanelViews<'a> {
        let empty = || FilteredView::empty(self.store);

        let category = match &selection.category {
            Some(c) => self.filter_by_category(c),
            None => empty(),
        };
        let zip_status = match &selection.license_status {
            Some(status) => self.filter_by_zip_and_status(&selection.zip_codes, status),
            None => empty(),
        };
        let business = match &selection.business_name {
            Some(name) => self.lookup_by_business_name(name),
            None => empty(),
        };
        let owner = match &selection.owner_name {
            Some(name) => OwnerLookup::resolve(&self.lookup_by_owner_name(name)),
            None => OwnerLookup::NotFound,
        };

        tracing::debug!(
            category = category.len(),
            zip_status = zip_status.len(),
            business = business.len(),
            "Filter pass complete"
        );

        PanelViews {
            category,
            zip_status,
            business,
            owner,
        }
    }
}

fn compare_names(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
