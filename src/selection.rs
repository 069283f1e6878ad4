// 🎚️ Selection state - current value of every dashboard control
//
// Rebuilt wholesale on each render pass; nothing here survives a pass
// except what the control layer itself remembers.

use crate::record::Column;
use crate::store::RecordStore;
use serde::{Deserialize, Serialize};

/// Minimum age for the welcome message.
pub const LEGAL_AGE: u8 = 21;

/// Upper bound of the age slider.
pub const MAX_AGE: u8 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AgeClass {
    Minor,
    Adult,
}

impl AgeClass {
    /// Banner shown under the age slider
    pub fn message(&self) -> &'static str {
        match self {
            AgeClass::Minor => "Illegal to be here!",
            AgeClass::Adult => "Welcome!",
        }
    }
}

/// Display-only age gate. A minor still sees the rest of the dashboard.
pub fn classify_age(age: u8) -> AgeClass {
    if age < LEGAL_AGE {
        AgeClass::Minor
    } else {
        AgeClass::Adult
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionState {
    pub age: u8,
    pub category: Option<String>,
    pub zip_codes: Vec<String>,
    pub license_status: Option<String>,
    pub business_name: Option<String>,
    pub owner_name: Option<String>,
}

impl Default for SelectionState {
    fn default() -> Self {
        Self {
            age: LEGAL_AGE,
            category: None,
            zip_codes: Vec::new(),
            license_status: None,
            business_name: None,
            owner_name: None,
        }
    }
}

impl SelectionState {
    /// What the controls show before the user touches anything: the slider
    /// at 21, each single-select on its first option, no zip codes picked.
    pub fn initial(store: &RecordStore) -> Self {
        let first = |column| store.column_values(column).into_iter().next();

        Self {
            age: LEGAL_AGE,
            category: first(Column::LicenseCategory),
            zip_codes: Vec::new(),
            license_status: first(Column::LicenseStatus),
            business_name: first(Column::BusinessName),
            owner_name: first(Column::OwnerName),
        }
    }

    pub fn age_class(&self) -> AgeClass {
        classify_age(self.age)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::tests::create_test_record;

    #[test]
    fn test_classify_age_boundary() {
        assert_eq!(classify_age(20), AgeClass::Minor);
        assert_eq!(classify_age(21), AgeClass::Adult);
        assert_eq!(classify_age(0), AgeClass::Minor);
        assert_eq!(classify_age(MAX_AGE), AgeClass::Adult);
    }

    #[test]
    fn test_age_messages() {
        assert_eq!(classify_age(18).message(), "Illegal to be here!");
        assert_eq!(classify_age(40).message(), "Welcome!");
    }

    #[test]
    fn test_initial_selection_uses_first_values() {
        let store = RecordStore::from_records(vec![
            create_test_record(None, "02118", "Inactive", "Cultivator", "Cy Wu"),
            create_test_record(Some("Acme"), "02119", "Active", "Retail", "Ann Lee"),
        ]);

        let selection = SelectionState::initial(&store);
        assert_eq!(selection.age, 21);
        assert_eq!(selection.category.as_deref(), Some("Cultivator"));
        assert_eq!(selection.license_status.as_deref(), Some("Inactive"));
        // first non-null business name
        assert_eq!(selection.business_name.as_deref(), Some("Acme"));
        assert_eq!(selection.owner_name.as_deref(), Some("Cy Wu"));
        assert!(selection.zip_codes.is_empty());
        assert_eq!(selection.age_class(), AgeClass::Adult);
    }

    #[test]
    fn test_initial_selection_on_empty_store() {
        let selection = SelectionState::initial(&RecordStore::default());
        assert_eq!(selection, SelectionState::default());
    }
}
