//! Transition classification
//!
//! | prior            | probed           | event         |
//! |------------------|------------------|---------------|
//! | unchecked        | ready or ban     | `new_listing` |
//! | ban              | ready            | `restored`    |
//! | ready            | ban              | `banned`      |
//! | anything else    |                  | none          |
//!
//! A row seen for the first time always logs `new_listing`, even when its
//! first probe fails.

use crate::model::{ChangeType, PriorStatus, Status};

/// Decide which change event, if any, a status pair produces
pub fn classify(prior: &PriorStatus, probed: Status) -> Option<ChangeType> {
    match (prior, probed) {
        (PriorStatus::Unchecked, _) => Some(ChangeType::NewListing),
        (PriorStatus::Ban, Status::Ready) => Some(ChangeType::Restored),
        (PriorStatus::Ready, Status::Ban) => Some(ChangeType::Banned),
        _ => None,
    }
}
