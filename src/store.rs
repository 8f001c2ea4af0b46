//! Artifact store: the seam between pipeline stages.
//!
//! Posterior samples and variance arrays are produced once per field and
//! reused by every downstream computation. The core depends only on this
//! trait, not on any persistence format; callers may back it with disk,
//! a database, or the in-memory store provided here. Loads happen at stage
//! boundaries, briefly, with no lock held across computation.

use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::{ArtifactKind, FieldError};
use crate::sampler::PosteriorSample;
use crate::simulate::VarianceArray;
use crate::types::FieldId;

/// Keyed storage of per-field stage artifacts.
///
/// `get_*` on an absent key is a fatal precondition failure for that field
/// ([`FieldError::MissingArtifact`]); batch runs report it and continue
/// with the remaining fields.
pub trait ArtifactStore: Send + Sync {
    /// Persist the posterior sample for one field.
    fn put_posterior(&self, field: FieldId, sample: PosteriorSample);

    /// Load the posterior sample for one field.
    fn get_posterior(&self, field: FieldId) -> Result<PosteriorSample, FieldError>;

    /// Persist the variance array for one field.
    fn put_variances(&self, field: FieldId, array: VarianceArray);

    /// Load the variance array for one field.
    fn get_variances(&self, field: FieldId) -> Result<VarianceArray, FieldError>;
}

/// In-memory store backed by mutex-guarded maps.
#[derive(Debug, Default)]
pub struct MemoryStore {
    posteriors: Mutex<HashMap<FieldId, PosteriorSample>>,
    variances: Mutex<HashMap<FieldId, VarianceArray>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl ArtifactStore for MemoryStore {
    fn put_posterior(&self, field: FieldId, sample: PosteriorSample) {
        self.posteriors
            .lock()
            .expect("posterior map poisoned")
            .insert(field, sample);
    }

    fn get_posterior(&self, field: FieldId) -> Result<PosteriorSample, FieldError> {
        self.posteriors
            .lock()
            .expect("posterior map poisoned")
            .get(&field)
            .cloned()
            .ok_or(FieldError::MissingArtifact {
                field,
                kind: ArtifactKind::Posterior,
            })
    }

    fn put_variances(&self, field: FieldId, array: VarianceArray) {
        self.variances
            .lock()
            .expect("variance map poisoned")
            .insert(field, array);
    }

    fn get_variances(&self, field: FieldId) -> Result<VarianceArray, FieldError> {
        self.variances
            .lock()
            .expect("variance map poisoned")
            .get(&field)
            .cloned()
            .ok_or(FieldError::MissingArtifact {
                field,
                kind: ArtifactKind::Variances,
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::VariogramParams;

    #[test]
    fn test_roundtrip_posterior() {
        let store = MemoryStore::new();
        let sample = PosteriorSample::new(vec![
            VariogramParams::from_array([1.0, 0.5, 2.0]),
            VariogramParams::from_array([2.0, 0.4, 3.0]),
        ]);
        store.put_posterior(FieldId(1), sample.clone());
        assert_eq!(store.get_posterior(FieldId(1)).expect("stored"), sample);
    }

    #[test]
    fn test_missing_artifact_is_scoped_error() {
        let store = MemoryStore::new();
        let err = store.get_posterior(FieldId(9)).unwrap_err();
        assert_eq!(
            err,
            FieldError::MissingArtifact {
                field: FieldId(9),
                kind: ArtifactKind::Posterior,
            }
        );

        let err = store.get_variances(FieldId(9)).unwrap_err();
        assert_eq!(
            err,
            FieldError::MissingArtifact {
                field: FieldId(9),
                kind: ArtifactKind::Variances,
            }
        );
    }

    #[test]
    fn test_variances_roundtrip() {
        let store = MemoryStore::new();
        let mut arr = VarianceArray::new(vec![2, 4], 1, 2);
        arr.set_population(0, 1, 5.0);
        store.put_variances(FieldId(2), arr.clone());
        assert_eq!(store.get_variances(FieldId(2)).expect("stored"), arr);
    }
}
