//! Consent and authorisation store
//!
//! Records are CBOR encoded and keyed by `<kind>/<id>`. Every record carries a
//! version; a save only lands when the stored version is the one the caller read,
//! so of two concurrent updates exactly one takes effect and the other has to
//! re-fetch before retrying.
use super::error::StoreError;
use super::types::{Authorisation, ConsentRecord, ConsentStatus, ConsentType, PaymentSnapshot};
use sled::IVec;
use std::sync::Arc;
use tracing::{debug, warn};

const AUTHORISATION_PREFIX: &str = "authorisation/";
const CONSENT_PREFIX: &str = "consent/";
const PAYMENT_PREFIX: &str = "payment/";

/// Snapshot source and the single point of mutation for consent data.
pub trait ConsentStore {
    fn authorisation(&self, id: &str) -> Result<Option<Authorisation>, StoreError>;

    fn consent(&self, id: &str) -> Result<Option<ConsentRecord>, StoreError>;

    fn payment(&self, id: &str) -> Result<Option<PaymentSnapshot>, StoreError>;

    /// Funds-confirmation consents covering `account`, in storage order.
    fn piis_consents(&self, account: &str) -> Result<Vec<ConsentRecord>, StoreError>;

    /// Saves and returns the record with its new version.
    ///
    /// # Errors
    ///
    /// [`StoreError::VersionConflict`] when the stored record moved past the
    /// version the caller read.
    fn save_authorisation(&self, authorisation: &Authorisation) -> Result<Authorisation, StoreError>;

    /// As [`ConsentStore::save_authorisation`]. The terms of a valid consent are
    /// frozen; changing them fails with [`StoreError::ChecksumMismatch`].
    fn save_consent(&self, consent: &ConsentRecord) -> Result<ConsentRecord, StoreError>;

    fn save_payment(&self, payment: &PaymentSnapshot) -> Result<PaymentSnapshot, StoreError>;

    /// Atomically takes one access off the counter of `resource` and returns
    /// what is left, or `None` when the resource is not metered.
    fn decrement_usage(&self, consent_id: &str, resource: &str) -> Result<Option<u32>, StoreError>;
}

trait Versioned: Clone + minicbor::Encode<()> + for<'b> minicbor::Decode<'b, ()> {
    const PREFIX: &'static str;
    fn record_id(&self) -> &str;
    fn version(&self) -> u64;
    fn set_version(&mut self, version: u64);
}

impl Versioned for Authorisation {
    const PREFIX: &'static str = AUTHORISATION_PREFIX;
    fn record_id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Versioned for ConsentRecord {
    const PREFIX: &'static str = CONSENT_PREFIX;
    fn record_id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

impl Versioned for PaymentSnapshot {
    const PREFIX: &'static str = PAYMENT_PREFIX;
    fn record_id(&self) -> &str {
        &self.id
    }
    fn version(&self) -> u64 {
        self.version
    }
    fn set_version(&mut self, version: u64) {
        self.version = version;
    }
}

fn record_key<T: Versioned>(id: &str) -> String {
    format!("{}{id}", T::PREFIX)
}

fn encode_record<T: Versioned>(record: &T) -> Result<Vec<u8>, StoreError> {
    minicbor::to_vec(record).map_err(|e| StoreError::Encode(e.to_string()))
}

fn decode_record<T: Versioned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(minicbor::decode(bytes)?)
}

/// A new record is saved with version 0 and expects nothing stored yet.
fn stored_version<T: Versioned>(current: &Option<IVec>) -> Result<Option<u64>, StoreError> {
    current
        .as_ref()
        .map(|bytes| decode_record::<T>(bytes).map(|record| record.version()))
        .transpose()
}

pub struct SledConsentStore {
    instance: Arc<sled::Db>,
}

impl SledConsentStore {
    pub fn new(instance: Arc<sled::Db>) -> Self {
        Self { instance }
    }

    fn load<T: Versioned>(&self, id: &str) -> Result<Option<T>, StoreError> {
        self.instance
            .get(record_key::<T>(id))?
            .map(|bytes| decode_record(&bytes))
            .transpose()
    }

    fn save<T: Versioned>(
        &self,
        record: &T,
        check: impl FnOnce(Option<&T>) -> Result<(), StoreError>,
    ) -> Result<T, StoreError> {
        let key = record_key::<T>(record.record_id());
        let current = self.instance.get(&key)?;
        let previous: Option<T> = current.as_ref().map(|b| decode_record(b)).transpose()?;

        let found = previous.as_ref().map(|p| p.version());
        let expected_stored = (record.version() > 0).then_some(record.version());
        if found != expected_stored {
            return Err(self.conflict(record, found.unwrap_or(0)));
        }

        check(previous.as_ref())?;

        let mut next = record.clone();
        next.set_version(record.version() + 1);
        let encoded = encode_record(&next)?;

        match self
            .instance
            .compare_and_swap(&key, current, Some(encoded))?
        {
            Ok(()) => Ok(next),
            Err(cas) => {
                let found = stored_version::<T>(&cas.current)?.unwrap_or(0);
                Err(self.conflict(record, found))
            }
        }
    }

    fn conflict<T: Versioned>(&self, record: &T, found: u64) -> StoreError {
        warn!(
            key = %record_key::<T>(record.record_id()),
            expected = record.version(),
            found,
            "Record was modified concurrently"
        );
        StoreError::VersionConflict {
            id: record.record_id().to_string(),
            expected: record.version(),
            found,
        }
    }
}

/// Terms of a consent that was already valid when it was read back must not move.
fn check_frozen_terms(
    previous: Option<&ConsentRecord>,
    consent: &ConsentRecord,
    checksum: Option<&str>,
) -> Result<(), StoreError> {
    let Some(previous) = previous else {
        return Ok(());
    };
    if previous.status != ConsentStatus::Valid {
        return Ok(());
    }
    if previous.checksum.as_deref() != checksum {
        warn!(consent_id = %consent.id, "Terms of a valid consent were changed");
        return Err(StoreError::ChecksumMismatch(consent.id.clone()));
    }
    Ok(())
}

impl ConsentStore for SledConsentStore {
    fn authorisation(&self, id: &str) -> Result<Option<Authorisation>, StoreError> {
        self.load(id)
    }

    fn consent(&self, id: &str) -> Result<Option<ConsentRecord>, StoreError> {
        self.load(id)
    }

    fn payment(&self, id: &str) -> Result<Option<PaymentSnapshot>, StoreError> {
        self.load(id)
    }

    fn piis_consents(&self, account: &str) -> Result<Vec<ConsentRecord>, StoreError> {
        let mut consents = vec![];
        for entry in self.instance.scan_prefix(CONSENT_PREFIX) {
            let (_, bytes) = entry?;
            let consent: ConsentRecord = decode_record(&bytes)?;

            if consent.consent_type == ConsentType::Piis
                && consent.accounts.iter().any(|a| a == account)
            {
                consents.push(consent);
            }
        }
        Ok(consents)
    }

    fn save_authorisation(&self, authorisation: &Authorisation) -> Result<Authorisation, StoreError> {
        self.save(authorisation, |_| Ok(()))
    }

    fn save_consent(&self, consent: &ConsentRecord) -> Result<ConsentRecord, StoreError> {
        let checksum = consent
            .terms_checksum()
            .map_err(|e| StoreError::Encode(e.to_string()))?;

        let mut record = consent.clone();
        if record.status == ConsentStatus::Valid {
            record.checksum = Some(checksum.clone());
        }

        self.save(&record, |previous| {
            check_frozen_terms(previous, consent, Some(checksum.as_str()))
        })
    }

    fn save_payment(&self, payment: &PaymentSnapshot) -> Result<PaymentSnapshot, StoreError> {
        self.save(payment, |_| Ok(()))
    }

    fn decrement_usage(&self, consent_id: &str, resource: &str) -> Result<Option<u32>, StoreError> {
        let key = record_key::<ConsentRecord>(consent_id);

        loop {
            let current = self
                .instance
                .get(&key)?
                .ok_or_else(|| StoreError::NotFound(key.clone()))?;
            let mut consent: ConsentRecord = decode_record(&current)?;

            let remaining = match consent.usage_counters.get(resource).copied() {
                None => return Ok(None),
                Some(0) => {
                    return Err(StoreError::UsageExhausted {
                        consent_id: consent_id.to_string(),
                        resource: resource.to_string(),
                    });
                }
                Some(remaining) => remaining - 1,
            };

            consent.usage_counters.insert(resource.to_string(), remaining);
            consent.version += 1;
            let encoded = encode_record(&consent)?;

            match self
                .instance
                .compare_and_swap(&key, Some(current), Some(encoded))?
            {
                Ok(()) => {
                    debug!(consent_id, resource, remaining, "Usage counter decremented");
                    return Ok(Some(remaining));
                }
                Err(_) => {
                    warn!(consent_id, resource, "Usage counter moved concurrently, retrying");
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn open_store() -> (tempfile::TempDir, SledConsentStore) {
        let dir = tempdir().unwrap();
        let db = sled::open(dir.path().join("store.db")).unwrap();
        (dir, SledConsentStore::new(Arc::new(db)))
    }

    #[test]
    fn stale_save_is_rejected() {
        let (_dir, store) = open_store();
        let consent = ConsentRecord::new("consent_1".into(), ConsentType::Ais);

        let saved = store.save_consent(&consent).unwrap();
        assert_eq!(saved.version, 1);

        store.save_consent(&saved).unwrap();
        let err = store.save_consent(&saved).unwrap_err();

        assert!(matches!(
            err,
            StoreError::VersionConflict {
                expected: 1,
                found: 2,
                ..
            }
        ));
    }

    #[test]
    fn valid_consent_terms_are_frozen() {
        let (_dir, store) = open_store();
        let consent = ConsentRecord::new("consent_1".into(), ConsentType::Ais)
            .add_account("DE89")
            .set_status(ConsentStatus::Valid);

        let saved = store.save_consent(&consent).unwrap();
        assert!(saved.checksum.is_some());

        let widened = saved.clone().add_account("DE12");
        assert!(matches!(
            store.save_consent(&widened),
            Err(StoreError::ChecksumMismatch(_))
        ));

        let revoked = saved.set_status(ConsentStatus::RevokedByPsu);
        assert!(store.save_consent(&revoked).is_ok());
    }

    #[test]
    fn counter_stops_at_zero() {
        let (_dir, store) = open_store();
        let consent = ConsentRecord::new("consent_1".into(), ConsentType::Ais)
            .set_usage_counter("/accounts", 1);
        store.save_consent(&consent).unwrap();

        assert_eq!(store.decrement_usage("consent_1", "/accounts").unwrap(), Some(0));
        assert!(matches!(
            store.decrement_usage("consent_1", "/accounts"),
            Err(StoreError::UsageExhausted { .. })
        ));
        assert_eq!(store.decrement_usage("consent_1", "/balances").unwrap(), None);
        assert_eq!(store.consent("consent_1").unwrap().unwrap().version, 2);
    }
}
