//! Snapshot records read from the consent/authorisation store
use chrono::{Datelike, NaiveDate};
use serde::Deserialize;
use std::collections::BTreeMap;

/// Negotiated SCA approach of an authorisation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, minicbor::Encode, minicbor::Decode,
)]
#[serde(rename_all = "lowercase")]
pub enum ScaApproach {
    #[n(0)]
    Embedded,
    #[n(1)]
    Redirect,
    #[n(2)]
    Decoupled,
}

/// Stage of an authorisation, in the order a PSU progresses through them.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, minicbor::Encode, minicbor::Decode,
)]
pub enum ScaStatus {
    #[n(0)]
    Received,
    #[n(1)]
    PsuIdentified,
    #[n(2)]
    PsuAuthenticated,
    #[n(3)]
    ScaMethodSelected,
    #[n(4)]
    Unconfirmed,
    #[n(5)]
    Started,
    #[n(6)]
    Finalised,
    #[n(7)]
    Failed,
    #[n(8)]
    Exempted,
}

impl ScaStatus {
    pub const ALL: [ScaStatus; 9] = [
        ScaStatus::Received,
        ScaStatus::PsuIdentified,
        ScaStatus::PsuAuthenticated,
        ScaStatus::ScaMethodSelected,
        ScaStatus::Unconfirmed,
        ScaStatus::Started,
        ScaStatus::Finalised,
        ScaStatus::Failed,
        ScaStatus::Exempted,
    ];

    pub fn is_final(&self) -> bool {
        matches!(
            self,
            ScaStatus::Finalised | ScaStatus::Failed | ScaStatus::Exempted
        )
    }
}

/// Calendar date of a consent. Encoded as days from the common era.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ConsentDate(NaiveDate);

impl ConsentDate {
    pub fn new_with(year: i32, month: u32, day: u32) -> Option<Self> {
        NaiveDate::from_ymd_opt(year, month, day).map(ConsentDate)
    }
    pub fn to_naive_date(&self) -> NaiveDate {
        self.0
    }
}

impl From<NaiveDate> for ConsentDate {
    fn from(value: NaiveDate) -> Self {
        ConsentDate(value)
    }
}

impl<C> minicbor::Encode<C> for ConsentDate {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.i32(self.0.num_days_from_ce())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for ConsentDate {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        let days = d.i32()?;

        NaiveDate::from_num_days_from_ce_opt(days)
            .map(ConsentDate)
            .ok_or(minicbor::decode::Error::message(
                "failed to convert day count to a calendar date",
            ))
    }
}

/// End-user identity as presented in headers or recorded on an authorisation.
#[derive(Debug, Clone, Default, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct PsuIdData {
    #[n(0)]
    pub psu_id: Option<String>,
    #[n(1)]
    pub psu_id_type: Option<String>,
    #[n(2)]
    pub psu_corporate_id: Option<String>,
    #[n(3)]
    pub psu_corporate_id_type: Option<String>,
}

fn present(field: &Option<String>) -> Option<&str> {
    field.as_deref().filter(|value| !value.trim().is_empty())
}

impl PsuIdData {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn with_psu_id(psu_id: &str) -> Self {
        Self::new().set_psu_id(psu_id)
    }
    pub fn set_psu_id(mut self, psu_id: &str) -> Self {
        self.psu_id = Some(psu_id.to_string());
        self
    }
    pub fn set_psu_id_type(mut self, psu_id_type: &str) -> Self {
        self.psu_id_type = Some(psu_id_type.to_string());
        self
    }
    pub fn set_psu_corporate_id(mut self, corporate_id: &str) -> Self {
        self.psu_corporate_id = Some(corporate_id.to_string());
        self
    }
    pub fn set_psu_corporate_id_type(mut self, corporate_id_type: &str) -> Self {
        self.psu_corporate_id_type = Some(corporate_id_type.to_string());
        self
    }
    /// Empty when every field is missing or blank.
    pub fn is_empty(&self) -> bool {
        present(&self.psu_id).is_none()
            && present(&self.psu_id_type).is_none()
            && present(&self.psu_corporate_id).is_none()
            && present(&self.psu_corporate_id_type).is_none()
    }
    pub fn is_not_empty(&self) -> bool {
        !self.is_empty()
    }
    /// Field-for-field, case-sensitive. A blank field equals a missing one.
    pub fn content_equals(&self, other: &PsuIdData) -> bool {
        present(&self.psu_id) == present(&other.psu_id)
            && present(&self.psu_id_type) == present(&other.psu_id_type)
            && present(&self.psu_corporate_id) == present(&other.psu_corporate_id)
            && present(&self.psu_corporate_id_type) == present(&other.psu_corporate_id_type)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct Authorisation {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub parent_id: String, // consent or payment the SCA runs for
    #[n(2)]
    pub sca_approach: ScaApproach,
    #[n(3)]
    pub sca_status: ScaStatus,
    #[n(4)]
    pub psu_id_data: PsuIdData, // on-record identity
    #[n(5)]
    pub version: u64,
}

impl Authorisation {
    pub fn new(id: String, parent_id: String, sca_approach: ScaApproach) -> Self {
        Self {
            id,
            parent_id,
            sca_approach,
            sca_status: ScaStatus::Received,
            psu_id_data: PsuIdData::default(),
            version: 0,
        }
    }
    pub fn set_status(mut self, sca_status: ScaStatus) -> Self {
        self.sca_status = sca_status;
        self
    }
    pub fn set_psu_id_data(mut self, psu_id_data: PsuIdData) -> Self {
        self.psu_id_data = psu_id_data;
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum ConsentStatus {
    #[n(0)]
    Received,
    #[n(1)]
    Valid,
    #[n(2)]
    Rejected,
    #[n(3)]
    Expired,
    #[n(4)]
    RevokedByPsu,
    #[n(5)]
    TerminatedByTpp,
}

impl ConsentStatus {
    /// Only these statuses may still be used to access data.
    pub fn is_usable(&self) -> bool {
        matches!(self, ConsentStatus::Received | ConsentStatus::Valid)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum ConsentType {
    #[n(0)]
    Ais,
    #[n(1)]
    Piis,
}

/// Which TPPs may use a consent. Stored as its wire name so a corrupted value
/// survives decoding and is caught where it is evaluated.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TppAccessType {
    AllTpp,
    SingleTpp,
    Unrecognised(String),
}

impl TppAccessType {
    pub fn as_str(&self) -> &str {
        match self {
            TppAccessType::AllTpp => "ALL_TPP",
            TppAccessType::SingleTpp => "SINGLE_TPP",
            TppAccessType::Unrecognised(raw) => raw,
        }
    }
}

impl From<&str> for TppAccessType {
    fn from(value: &str) -> Self {
        match value {
            "ALL_TPP" => TppAccessType::AllTpp,
            "SINGLE_TPP" => TppAccessType::SingleTpp,
            other => TppAccessType::Unrecognised(other.to_string()),
        }
    }
}

impl<C> minicbor::Encode<C> for TppAccessType {
    fn encode<W: minicbor::encode::Write>(
        &self,
        e: &mut minicbor::Encoder<W>,
        _: &mut C,
    ) -> Result<(), minicbor::encode::Error<W::Error>> {
        e.str(self.as_str())?.ok()
    }
}

impl<'b, C> minicbor::Decode<'b, C> for TppAccessType {
    fn decode(d: &mut minicbor::Decoder<'b>, _: &mut C) -> Result<Self, minicbor::decode::Error> {
        Ok(TppAccessType::from(d.str()?))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct ConsentRecord {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub consent_type: ConsentType,
    #[n(2)]
    pub status: ConsentStatus,
    #[n(3)]
    pub expire_date: Option<ConsentDate>, // none never expires
    #[n(4)]
    pub recurring_indicator: bool,
    #[n(5)]
    pub tpp_access_type: TppAccessType,
    #[n(6)]
    pub owner_tpp_id: Option<String>,
    #[n(7)]
    pub allowed_frequency_per_day: i32,
    #[n(8)]
    pub usage_counters: BTreeMap<String, u32>, // resource -> remaining accesses today
    #[n(9)]
    pub accounts: Vec<String>,
    #[n(10)]
    pub version: u64,
    #[n(11)]
    pub checksum: Option<String>, // set once the consent turns valid
}

/// The part of a consent that may not change once the PSU has authorised it.
#[derive(minicbor::Encode)]
struct ConsentTerms<'a> {
    #[n(0)]
    accounts: &'a [String],
    #[n(1)]
    expire_date: Option<ConsentDate>,
    #[n(2)]
    recurring_indicator: bool,
    #[n(3)]
    tpp_access_type: &'a TppAccessType,
    #[n(4)]
    owner_tpp_id: Option<&'a str>,
    #[n(5)]
    allowed_frequency_per_day: i32,
}

impl ConsentRecord {
    pub fn new(id: String, consent_type: ConsentType) -> Self {
        Self {
            id,
            consent_type,
            status: ConsentStatus::Received,
            expire_date: None,
            recurring_indicator: true,
            tpp_access_type: TppAccessType::AllTpp,
            owner_tpp_id: None,
            allowed_frequency_per_day: 1,
            usage_counters: BTreeMap::new(),
            accounts: vec![],
            version: 0,
            checksum: None,
        }
    }
    pub fn set_status(mut self, status: ConsentStatus) -> Self {
        self.status = status;
        self
    }
    pub fn set_expire_date(mut self, date: ConsentDate) -> Self {
        self.expire_date = Some(date);
        self
    }
    pub fn set_recurring_indicator(mut self, recurring: bool) -> Self {
        self.recurring_indicator = recurring;
        self
    }
    pub fn set_single_tpp(mut self, owner_tpp_id: &str) -> Self {
        self.tpp_access_type = TppAccessType::SingleTpp;
        self.owner_tpp_id = Some(owner_tpp_id.to_string());
        self
    }
    pub fn set_tpp_access_type(mut self, access_type: TppAccessType) -> Self {
        self.tpp_access_type = access_type;
        self
    }
    pub fn set_owner_tpp_id(mut self, owner_tpp_id: &str) -> Self {
        self.owner_tpp_id = Some(owner_tpp_id.to_string());
        self
    }
    pub fn set_frequency_per_day(mut self, frequency: i32) -> Self {
        self.allowed_frequency_per_day = frequency;
        self
    }
    pub fn set_usage_counter(mut self, resource: &str, remaining: u32) -> Self {
        self.usage_counters.insert(resource.to_string(), remaining);
        self
    }
    pub fn add_account(mut self, account: &str) -> Self {
        self.accounts.push(account.to_string());
        self
    }
    /// sha256 of the CBOR encoded terms.
    pub fn terms_checksum(&self) -> anyhow::Result<String> {
        let terms = ConsentTerms {
            accounts: &self.accounts,
            expire_date: self.expire_date,
            recurring_indicator: self.recurring_indicator,
            tpp_access_type: &self.tpp_access_type,
            owner_tpp_id: self.owner_tpp_id.as_deref(),
            allowed_frequency_per_day: self.allowed_frequency_per_day,
        };
        let contents = minicbor::to_vec(&terms)?;

        Ok(sha256::digest(&contents))
    }
}

/// ISO 20022 transaction status of a payment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, minicbor::Encode, minicbor::Decode)]
pub enum TransactionStatus {
    #[n(0)]
    Rcvd,
    #[n(1)]
    Pdng,
    #[n(2)]
    Patc,
    #[n(3)]
    Actc,
    #[n(4)]
    Accp,
    #[n(5)]
    Acsp,
    #[n(6)]
    Acsc,
    #[n(7)]
    Acwc,
    #[n(8)]
    Acwp,
    #[n(9)]
    Rjct,
    #[n(10)]
    Canc,
    #[n(11)]
    Part,
}

#[derive(Debug, Clone, PartialEq, Eq, minicbor::Encode, minicbor::Decode)]
pub struct PaymentSnapshot {
    #[n(0)]
    pub id: String,
    #[n(1)]
    pub transaction_status: TransactionStatus,
    #[n(2)]
    pub tpp_id: Option<String>,
    #[n(3)]
    pub version: u64,
}

impl PaymentSnapshot {
    pub fn new(id: String, transaction_status: TransactionStatus) -> Self {
        Self {
            id,
            transaction_status,
            tpp_id: None,
            version: 0,
        }
    }
    pub fn set_tpp_id(mut self, tpp_id: &str) -> Self {
        self.tpp_id = Some(tpp_id.to_string());
        self
    }
}

/// A resource an authorisation can run for.
pub trait AuthorisationParent {
    fn resource_id(&self) -> &str;
    fn owner_tpp_id(&self) -> Option<&str>;
}

impl AuthorisationParent for ConsentRecord {
    fn resource_id(&self) -> &str {
        &self.id
    }
    fn owner_tpp_id(&self) -> Option<&str> {
        self.owner_tpp_id.as_deref()
    }
}

impl AuthorisationParent for PaymentSnapshot {
    fn resource_id(&self) -> &str {
        &self.id
    }
    fn owner_tpp_id(&self) -> Option<&str> {
        self.tpp_id.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consent_date_encoding() {
        let original = ConsentDate::new_with(2025, 2, 28).unwrap();

        let encoding = minicbor::to_vec(original).unwrap();
        let decode: ConsentDate = minicbor::decode(&encoding).unwrap();

        assert_eq!(original, decode);
    }

    #[test]
    fn unknown_access_type_survives_decoding() {
        let consent = ConsentRecord::new("consent_1".into(), ConsentType::Piis)
            .set_tpp_access_type(TppAccessType::from("SOME_TPP"));

        let encoding = minicbor::to_vec(&consent).unwrap();
        let decode: ConsentRecord = minicbor::decode(&encoding).unwrap();

        assert_eq!(
            decode.tpp_access_type,
            TppAccessType::Unrecognised("SOME_TPP".into())
        );
    }

    #[test]
    fn blank_fields_count_as_absent() {
        let blank = PsuIdData::with_psu_id("   ");
        assert!(blank.is_empty());
        assert!(blank.content_equals(&PsuIdData::new()));
    }

    #[test]
    fn checksum_tracks_terms_only() {
        let consent = ConsentRecord::new("consent_1".into(), ConsentType::Ais).add_account("DE89");
        let used = consent.clone().set_usage_counter("/accounts", 3);
        let widened = consent.clone().add_account("DE12");

        assert_eq!(
            consent.terms_checksum().unwrap(),
            used.terms_checksum().unwrap()
        );
        assert_ne!(
            consent.terms_checksum().unwrap(),
            widened.terms_checksum().unwrap()
        );
    }
}
