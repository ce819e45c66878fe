//! Service layer API for consent and authorisation gating
//!
//! Infrastructure failures come back as the outer `anyhow` error. A request the
//! rules turn down comes back as `Ok(Err(MessageError))`, ready to be rendered.
use super::consent::{self, PiisSelection};
use super::context::{RequestContext, UpdatePsuDataRequest};
use super::creation::{ConsentCreationPolicy, CreateConsentRequest};
use super::decision::MessageError;
use super::error::{MessageErrorCode, ServiceType, StoreError};
use super::oauth;
use super::profile::AspspProfileProvider;
use super::store::ConsentStore;
use super::types::{
    Authorisation, AuthorisationParent, ConsentDate, ConsentRecord, ConsentType, PaymentSnapshot,
};
use super::update::UpdatePsuDataValidator;
use super::utils::new_resource_id;
use chrono::NaiveDate;
use tracing::info;

pub type Gated<T> = anyhow::Result<Result<T, MessageError>>;

/// Consent or payment an authorisation runs for.
#[derive(Debug, Clone)]
pub enum Parent {
    Consent(ConsentRecord),
    Payment(PaymentSnapshot),
}

impl AuthorisationParent for Parent {
    fn resource_id(&self) -> &str {
        match self {
            Parent::Consent(consent) => consent.resource_id(),
            Parent::Payment(payment) => payment.resource_id(),
        }
    }
    fn owner_tpp_id(&self) -> Option<&str> {
        match self {
            Parent::Consent(consent) => AuthorisationParent::owner_tpp_id(consent),
            Parent::Payment(payment) => AuthorisationParent::owner_tpp_id(payment),
        }
    }
}

/// What a granted account read consumed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRead {
    pub consent_id: String,
    pub remaining: Option<u32>, // none when the resource is not metered
}

fn denied<T>(service: ServiceType, code: MessageErrorCode) -> Gated<T> {
    Ok(Err(MessageError::of(service, code)))
}

pub struct GateService<S, P> {
    store: S,
    profile: P,
}

impl<S: ConsentStore, P: AspspProfileProvider> GateService<S, P> {
    pub fn new(store: S, profile: P) -> Self {
        Self { store, profile }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    fn load_parent(&self, service: ServiceType, parent_id: &str) -> anyhow::Result<Option<Parent>> {
        let parent = match service {
            ServiceType::Ais | ServiceType::Piis => self.store.consent(parent_id)?.map(Parent::Consent),
            ServiceType::Pis => self.store.payment(parent_id)?.map(Parent::Payment),
        };
        Ok(parent)
    }

    /// Validate a new AIS consent and store it as received, owned by the caller
    pub fn create_consent(
        &self,
        ctx: &RequestContext,
        request: &CreateConsentRequest,
        today: NaiveDate,
    ) -> Gated<ConsentRecord> {
        let profile = self.profile.aspsp_profile();

        if let Err(error) = ConsentCreationPolicy::new(&profile)
            .validate(request, profile.default_sca_approach(), ctx, today)
            .into_result()
        {
            return Ok(Err(error));
        }

        let allowance = u32::try_from(request.frequency_per_day)?;
        let access = &request.access;

        let mut consent = ConsentRecord::new(new_resource_id("consent")?, ConsentType::Ais)
            .set_expire_date(ConsentDate::from(request.valid_until))
            .set_recurring_indicator(request.recurring_indicator)
            .set_frequency_per_day(request.frequency_per_day)
            .set_single_tpp(&ctx.tpp_id)
            .set_usage_counter("/accounts", allowance);

        for account in access
            .accounts
            .iter()
            .chain(&access.balances)
            .chain(&access.transactions)
        {
            if !consent.accounts.contains(account) {
                consent = consent.add_account(account);
            }
        }
        for account in &access.balances {
            consent = consent.set_usage_counter(&format!("/accounts/{account}/balances"), allowance);
        }
        for account in &access.transactions {
            consent =
                consent.set_usage_counter(&format!("/accounts/{account}/transactions"), allowance);
        }

        let consent = self.store.save_consent(&consent)?;
        info!(request_id = %ctx.request_id, consent_id = %consent.id, "Consent created");

        Ok(Ok(consent))
    }

    /// Start an SCA process for a consent or payment owned by the caller
    pub fn create_authorisation(
        &self,
        ctx: &RequestContext,
        service: ServiceType,
        parent_id: &str,
    ) -> Gated<Authorisation> {
        let profile = self.profile.aspsp_profile();
        let sca_approach = profile.default_sca_approach();

        let Some(parent) = self.load_parent(service, parent_id)? else {
            info!(request_id = %ctx.request_id, parent_id, "Parent resource was not found");
            return denied(service, MessageErrorCode::ResourceUnknown404);
        };

        if parent.owner_tpp_id().is_some_and(|owner| owner != ctx.tpp_id) {
            info!(request_id = %ctx.request_id, parent_id, "TPP does not own the resource");
            return denied(service, MessageErrorCode::Unauthorized);
        }

        if let Parent::Payment(payment) = &parent {
            if let Err(error) =
                oauth::validate(&oauth::PIS_PAYMENT, payment, sca_approach, &profile, ctx)
                    .into_result()
            {
                return Ok(Err(error));
            }
        }

        let authorisation = Authorisation::new(
            new_resource_id("authorisation")?,
            parent.resource_id().to_string(),
            sca_approach,
        )
        .set_psu_id_data(ctx.psu_id_data.clone());

        let authorisation = self.store.save_authorisation(&authorisation)?;
        info!(
            request_id = %ctx.request_id,
            authorisation_id = %authorisation.id,
            parent_id,
            ?sca_approach,
            "Authorisation created"
        );

        Ok(Ok(authorisation))
    }

    /// Run the update-PSU-data checks. The first PSU to update an authorisation
    /// without an identity on record becomes its PSU.
    pub fn update_psu_data(
        &self,
        ctx: &RequestContext,
        service: ServiceType,
        request: &UpdatePsuDataRequest,
    ) -> Gated<Authorisation> {
        let profile = self.profile.aspsp_profile();

        let Some(parent) = self.load_parent(service, &request.parent_id)? else {
            info!(
                request_id = %ctx.request_id,
                parent_id = %request.parent_id,
                "Parent resource was not found"
            );
            return denied(service, MessageErrorCode::ResourceUnknown404);
        };
        let authorisation = self.store.authorisation(&request.authorisation_id)?;

        if let Err(error) = UpdatePsuDataValidator::new(service, &profile)
            .validate(ctx, &parent, authorisation.as_ref(), request)
            .into_result()
        {
            return Ok(Err(error));
        }

        let Some(authorisation) = authorisation else {
            return denied(service, MessageErrorCode::ResourceUnknown404);
        };

        if authorisation.psu_id_data.is_empty() && request.psu_id_data.is_not_empty() {
            let updated = authorisation.set_psu_id_data(request.psu_id_data.clone());
            let saved = self.store.save_authorisation(&updated)?;
            info!(
                request_id = %ctx.request_id,
                authorisation_id = %saved.id,
                "PSU identity recorded on authorisation"
            );
            return Ok(Ok(saved));
        }

        Ok(Ok(authorisation))
    }

    /// Check an AIS consent for a read of `resource` and consume one access when
    /// the read is made by the TPP on its own.
    ///
    /// The OAuth token gate keys on the profile's default approach, not on the
    /// approach of a stored authorisation.
    pub fn read_account_data(
        &self,
        ctx: &RequestContext,
        consent_id: &str,
        resource: &str,
        today: NaiveDate,
    ) -> Gated<AccountRead> {
        let profile = self.profile.aspsp_profile();

        let Some(consent) = self.store.consent(consent_id)? else {
            info!(request_id = %ctx.request_id, consent_id, "Consent was not found");
            return denied(ServiceType::Ais, MessageErrorCode::ConsentUnknown403);
        };

        let decision = oauth::validate(
            &oauth::AIS_CONSENT,
            &consent,
            profile.default_sca_approach(),
            &profile,
            ctx,
        )
        .and_then(|| consent::validate_account_consent(&consent, resource, ctx, today));
        if let Err(error) = decision.into_result() {
            return Ok(Err(error));
        }

        if ctx.request_from_psu {
            return Ok(Ok(AccountRead {
                consent_id: consent.id,
                remaining: None,
            }));
        }

        match self.store.decrement_usage(&consent.id, resource) {
            Ok(remaining) => Ok(Ok(AccountRead {
                consent_id: consent.id,
                remaining,
            })),
            // another read took the last access after the snapshot was taken
            Err(StoreError::UsageExhausted { .. }) => {
                info!(request_id = %ctx.request_id, consent_id, resource, "Consent access was exceeded");
                denied(ServiceType::Ais, MessageErrorCode::AccessExceeded)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Pick the funds-confirmation consent the caller may use for `account`.
    /// The OAuth token gate keys on the profile's default approach.
    pub fn confirm_funds(
        &self,
        ctx: &RequestContext,
        account: &str,
        today: NaiveDate,
    ) -> Gated<ConsentRecord> {
        let profile = self.profile.aspsp_profile();
        let candidates = self.store.piis_consents(account)?;

        let consent = match consent::select_piis_consent(&candidates, ctx, today) {
            PiisSelection::Usable(consent) => consent,
            PiisSelection::Rejected(error) => return Ok(Err(error)),
        };

        if let Err(error) = oauth::validate(
            &oauth::PIIS_CONSENT,
            consent,
            profile.default_sca_approach(),
            &profile,
            ctx,
        )
        .into_result()
        {
            return Ok(Err(error));
        }

        Ok(Ok(consent.clone()))
    }
}
