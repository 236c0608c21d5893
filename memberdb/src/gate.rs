//! The verification gate: a one-time, per-owner record of payment evidence.
//!
//! The gate is independent of the tree. It records that an owner completed
//! the external payment-backed confirmation, once; a second attempt returns
//! the first record untouched.
//!
//! # Trust boundary
//! The payment collaborator is the source of truth for whether a payment
//! happened. By default the gate does not ask it: the caller's
//! `(transaction_ref, amount, payer_address)` is accepted as an assertion
//! through [`TrustCaller`], which logs every acceptance. Deployments that
//! need the check plug a [`PaymentConfirmer`] in with
//! [`VerificationGate::with_confirmer`].

use auto_impl::auto_impl;
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use log::{info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::commitments::check_owner_id;
use crate::error::{RegistryError, Result};
use crate::store::{get_record, put_record, Store, StoreError, Table};

/// A recorded payment-backed verification.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
pub struct Verification {
    pub owner_id: String,
    /// Opaque external reference, e.g. a transaction hash
    pub transaction_ref: String,
    /// Decimal amount as reported by the payment collaborator
    pub amount: String,
    pub payer_address: String,
    pub verified_at: DateTime<Utc>,
}

/// Verification state of one owner.
#[derive(Serialize, Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(tag = "status", rename_all = "lowercase")]
pub enum VerificationStatus {
    Verified(Verification),
    Unverified,
}

impl VerificationStatus {
    pub fn is_verified(&self) -> bool {
        matches!(self, VerificationStatus::Verified(_))
    }
}

/// The payment facts a caller asserts for an owner.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PaymentClaim<'a> {
    pub owner_id: &'a str,
    pub transaction_ref: &'a str,
    pub amount: &'a str,
    pub payer_address: &'a str,
}

/// Seam to the payment collaborator.
#[auto_impl(Arc, Box)]
pub trait PaymentConfirmer: Send + Sync {
    /// Returns `Ok(())` when the claimed payment is confirmed.
    /// A refusal should be reported as [`RegistryError::PaymentRejected`].
    fn confirm(&self, claim: &PaymentClaim) -> Result<()>;
}

/// Accepts every claim without asking the payment collaborator.
#[derive(Debug, Default, Clone, Copy)]
pub struct TrustCaller;

impl PaymentConfirmer for TrustCaller {
    fn confirm(&self, claim: &PaymentClaim) -> Result<()> {
        warn!(
            "accepting unconfirmed payment {} of {} from {} for owner {}",
            claim.transaction_ref, claim.amount, claim.payer_address, claim.owner_id
        );
        Ok(())
    }
}

/// Checks that `amount` is a positive decimal such as `10` or `0.01`.
pub fn check_amount(amount: &str) -> Result<()> {
    let mut parts = amount.splitn(2, '.');
    let int_part = parts.next().unwrap_or("");
    let frac_part = parts.next().unwrap_or("");
    let digits_ok = |s: &str| s.bytes().all(|c| c.is_ascii_digit());
    let well_formed = !(int_part.is_empty() && frac_part.is_empty())
        && digits_ok(int_part)
        && digits_ok(frac_part)
        && !(amount.contains('.') && frac_part.is_empty());
    if !well_formed {
        return Err(RegistryError::InvalidFormat(format!(
            "amount {:?} is not a decimal",
            amount
        )));
    }
    if !amount.bytes().any(|c| (b'1'..=b'9').contains(&c)) {
        return Err(RegistryError::InvalidFormat(format!(
            "amount {:?} must be positive",
            amount
        )));
    }
    Ok(())
}

fn check_field(name: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(RegistryError::InvalidFormat(format!(
            "{} must not be empty",
            name
        )));
    }
    Ok(())
}

pub struct VerificationGate {
    store: Arc<dyn Store>,
    confirmer: Arc<dyn PaymentConfirmer>,
    // one lock per owner, finer than the registry-wide write lock; an entry
    // lives only while some call for that owner holds it
    owner_locks: DashMap<String, Arc<Mutex<()>>>,
}

impl VerificationGate {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self::with_confirmer(store, Arc::new(TrustCaller))
    }

    pub fn with_confirmer(store: Arc<dyn Store>, confirmer: Arc<dyn PaymentConfirmer>) -> Self {
        Self {
            store,
            confirmer,
            owner_locks: DashMap::new(),
        }
    }

    fn owner_lock(&self, owner_id: &str) -> Arc<Mutex<()>> {
        self.owner_locks
            .entry(owner_id.to_owned())
            .or_default()
            .clone()
    }

    // Drops the entry unless another call cloned it meanwhile. Clones and
    // this check both run under the map's shard lock.
    fn release_owner_lock(&self, owner_id: &str, lock: Arc<Mutex<()>>) {
        self.owner_locks.remove_if(owner_id, |_, held| {
            Arc::ptr_eq(held, &lock) && Arc::strong_count(held) == 2
        });
    }

    /// Records the verification of `owner_id`, once.
    ///
    /// Fails with [`RegistryError::AlreadyVerified`] carrying the existing
    /// record if the owner was verified before; nothing is written then.
    /// The existence check, the payment confirmation and the write run under
    /// the owner's lock.
    pub fn record_verification(
        &self,
        owner_id: &str,
        transaction_ref: &str,
        amount: &str,
        payer_address: &str,
    ) -> Result<Verification> {
        check_owner_id(owner_id)?;
        check_field("transaction reference", transaction_ref)?;
        check_field("payer address", payer_address)?;
        check_amount(amount)?;

        let lock = self.owner_lock(owner_id);
        let res = {
            let _guard = lock.lock();
            self.record_locked(owner_id, transaction_ref, amount, payer_address)
        };
        self.release_owner_lock(owner_id, lock);
        res
    }

    fn record_locked(
        &self,
        owner_id: &str,
        transaction_ref: &str,
        amount: &str,
        payer_address: &str,
    ) -> Result<Verification> {
        if let Some(existing) = self.get(owner_id)? {
            return Err(RegistryError::AlreadyVerified(Box::new(existing)));
        }
        self.confirmer.confirm(&PaymentClaim {
            owner_id,
            transaction_ref,
            amount,
            payer_address,
        })?;

        let verification = Verification {
            owner_id: owner_id.to_owned(),
            transaction_ref: transaction_ref.to_owned(),
            amount: amount.to_owned(),
            payer_address: payer_address.to_owned(),
            verified_at: Utc::now(),
        };
        match put_record(&*self.store, Table::Verifications, owner_id, &verification) {
            Ok(()) => {}
            // another process wrote the record first
            Err(StoreError::KeyExists { .. }) => {
                return match self.get(owner_id)? {
                    Some(existing) => Err(RegistryError::AlreadyVerified(Box::new(existing))),
                    None => Err(RegistryError::NotFound(owner_id.to_owned())),
                };
            }
            Err(e) => return Err(e.into()),
        }
        info!("owner {} verified by {}", owner_id, transaction_ref);
        Ok(verification)
    }

    /// Verification state of `owner_id`.
    pub fn status(&self, owner_id: &str) -> Result<VerificationStatus> {
        Ok(match self.get(owner_id)? {
            Some(v) => VerificationStatus::Verified(v),
            None => VerificationStatus::Unverified,
        })
    }

    fn get(&self, owner_id: &str) -> Result<Option<Verification>> {
        Ok(get_record(&*self.store, Table::Verifications, owner_id)?)
    }
}
