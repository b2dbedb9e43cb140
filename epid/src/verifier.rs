//! Verifier of EPID signatures.
//!
//! A [`Verifier`] is created for one group, optionally with a precomputation exported earlier by a
//! verifier of the same group, and holds the revocation lists for it. Verification takes `&self`
//! so a configured verifier can be shared between threads. Lists and configuration are changed
//! through `&mut self`.
//!
//! A signature is accepted only if, in this order, it is well formed, its proof verifies, its base
//! matches the configured basename (if any) and no revocation list revokes it. The first failing
//! step decides the [`Rejection`].

use crate::{
    common::{Epid2Params, GroupId, GroupPublicKey, HashAlg},
    error::{EpidError, Rejection},
    revocation::{
        GroupRl, PrivRl, RevocationChecker, RevocationList, RevocationLists, SigRl, VerifierRl,
    },
    signature::{BasicSignature, Signature},
};
use ark_ec::pairing::{Pairing, PairingOutput};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{end_timer, start_timer, vec::Vec};
use core::sync::atomic::{AtomicBool, Ordering};
use dock_crypto_utils::serde_utils::ArkObjectBytes;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

pub const DEFAULT_MAX_REVOCATION_LIST_ENTRIES: usize = 1 << 16;

/// Pairings of group elements used in every verification
#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
pub struct VerifierPrecomp<E: Pairing> {
    pub gid: GroupId,
    /// e(h1, g2)
    #[serde_as(as = "ArkObjectBytes")]
    pub e12: PairingOutput<E>,
    /// e(h2, g2)
    #[serde_as(as = "ArkObjectBytes")]
    pub e22: PairingOutput<E>,
    /// e(h2, w)
    #[serde_as(as = "ArkObjectBytes")]
    pub e2w: PairingOutput<E>,
    /// e(g1, g2)
    #[serde_as(as = "ArkObjectBytes")]
    pub eg12: PairingOutput<E>,
}

impl<E: Pairing> VerifierPrecomp<E> {
    pub fn new(params: &Epid2Params<E>, gpk: &GroupPublicKey<E>) -> Self {
        let g2_prepared = E::G2Prepared::from(params.g2);
        Self {
            gid: gpk.gid,
            e12: E::pairing(gpk.h1, g2_prepared.clone()),
            e22: E::pairing(gpk.h2, g2_prepared.clone()),
            e2w: E::pairing(gpk.h2, gpk.w),
            eg12: E::pairing(params.g1, g2_prepared),
        }
    }
}

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct VerifierConfig {
    /// Overrides the hash algorithm encoded in the group id
    pub hash_alg: Option<HashAlg>,
    /// When set, only signatures created with this basename are accepted
    pub basename: Option<Vec<u8>>,
    pub max_revocation_list_entries: usize,
}

impl Default for VerifierConfig {
    fn default() -> Self {
        Self {
            hash_alg: None,
            basename: None,
            max_revocation_list_entries: DEFAULT_MAX_REVOCATION_LIST_ENTRIES,
        }
    }
}

pub struct Verifier<E: Pairing> {
    params: Epid2Params<E>,
    gpk: GroupPublicKey<E>,
    precomp: VerifierPrecomp<E>,
    config: VerifierConfig,
    hash_alg: HashAlg,
    /// Hash of the configured basename
    basename_base: Option<E::G1Affine>,
    lists: RevocationLists<E>,
    /// Verifier revocation list changed since it was last exported
    verifier_rl_updated: bool,
}

impl<E: Pairing> Verifier<E> {
    pub fn new(
        params: Epid2Params<E>,
        gpk: GroupPublicKey<E>,
        precomp: Option<VerifierPrecomp<E>>,
        config: VerifierConfig,
    ) -> Result<Self, EpidError> {
        if !params.is_valid() {
            return Err(EpidError::InvalidGroupPublicKey);
        }
        let precomp = Self::checked_precomp(&params, &gpk, precomp)?;
        let hash_alg = match config.hash_alg {
            Some(h) => h,
            None => gpk.gid.hash_alg()?,
        };
        let basename_base = config
            .basename
            .as_ref()
            .map(|b| hash_alg.hash_to_curve::<E::G1Affine>(b));
        Ok(Self {
            params,
            gpk,
            precomp,
            config,
            hash_alg,
            basename_base,
            lists: RevocationLists::default(),
            verifier_rl_updated: false,
        })
    }

    fn checked_precomp(
        params: &Epid2Params<E>,
        gpk: &GroupPublicKey<E>,
        precomp: Option<VerifierPrecomp<E>>,
    ) -> Result<VerifierPrecomp<E>, EpidError> {
        if !gpk.is_valid() {
            return Err(EpidError::InvalidGroupPublicKey);
        }
        match precomp {
            Some(p) if p.gid != gpk.gid => Err(EpidError::PrecompNotInGroup),
            Some(p) => Ok(p),
            None => Ok(VerifierPrecomp::new(params, gpk)),
        }
    }

    /// Switch to another group. Revocation lists of the previous group are dropped, the group
    /// revocation list is kept.
    pub fn set_group(
        &mut self,
        gpk: GroupPublicKey<E>,
        precomp: Option<VerifierPrecomp<E>>,
    ) -> Result<(), EpidError> {
        let precomp = Self::checked_precomp(&self.params, &gpk, precomp)?;
        let hash_alg = match self.config.hash_alg {
            Some(h) => h,
            None => gpk.gid.hash_alg()?,
        };
        self.gpk = gpk;
        self.precomp = precomp;
        self.lists.clear_group_bound();
        self.verifier_rl_updated = false;
        self.update_hash_alg(hash_alg);
        Ok(())
    }

    pub fn set_hash_alg(&mut self, hash_alg: HashAlg) {
        self.config.hash_alg = Some(hash_alg);
        if hash_alg != self.hash_alg {
            self.lists.verifier = None;
            self.verifier_rl_updated = false;
        }
        self.update_hash_alg(hash_alg);
    }

    /// Require signatures to use `basename`, or any base when `None`. A loaded verifier revocation
    /// list is dropped when the basename changes.
    pub fn set_basename(&mut self, basename: Option<&[u8]>) {
        let basename = basename.map(|b| b.to_vec());
        if basename != self.config.basename {
            self.lists.verifier = None;
            self.verifier_rl_updated = false;
        }
        self.config.basename = basename;
        self.update_hash_alg(self.hash_alg);
    }

    fn update_hash_alg(&mut self, hash_alg: HashAlg) {
        self.hash_alg = hash_alg;
        self.basename_base = self
            .config
            .basename
            .as_ref()
            .map(|b| hash_alg.hash_to_curve::<E::G1Affine>(b));
    }

    pub fn set_group_rl(&mut self, rl: GroupRl) -> Result<(), EpidError> {
        self.check_size(rl.gids.len())?;
        self.lists.set(RevocationList::Group(rl))
    }

    pub fn set_priv_rl(&mut self, rl: PrivRl<E>) -> Result<(), EpidError> {
        self.check_gid(&rl.gid)?;
        self.check_size(rl.entries.len())?;
        self.lists.set(RevocationList::PrivateKey(rl))
    }

    pub fn set_sig_rl(&mut self, rl: SigRl<E>) -> Result<(), EpidError> {
        self.check_gid(&rl.gid)?;
        self.check_size(rl.entries.len())?;
        self.lists.set(RevocationList::Signature(rl))
    }

    /// The list must be for the configured basename
    pub fn set_verifier_rl(&mut self, rl: VerifierRl<E>) -> Result<(), EpidError> {
        let base = self.basename_base.ok_or(EpidError::BasenameRequired)?;
        self.check_gid(&rl.gid)?;
        if rl.B != base {
            return Err(EpidError::InvalidRevocationList);
        }
        self.check_size(rl.entries.len())?;
        self.lists.set(RevocationList::Verifier(rl))?;
        self.verifier_rl_updated = false;
        Ok(())
    }

    fn check_gid(&self, gid: &GroupId) -> Result<(), EpidError> {
        if *gid != self.gpk.gid {
            return Err(EpidError::GroupIdMismatch);
        }
        Ok(())
    }

    fn check_size(&self, size: usize) -> Result<(), EpidError> {
        let max = self.config.max_revocation_list_entries;
        if size > max {
            return Err(EpidError::RevocationListTooLarge(size, max));
        }
        Ok(())
    }

    pub fn verify(&self, sig: &Signature<E>, message: &[u8]) -> Result<(), Rejection> {
        self.verify_with_cancellation(sig, message, &AtomicBool::new(false))
    }

    /// Same as `verify` but gives up with `Rejection::Cancelled` once `cancel` is set
    pub fn verify_with_cancellation(
        &self,
        sig: &Signature<E>,
        message: &[u8],
        cancel: &AtomicBool,
    ) -> Result<(), Rejection> {
        let timer = start_timer!(|| "Verify signature");
        if cancel.load(Ordering::Acquire) {
            return Err(Rejection::Cancelled);
        }
        self.verify_basic(&sig.basic, message)?;
        RevocationChecker::new(&self.lists, &self.params, self.gpk.gid, self.hash_alg).check(
            sig, message, cancel,
        )?;
        end_timer!(timer);
        Ok(())
    }

    /// Verify the proof of a basic signature and its basename, without consulting revocation lists
    pub fn verify_basic(&self, sig: &BasicSignature<E>, message: &[u8]) -> Result<(), Rejection> {
        sig.verify(
            message,
            self.hash_alg,
            &self.params,
            &self.gpk,
            &self.precomp,
        )?;
        if let Some(base) = &self.basename_base {
            if sig.B != *base {
                return Err(Rejection::BasenameMismatch);
            }
        }
        Ok(())
    }

    /// Add the signer of a valid signature to this verifier's revocation list. Requires a basename.
    pub fn blacklist_signature(
        &mut self,
        sig: &Signature<E>,
        message: &[u8],
    ) -> Result<(), EpidError> {
        let base = self.basename_base.ok_or(EpidError::BasenameRequired)?;
        self.verify(sig, message)?;
        let max = self.config.max_revocation_list_entries;
        let gid = self.gpk.gid;
        let rl = self.lists.verifier.get_or_insert_with(|| VerifierRl {
            gid,
            B: base,
            version: 0,
            entries: Vec::new(),
        });
        if rl.entries.len() >= max {
            return Err(EpidError::RevocationListTooLarge(rl.entries.len() + 1, max));
        }
        rl.entries.push(sig.basic.K);
        self.verifier_rl_updated = true;
        Ok(())
    }

    /// The verifier revocation list to persist or share. Its version is increased once for all
    /// signatures blacklisted since the last export.
    pub fn export_verifier_rl(&mut self) -> Result<VerifierRl<E>, EpidError> {
        let base = self.basename_base.ok_or(EpidError::BasenameRequired)?;
        let gid = self.gpk.gid;
        let updated = core::mem::take(&mut self.verifier_rl_updated);
        let rl = self.lists.verifier.get_or_insert_with(|| VerifierRl {
            gid,
            B: base,
            version: 0,
            entries: Vec::new(),
        });
        if updated {
            rl.version += 1;
        }
        Ok(rl.clone())
    }

    pub fn group_public_key(&self) -> &GroupPublicKey<E> {
        &self.gpk
    }

    pub fn precomp(&self) -> &VerifierPrecomp<E> {
        &self.precomp
    }

    pub fn hash_alg(&self) -> HashAlg {
        self.hash_alg
    }

    pub fn basename(&self) -> Option<&[u8]> {
        self.config.basename.as_deref()
    }

    pub fn revocation_lists(&self) -> &RevocationLists<E> {
        &self.lists
    }
}
