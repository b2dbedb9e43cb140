//! Revocation lists and the checks a verifier runs against them.
//!
//! - [`GroupRl`] revokes whole groups by id.
//! - [`PrivRl`] lists leaked member secrets `f'`; a signature is revoked if `B*f' == K`.
//! - [`SigRl`] lists `(B', K')` of signatures whose signers are revoked. Signers prove for every entry
//!   that `K' != B'*f` with a [`NonRevokedProof`](crate::signature::NonRevokedProof).
//! - [`VerifierRl`] is a verifier's own blacklist of `K` values under its basename.
//!
//! Every list is versioned. Replacing a loaded list by one with a lower version is rejected.
//! The membership checks scan the whole list instead of stopping at the first match.

use crate::{
    common::{Epid2Params, GroupId, HashAlg},
    error::{EpidError, Rejection, RevocationListKind},
    signature::{BasicSignature, Signature},
};
use ark_ec::{pairing::Pairing, AffineRepr};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{cfg_iter, end_timer, start_timer, vec::Vec};
use core::sync::atomic::{AtomicBool, Ordering};
use dock_crypto_utils::serde_utils::ArkObjectBytes;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

#[cfg(feature = "parallel")]
use rayon::prelude::*;

#[derive(
    Clone,
    PartialEq,
    Eq,
    Debug,
    Default,
    CanonicalSerialize,
    CanonicalDeserialize,
    Serialize,
    Deserialize,
)]
pub struct GroupRl {
    pub version: u64,
    pub gids: Vec<GroupId>,
}

#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
pub struct PrivRl<E: Pairing> {
    pub gid: GroupId,
    pub version: u64,
    #[serde_as(as = "Vec<ArkObjectBytes>")]
    pub entries: Vec<E::ScalarField>,
}

#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
pub struct SigRlEntry<E: Pairing> {
    #[serde_as(as = "ArkObjectBytes")]
    pub B: E::G1Affine,
    #[serde_as(as = "ArkObjectBytes")]
    pub K: E::G1Affine,
}

#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
#[serde(bound = "")]
pub struct SigRl<E: Pairing> {
    pub gid: GroupId,
    pub version: u64,
    pub entries: Vec<SigRlEntry<E>>,
}

/// Blacklist of a verifier using a fixed basename, whose base is `B`
#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
pub struct VerifierRl<E: Pairing> {
    pub gid: GroupId,
    #[serde_as(as = "ArkObjectBytes")]
    pub B: E::G1Affine,
    pub version: u64,
    #[serde_as(as = "Vec<ArkObjectBytes>")]
    pub entries: Vec<E::G1Affine>,
}

impl<E: Pairing> SigRlEntry<E> {
    /// An entry with an identity point would make every signer look revoked
    pub fn is_valid(&self) -> bool {
        !(self.B.is_zero() || self.K.is_zero())
    }
}

impl<E: Pairing> SigRl<E> {
    pub fn is_valid(&self) -> bool {
        self.entries.iter().all(|e| e.is_valid())
    }
}

impl<E: Pairing> From<&BasicSignature<E>> for SigRlEntry<E> {
    fn from(sig: &BasicSignature<E>) -> Self {
        Self { B: sig.B, K: sig.K }
    }
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum RevocationList<E: Pairing> {
    Group(GroupRl),
    PrivateKey(PrivRl<E>),
    Signature(SigRl<E>),
    Verifier(VerifierRl<E>),
}

impl<E: Pairing> RevocationList<E> {
    pub fn kind(&self) -> RevocationListKind {
        match self {
            Self::Group(_) => RevocationListKind::Group,
            Self::PrivateKey(_) => RevocationListKind::PrivateKey,
            Self::Signature(_) => RevocationListKind::Signature,
            Self::Verifier(_) => RevocationListKind::Verifier,
        }
    }

    pub fn version(&self) -> u64 {
        match self {
            Self::Group(l) => l.version,
            Self::PrivateKey(l) => l.version,
            Self::Signature(l) => l.version,
            Self::Verifier(l) => l.version,
        }
    }

    /// Group the list belongs to. The group revocation list spans groups.
    pub fn gid(&self) -> Option<GroupId> {
        match self {
            Self::Group(_) => None,
            Self::PrivateKey(l) => Some(l.gid),
            Self::Signature(l) => Some(l.gid),
            Self::Verifier(l) => Some(l.gid),
        }
    }

    pub fn len(&self) -> usize {
        match self {
            Self::Group(l) => l.gids.len(),
            Self::PrivateKey(l) => l.entries.len(),
            Self::Signature(l) => l.entries.len(),
            Self::Verifier(l) => l.entries.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Entries are group elements other than the identity
    pub fn is_valid(&self) -> bool {
        match self {
            Self::Group(_) | Self::PrivateKey(_) => true,
            Self::Signature(l) => l.is_valid(),
            Self::Verifier(l) => !l.B.is_zero() && l.entries.iter().all(|K| !K.is_zero()),
        }
    }
}

/// The currently loaded list of each kind
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct RevocationLists<E: Pairing> {
    pub group: Option<GroupRl>,
    pub private_key: Option<PrivRl<E>>,
    pub signature: Option<SigRl<E>>,
    pub verifier: Option<VerifierRl<E>>,
}

impl<E: Pairing> Default for RevocationLists<E> {
    fn default() -> Self {
        Self {
            group: None,
            private_key: None,
            signature: None,
            verifier: None,
        }
    }
}

impl<E: Pairing> RevocationLists<E> {
    pub fn version(&self, kind: RevocationListKind) -> Option<u64> {
        match kind {
            RevocationListKind::Group => self.group.as_ref().map(|l| l.version),
            RevocationListKind::PrivateKey => self.private_key.as_ref().map(|l| l.version),
            RevocationListKind::Signature => self.signature.as_ref().map(|l| l.version),
            RevocationListKind::Verifier => self.verifier.as_ref().map(|l| l.version),
        }
    }

    /// Load a list, replacing the loaded one of the same kind. Fails if the incoming list is older
    /// or has identity points as entries.
    pub fn set(&mut self, list: RevocationList<E>) -> Result<(), EpidError> {
        if !list.is_valid() {
            return Err(EpidError::InvalidRevocationList);
        }
        let kind = list.kind();
        if let Some(current) = self.version(kind) {
            let incoming = list.version();
            if incoming < current {
                return Err(EpidError::StaleRevocationList {
                    kind,
                    current,
                    incoming,
                });
            }
        }
        match list {
            RevocationList::Group(l) => self.group = Some(l),
            RevocationList::PrivateKey(l) => self.private_key = Some(l),
            RevocationList::Signature(l) => self.signature = Some(l),
            RevocationList::Verifier(l) => self.verifier = Some(l),
        }
        Ok(())
    }

    /// Drop the lists that belong to a specific group
    pub fn clear_group_bound(&mut self) {
        self.private_key = None;
        self.signature = None;
        self.verifier = None;
    }
}

pub fn check_group(gid: &GroupId, rl: &GroupRl) -> bool {
    rl.gids.iter().fold(false, |revoked, g| revoked | (g == gid))
}

pub fn check_private_key<E: Pairing>(sig: &BasicSignature<E>, rl: &PrivRl<E>) -> bool {
    let K = sig.K.into_group();
    cfg_iter!(rl.entries).filter(|f| sig.B * **f == K).count() > 0
}

/// Check the non-revoked proofs of a signature against a signature revocation list.
/// Returns `Ok(true)` if any proof shows that the signer is revoked. Checking stops with
/// `Rejection::Cancelled` once `cancel` is set.
pub fn check_signature<E: Pairing>(
    hash_alg: HashAlg,
    params: &Epid2Params<E>,
    sig: &Signature<E>,
    message: &[u8],
    rl: &SigRl<E>,
    cancel: &AtomicBool,
) -> Result<bool, Rejection> {
    if sig.non_revoked_proofs.len() != rl.entries.len() {
        return Err(Rejection::MissingNonRevokedProof);
    }
    if rl.entries.is_empty() {
        return Ok(false);
    }
    if sig.sig_rl_version != rl.version {
        return Err(Rejection::SigRlVersionMismatch);
    }
    let timer = start_timer!(|| "Check signature revocation list");
    let revoked = cfg_iter!(rl.entries)
        .zip(cfg_iter!(sig.non_revoked_proofs))
        .map(|(entry, proof)| {
            if cancel.load(Ordering::Acquire) {
                return Err(Rejection::Cancelled);
            }
            proof.verify(&sig.basic, entry, message, hash_alg, params)
        })
        .collect::<Result<Vec<_>, _>>()?;
    end_timer!(timer);
    Ok(revoked.into_iter().any(|r| r))
}

pub fn check_verifier_blacklist<E: Pairing>(sig: &BasicSignature<E>, rl: &VerifierRl<E>) -> bool {
    rl.entries
        .iter()
        .fold(false, |revoked, K| revoked | (*K == sig.K))
}

type CheckFn<'a, E> =
    fn(&RevocationChecker<'a, E>, &Signature<E>, &[u8], &AtomicBool) -> Result<bool, Rejection>;

/// Runs the check of every loaded list in the fixed order group, private key, signature, verifier.
pub struct RevocationChecker<'a, E: Pairing> {
    pub lists: &'a RevocationLists<E>,
    pub params: &'a Epid2Params<E>,
    pub gid: GroupId,
    pub hash_alg: HashAlg,
}

impl<'a, E: Pairing> RevocationChecker<'a, E> {
    pub fn new(
        lists: &'a RevocationLists<E>,
        params: &'a Epid2Params<E>,
        gid: GroupId,
        hash_alg: HashAlg,
    ) -> Self {
        Self {
            lists,
            params,
            gid,
            hash_alg,
        }
    }

    fn strategies() -> [(RevocationListKind, CheckFn<'a, E>); 4] {
        [
            (RevocationListKind::Group, Self::check_group_rl),
            (RevocationListKind::PrivateKey, Self::check_priv_rl),
            (RevocationListKind::Signature, Self::check_sig_rl),
            (RevocationListKind::Verifier, Self::check_verifier_rl),
        ]
    }

    /// First revocation found wins
    pub fn check(
        &self,
        sig: &Signature<E>,
        message: &[u8],
        cancel: &AtomicBool,
    ) -> Result<(), Rejection> {
        for (kind, strategy) in Self::strategies() {
            if strategy(self, sig, message, cancel)? {
                return Err(Rejection::RevokedBy(kind));
            }
        }
        Ok(())
    }

    fn check_group_rl(
        &self,
        _sig: &Signature<E>,
        _message: &[u8],
        _cancel: &AtomicBool,
    ) -> Result<bool, Rejection> {
        Ok(self
            .lists
            .group
            .as_ref()
            .map_or(false, |rl| check_group(&self.gid, rl)))
    }

    fn check_priv_rl(
        &self,
        sig: &Signature<E>,
        _message: &[u8],
        _cancel: &AtomicBool,
    ) -> Result<bool, Rejection> {
        Ok(self
            .lists
            .private_key
            .as_ref()
            .map_or(false, |rl| check_private_key(&sig.basic, rl)))
    }

    fn check_sig_rl(
        &self,
        sig: &Signature<E>,
        message: &[u8],
        cancel: &AtomicBool,
    ) -> Result<bool, Rejection> {
        match &self.lists.signature {
            Some(rl) => check_signature(self.hash_alg, self.params, sig, message, rl, cancel),
            None => Ok(false),
        }
    }

    fn check_verifier_rl(
        &self,
        sig: &Signature<E>,
        _message: &[u8],
        _cancel: &AtomicBool,
    ) -> Result<bool, Rejection> {
        Ok(self
            .lists
            .verifier
            .as_ref()
            .map_or(false, |rl| check_verifier_blacklist(&sig.basic, rl)))
    }
}
