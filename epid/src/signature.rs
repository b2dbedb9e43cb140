//! Signatures.
//!
//! A [`BasicSignature`] proves knowledge of a credential `(A, x)` and secret `f` such that
//! `e(A, w + g2*x) == e(g1 + h1*f, g2)` and `K = B*f`. With `T = A + h2*a` and `b = a*x`, the
//! prover commits to
//!
//! ```text
//! R1 = B*rf
//! R2 = e(A, g2)*(-rx) + e(h1, g2)*rf + e(h2, g2)*(rb - a*rx) + e(h2, w)*ra
//! ```
//!
//! and responds with `sx, sf, sa, sb`. The verifier recomputes
//!
//! ```text
//! R1 = B*sf - K*c
//! R2 = e(T, -(g2*sx + w*c)) + e(h1, g2)*sf + e(h2, g2)*sb + e(h2, w)*sa + e(g1, g2)*c
//! ```
//!
//! and checks that they hash to `c`. A [`Signature`] adds one [`NonRevokedProof`] per entry of the
//! signature revocation list it was created against.

use crate::{
    common::{Epid2Params, GroupPublicKey, HashAlg},
    error::{EpidError, Rejection},
    revocation::SigRlEntry,
    verifier::VerifierPrecomp,
};
use ark_ec::{
    pairing::{Pairing, PairingOutput},
    AffineRepr, CurveGroup,
};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{vec, vec::Vec};
use dock_crypto_utils::serde_utils::ArkObjectBytes;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;

#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
pub struct BasicSignature<E: Pairing> {
    #[serde_as(as = "ArkObjectBytes")]
    pub B: E::G1Affine,
    #[serde_as(as = "ArkObjectBytes")]
    pub K: E::G1Affine,
    #[serde_as(as = "ArkObjectBytes")]
    pub T: E::G1Affine,
    #[serde_as(as = "ArkObjectBytes")]
    pub c: E::ScalarField,
    #[serde_as(as = "ArkObjectBytes")]
    pub sx: E::ScalarField,
    #[serde_as(as = "ArkObjectBytes")]
    pub sf: E::ScalarField,
    #[serde_as(as = "ArkObjectBytes")]
    pub sa: E::ScalarField,
    #[serde_as(as = "ArkObjectBytes")]
    pub sb: E::ScalarField,
}

/// Proof that the signer of a basic signature did not create the entry `(B', K')` of a signature
/// revocation list, i.e. that `K' != B'*f`
#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
pub struct NonRevokedProof<E: Pairing> {
    #[serde_as(as = "ArkObjectBytes")]
    pub T: E::G1Affine,
    #[serde_as(as = "ArkObjectBytes")]
    pub c: E::ScalarField,
    #[serde_as(as = "ArkObjectBytes")]
    pub smu: E::ScalarField,
    #[serde_as(as = "ArkObjectBytes")]
    pub snu: E::ScalarField,
}

#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
#[serde(bound = "")]
pub struct Signature<E: Pairing> {
    pub basic: BasicSignature<E>,
    /// Version of the signature revocation list the proofs were created for, 0 when none was given
    pub sig_rl_version: u64,
    pub non_revoked_proofs: Vec<NonRevokedProof<E>>,
}

impl<E: Pairing> BasicSignature<E> {
    pub fn is_well_formed(&self) -> bool {
        !(self.B.is_zero() || self.K.is_zero() || self.T.is_zero())
    }

    pub fn verify(
        &self,
        message: &[u8],
        hash_alg: HashAlg,
        params: &Epid2Params<E>,
        gpk: &GroupPublicKey<E>,
        precomp: &VerifierPrecomp<E>,
    ) -> Result<(), Rejection> {
        if !self.is_well_formed() {
            return Err(Rejection::MalformedSignature);
        }
        let R1 = (self.B * self.sf - self.K * self.c).into_affine();
        let g2_part = -(params.g2 * self.sx + gpk.w * self.c);
        let R2 = E::pairing(self.T, g2_part)
            + precomp.e12 * self.sf
            + precomp.e22 * self.sb
            + precomp.e2w * self.sa
            + precomp.eg12 * self.c;
        let c = signature_challenge(
            hash_alg, params, gpk, &self.B, &self.K, &self.T, &R1, &R2, message,
        )
        .map_err(|_| Rejection::MalformedSignature)?;
        if c != self.c {
            return Err(Rejection::InvalidProof);
        }
        Ok(())
    }
}

impl<E: Pairing> NonRevokedProof<E> {
    /// Returns `Ok(true)` if the proof shows that the signer is revoked by `entry`, `Ok(false)` if it
    /// shows that the signer is not.
    pub fn verify(
        &self,
        sig: &BasicSignature<E>,
        entry: &SigRlEntry<E>,
        message: &[u8],
        hash_alg: HashAlg,
        params: &Epid2Params<E>,
    ) -> Result<bool, Rejection> {
        if self.T.is_zero() {
            return Ok(true);
        }
        let R1 = (sig.K * self.smu + sig.B * self.snu).into_affine();
        let R2 = (entry.K * self.smu + entry.B * self.snu - self.T * self.c).into_affine();
        let c = non_revoked_challenge(
            hash_alg, params, &sig.B, &sig.K, entry, &self.T, &R1, &R2, message,
        )
        .map_err(|_| Rejection::MalformedSignature)?;
        if c != self.c {
            return Err(Rejection::InvalidNonRevokedProof);
        }
        Ok(false)
    }
}

/// Two signatures are linked when they were created by the same member with the same basename
pub fn signatures_linked<E: Pairing>(sig1: &Signature<E>, sig2: &Signature<E>) -> bool {
    sig1.basic.B == sig2.basic.B && sig1.basic.K == sig2.basic.K
}

pub(crate) fn signature_challenge<E: Pairing>(
    hash_alg: HashAlg,
    params: &Epid2Params<E>,
    gpk: &GroupPublicKey<E>,
    B: &E::G1Affine,
    K: &E::G1Affine,
    T: &E::G1Affine,
    R1: &E::G1Affine,
    R2: &PairingOutput<E>,
    message: &[u8],
) -> Result<E::ScalarField, EpidError> {
    let mut bytes = vec![];
    gpk.challenge_contribution(params, &mut bytes)?;
    B.serialize_compressed(&mut bytes)?;
    K.serialize_compressed(&mut bytes)?;
    T.serialize_compressed(&mut bytes)?;
    R1.serialize_compressed(&mut bytes)?;
    R2.serialize_compressed(&mut bytes)?;
    bytes.extend_from_slice(message);
    Ok(hash_alg.hash_to_field(&bytes))
}

pub(crate) fn non_revoked_challenge<E: Pairing>(
    hash_alg: HashAlg,
    params: &Epid2Params<E>,
    B: &E::G1Affine,
    K: &E::G1Affine,
    entry: &SigRlEntry<E>,
    T: &E::G1Affine,
    R1: &E::G1Affine,
    R2: &E::G1Affine,
    message: &[u8],
) -> Result<E::ScalarField, EpidError> {
    let mut bytes = vec![];
    params.g1.serialize_compressed(&mut bytes)?;
    B.serialize_compressed(&mut bytes)?;
    K.serialize_compressed(&mut bytes)?;
    entry.B.serialize_compressed(&mut bytes)?;
    entry.K.serialize_compressed(&mut bytes)?;
    T.serialize_compressed(&mut bytes)?;
    R1.serialize_compressed(&mut bytes)?;
    R2.serialize_compressed(&mut bytes)?;
    bytes.extend_from_slice(message);
    Ok(hash_alg.hash_to_field(&bytes))
}
