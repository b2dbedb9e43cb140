//! Member credentials and the join request a member sends to obtain one.
//!
//! An issuer holding `gamma` (where `w = g2 * gamma`) certifies a member secret `f`, known to the issuer
//! only as `F = h1 * f`, by choosing `x` and computing `A = (g1 + F) * 1/(x + gamma)`. The member
//! then holds the credential `(A, x)` and can check it as `e(A, w + g2*x) == e(g1 + F, g2)`.
//! `f` never leaves the [`SecretSigner`](crate::secret_signer::SecretSigner).

use crate::{
    common::{random_nonzero_scalar, Epid2Params, GroupId, GroupPublicKey, HashAlg},
    error::EpidError,
};
use ark_ec::{
    pairing::{Pairing, PairingOutput},
    AffineRepr, CurveGroup,
};
use ark_ff::{PrimeField, Zero};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{rand::RngCore, vec, vec::Vec};
use dock_crypto_utils::serde_utils::ArkObjectBytes;
use schnorr_pok::discrete_log::{PokDiscreteLog, PokDiscreteLogProtocol};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use zeroize::{Zeroize, ZeroizeOnDrop};

/// The member secret `f`
#[serde_as]
#[derive(
    Clone,
    PartialEq,
    Eq,
    Debug,
    CanonicalSerialize,
    CanonicalDeserialize,
    Zeroize,
    ZeroizeOnDrop,
    Serialize,
    Deserialize,
)]
pub struct MemberSecret<F: PrimeField>(#[serde_as(as = "ArkObjectBytes")] pub F);

impl<F: PrimeField> MemberSecret<F> {
    pub fn new<R: RngCore>(rng: &mut R) -> Result<Self, EpidError> {
        Ok(Self(random_nonzero_scalar(rng)?))
    }
}

/// Credential `(A, x)` issued for a member secret
#[serde_as]
#[derive(
    Clone,
    PartialEq,
    Eq,
    Debug,
    CanonicalSerialize,
    CanonicalDeserialize,
    Zeroize,
    ZeroizeOnDrop,
    Serialize,
    Deserialize,
)]
pub struct MemberCredential<E: Pairing> {
    #[zeroize(skip)]
    pub gid: GroupId,
    #[zeroize(skip)]
    #[serde_as(as = "ArkObjectBytes")]
    pub A: E::G1Affine,
    #[serde_as(as = "ArkObjectBytes")]
    pub x: E::ScalarField,
}

impl<E: Pairing> MemberCredential<E> {
    /// Check `e(A, w + g2*x) == e(g1 + F, g2)`. `F` is `h1 * f` as reported by the secret signer.
    pub fn verify(
        &self,
        F: &E::G1Affine,
        params: &Epid2Params<E>,
        gpk: &GroupPublicKey<E>,
    ) -> Result<(), EpidError> {
        if self.gid != gpk.gid {
            return Err(EpidError::GroupIdMismatch);
        }
        if self.A.is_zero() || F.is_zero() {
            return Err(EpidError::InvalidCredential);
        }
        let w_g2x = gpk.w.into_group() + params.g2 * self.x;
        let g1_F = params.g1.into_group() + *F;
        if !E::multi_pairing(
            [self.A, (-g1_F).into_affine()],
            [w_g2x.into_affine(), params.g2],
        )
        .is_zero()
        {
            return Err(EpidError::InvalidCredential);
        }
        Ok(())
    }
}

/// What an issuer sends to a prospective member: the group and a fresh nonce the join proof is bound to
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct JoinChallenge {
    pub gid: GroupId,
    pub hash_alg: HashAlg,
    pub issuer_nonce: Vec<u8>,
}

/// `F = h1 * f` together with a proof of knowledge of `f`
#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
#[serde(bound = "")]
pub struct JoinRequest<E: Pairing> {
    #[serde_as(as = "ArkObjectBytes")]
    pub F: E::G1Affine,
    pub proof: PokDiscreteLog<E::G1Affine>,
}

impl<E: Pairing> JoinRequest<E> {
    /// Create the request for secret `f`. Called by secret signers, which own `f`.
    pub fn new<R: RngCore>(
        rng: &mut R,
        secret: &MemberSecret<E::ScalarField>,
        h1: &E::G1Affine,
        challenge: &JoinChallenge,
    ) -> Result<Self, EpidError> {
        let blinding = random_nonzero_scalar(rng)?;
        let protocol = PokDiscreteLogProtocol::init(secret.0, blinding, h1);
        let F = (*h1 * secret.0).into_affine();
        let c = Self::compute_challenge(h1, &F, &protocol.t, challenge)?;
        Ok(Self {
            F,
            proof: protocol.gen_proof(&c),
        })
    }

    pub fn verify(&self, h1: &E::G1Affine, challenge: &JoinChallenge) -> Result<(), EpidError> {
        if self.F.is_zero() {
            return Err(EpidError::InvalidJoinRequest);
        }
        let c = Self::compute_challenge(h1, &self.F, &self.proof.t, challenge)?;
        if !self.proof.verify(&self.F, h1, &c) {
            return Err(EpidError::InvalidJoinRequest);
        }
        Ok(())
    }

    fn compute_challenge(
        h1: &E::G1Affine,
        F: &E::G1Affine,
        t: &E::G1Affine,
        challenge: &JoinChallenge,
    ) -> Result<E::ScalarField, EpidError> {
        let mut bytes = vec![];
        PokDiscreteLogProtocol::compute_challenge_contribution(h1, F, t, &mut bytes)?;
        bytes.extend_from_slice(&challenge.gid.0);
        bytes.extend_from_slice(&challenge.issuer_nonce);
        Ok(challenge.hash_alg.hash_to_field(&bytes))
    }
}

/// Pairings a member needs for every pre-signature
#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
pub struct MemberPrecomputation<E: Pairing> {
    /// e(h1, g2)
    #[serde_as(as = "ArkObjectBytes")]
    pub e12: PairingOutput<E>,
    /// e(h2, g2)
    #[serde_as(as = "ArkObjectBytes")]
    pub e22: PairingOutput<E>,
    /// e(h2, w)
    #[serde_as(as = "ArkObjectBytes")]
    pub e2w: PairingOutput<E>,
    /// e(A, g2)
    #[serde_as(as = "ArkObjectBytes")]
    pub ea2: PairingOutput<E>,
}

impl<E: Pairing> MemberPrecomputation<E> {
    pub fn new(
        params: &Epid2Params<E>,
        gpk: &GroupPublicKey<E>,
        credential: &MemberCredential<E>,
    ) -> Self {
        let g2_prepared = E::G2Prepared::from(params.g2);
        Self {
            e12: E::pairing(gpk.h1, g2_prepared.clone()),
            e22: E::pairing(gpk.h2, g2_prepared.clone()),
            e2w: E::pairing(gpk.h2, gpk.w),
            ea2: E::pairing(credential.A, g2_prepared),
        }
    }
}

/// Everything public or host-held that a member signs with. The secret `f` is not part of it.
#[derive(Clone, PartialEq, Eq, Debug)]
pub struct SigningKey<E: Pairing> {
    pub params: Epid2Params<E>,
    pub gpk: GroupPublicKey<E>,
    pub credential: MemberCredential<E>,
    pub precomp: MemberPrecomputation<E>,
}

impl<E: Pairing> SigningKey<E> {
    pub fn new(
        params: Epid2Params<E>,
        gpk: GroupPublicKey<E>,
        credential: MemberCredential<E>,
    ) -> Self {
        let precomp = MemberPrecomputation::new(&params, &gpk, &credential);
        Self {
            params,
            gpk,
            credential,
            precomp,
        }
    }
}
