//! Group parameters, group identifiers and the helpers for hashing and sampling shared by members
//! and verifiers.

use crate::error::EpidError;
use ark_ec::{pairing::Pairing, AffineRepr};
use ark_ff::PrimeField;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{io::Write, rand::RngCore, vec::Vec, UniformRand};
use digest::Digest;
use dock_crypto_utils::{
    concat_slices, hashing_utils::affine_group_elem_from_try_and_incr,
    serde_utils::ArkObjectBytes,
};
use schnorr_pok::compute_random_oracle_challenge;
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use sha2::{Sha256, Sha384, Sha512, Sha512_256};
use zeroize::Zeroize;

pub const GROUP_ID_SIZE: usize = 16;

/// Scalar sampling gives up after this many zero draws in a row
const MAX_SAMPLING_ATTEMPTS: usize = 16;

/// Hash algorithms a group can be configured with. The discriminant is the value encoded in the
/// group id.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum HashAlg {
    Sha256 = 0,
    Sha384 = 1,
    Sha512 = 2,
    Sha512_256 = 3,
}

impl TryFrom<u8> for HashAlg {
    type Error = EpidError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Sha256),
            1 => Ok(Self::Sha384),
            2 => Ok(Self::Sha512),
            3 => Ok(Self::Sha512_256),
            v => Err(EpidError::UnsupportedHashAlg(v)),
        }
    }
}

impl HashAlg {
    /// Hash to a scalar. Only for public inputs like challenges.
    pub fn hash_to_field<F: PrimeField>(&self, bytes: &[u8]) -> F {
        match self {
            Self::Sha256 => compute_random_oracle_challenge::<F, Sha256>(bytes),
            Self::Sha384 => compute_random_oracle_challenge::<F, Sha384>(bytes),
            Self::Sha512 => compute_random_oracle_challenge::<F, Sha512>(bytes),
            Self::Sha512_256 => compute_random_oracle_challenge::<F, Sha512_256>(bytes),
        }
    }

    /// Hash to a group element whose discrete log is unknown, used to map basenames to bases
    pub fn hash_to_curve<G: AffineRepr>(&self, bytes: &[u8]) -> G {
        match self {
            Self::Sha256 => affine_group_elem_from_try_and_incr::<G, Sha256>(bytes),
            Self::Sha384 => affine_group_elem_from_try_and_incr::<G, Sha384>(bytes),
            Self::Sha512 => affine_group_elem_from_try_and_incr::<G, Sha512>(bytes),
            Self::Sha512_256 => affine_group_elem_from_try_and_incr::<G, Sha512_256>(bytes),
        }
    }
}

/// 16 byte group identifier.
///
/// The high nibble of byte 0 is the scheme version and must be 0. The low nibble of byte 1 selects
/// the hash algorithm of the group. The last 4 bytes are the big-endian group number.
#[derive(
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Debug,
    Default,
    CanonicalSerialize,
    CanonicalDeserialize,
    Serialize,
    Deserialize,
)]
pub struct GroupId(pub [u8; GROUP_ID_SIZE]);

impl GroupId {
    pub fn new(hash_alg: HashAlg, core: u32) -> Self {
        let mut id = [0u8; GROUP_ID_SIZE];
        id[1] = hash_alg as u8;
        id[GROUP_ID_SIZE - 4..].copy_from_slice(&core.to_be_bytes());
        Self(id)
    }

    pub fn hash_alg(&self) -> Result<HashAlg, EpidError> {
        let scheme = self.0[0] >> 4;
        if scheme != 0 {
            return Err(EpidError::UnsupportedGroupIdScheme(scheme));
        }
        HashAlg::try_from(self.0[1] & 0x0f)
    }

    /// Returns a copy of this id with the hash algorithm replaced
    pub fn with_hash_alg(mut self, hash_alg: HashAlg) -> Self {
        self.0[1] = (self.0[1] & 0xf0) | hash_alg as u8;
        self
    }

    pub fn core(&self) -> u32 {
        let mut core = [0u8; 4];
        core.copy_from_slice(&self.0[GROUP_ID_SIZE - 4..]);
        u32::from_be_bytes(core)
    }
}

/// Generators of G1 and G2 shared by all groups
#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
pub struct Epid2Params<E: Pairing> {
    #[serde_as(as = "ArkObjectBytes")]
    pub g1: E::G1Affine,
    #[serde_as(as = "ArkObjectBytes")]
    pub g2: E::G2Affine,
}

impl<E: Pairing> Epid2Params<E> {
    pub fn new<D: Digest>(label: &[u8]) -> Self {
        let g1 =
            affine_group_elem_from_try_and_incr::<E::G1Affine, D>(&concat_slices![label, b" : g1"]);
        let g2 =
            affine_group_elem_from_try_and_incr::<E::G2Affine, D>(&concat_slices![label, b" : g2"]);
        Self { g1, g2 }
    }

    pub fn generate_using_rng<R: RngCore>(rng: &mut R) -> Self {
        Self {
            g1: E::G1::rand(rng).into(),
            g2: E::G2::rand(rng).into(),
        }
    }

    pub fn is_valid(&self) -> bool {
        !(self.g1.is_zero() || self.g2.is_zero())
    }
}

/// Public key of a group. `w = g2 * gamma` where `gamma` is the issuer's secret.
#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
pub struct GroupPublicKey<E: Pairing> {
    pub gid: GroupId,
    #[serde_as(as = "ArkObjectBytes")]
    pub h1: E::G1Affine,
    #[serde_as(as = "ArkObjectBytes")]
    pub h2: E::G1Affine,
    #[serde_as(as = "ArkObjectBytes")]
    pub w: E::G2Affine,
}

impl<E: Pairing> GroupPublicKey<E> {
    /// None of the elements may be the identity. Must be checked before the key is used.
    pub fn is_valid(&self) -> bool {
        !(self.h1.is_zero() || self.h2.is_zero() || self.w.is_zero())
    }

    /// Bytes of the group parameters that go into every signature challenge
    pub fn challenge_contribution<W: Write>(
        &self,
        params: &Epid2Params<E>,
        mut writer: W,
    ) -> Result<(), EpidError> {
        params.g1.serialize_compressed(&mut writer)?;
        params.g2.serialize_compressed(&mut writer)?;
        self.h1.serialize_compressed(&mut writer)?;
        self.h2.serialize_compressed(&mut writer)?;
        self.w.serialize_compressed(&mut writer)?;
        Ok(())
    }
}

/// Sample a non-zero scalar. Fails with `InsufficientEntropy` if the random source reports an error
/// instead of silently producing weak randomness.
pub fn random_nonzero_scalar<F: PrimeField, R: RngCore>(rng: &mut R) -> Result<F, EpidError> {
    let mut bytes = [0u8; 64];
    for _ in 0..MAX_SAMPLING_ATTEMPTS {
        let filled = rng.try_fill_bytes(&mut bytes);
        let s = F::from_le_bytes_mod_order(&bytes);
        bytes.zeroize();
        if filled.is_err() {
            return Err(EpidError::InsufficientEntropy);
        }
        if !s.is_zero() {
            return Ok(s);
        }
    }
    Err(EpidError::InsufficientEntropy)
}

pub fn random_nonzero_scalars<F: PrimeField, R: RngCore>(
    rng: &mut R,
    count: usize,
) -> Result<Vec<F>, EpidError> {
    (0..count).map(|_| random_nonzero_scalar(rng)).collect()
}

pub fn random_nonce<R: RngCore>(rng: &mut R) -> Result<[u8; 32], EpidError> {
    let mut nonce = [0u8; 32];
    rng.try_fill_bytes(&mut nonce)
        .map_err(|_| EpidError::InsufficientEntropy)?;
    Ok(nonce)
}
