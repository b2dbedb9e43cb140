//! The trust boundary around the member secret `f`.
//!
//! All computation involving `f` happens behind the [`SecretSigner`] trait, which exposes a split
//! Schnorr protocol: [`SecretSigner::commit`] returns a commitment and a single-use
//! [`CommitmentState`], the host derives a challenge from public data and [`SecretSigner::respond`]
//! answers it. The signer never sees the message being signed.
//!
//! Two kinds of commitments exist:
//! - for a signature, with base `B` (random, or derived from a basename): `K = B*f`, `R1 = B*rf`
//!   and `R_h1 = h1*rf`, answered with `sf = rf + c*f`.
//! - for a proof that the member is not revoked by a signature revocation list entry `(B', K')`:
//!   `T = K'*mu + B'*nu` with `nu = -f*mu`, `R1 = K*rmu + B*rnu`, `R2 = K'*rmu + B'*rnu`, answered with
//!   `smu = rmu + c*mu` and `snu = rnu + c*nu`.

use crate::{
    common::random_nonzero_scalar,
    credential::{JoinChallenge, JoinRequest, MemberSecret},
    error::EpidError,
    revocation::SigRlEntry,
};
use ark_ec::{pairing::Pairing, AffineRepr, CurveGroup};
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::{collections::BTreeMap, rand::RngCore, vec, vec::Vec};
use dock_crypto_utils::serde_utils::ArkObjectBytes;
use schnorr_pok::{SchnorrCommitment, SchnorrResponse};
use serde::{Deserialize, Serialize};
use serde_with::serde_as;
use zeroize::{Zeroize, ZeroizeOnDrop};

pub const DEFAULT_MAX_PENDING_COMMITMENTS: usize = 1024;

/// What the host asks the secret signer to commit to
#[derive(Clone, PartialEq, Eq, Debug)]
pub enum CommitRequest<E: Pairing> {
    /// Commit for a signature with base `B`. A random base is chosen by the signer when `None`.
    Sign { base: Option<E::G1Affine> },
    /// Commit for a proof that the member holding `K = B*f` was not revoked by `entry`
    NonRevoked {
        B: E::G1Affine,
        K: E::G1Affine,
        entry: SigRlEntry<E>,
    },
}

impl<E: Pairing> CommitRequest<E> {
    pub fn kind(&self) -> CommitmentKind {
        match self {
            Self::Sign { .. } => CommitmentKind::Sign,
            Self::NonRevoked { .. } => CommitmentKind::NonRevoked,
        }
    }
}

#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
pub struct SignCommitment<E: Pairing> {
    #[serde_as(as = "ArkObjectBytes")]
    pub B: E::G1Affine,
    #[serde_as(as = "ArkObjectBytes")]
    pub K: E::G1Affine,
    #[serde_as(as = "ArkObjectBytes")]
    pub R1: E::G1Affine,
    /// `h1 * rf`, lets the host add `e(h1, g2)*rf` to its pairing commitment
    #[serde_as(as = "ArkObjectBytes")]
    pub R_h1: E::G1Affine,
}

#[serde_as]
#[derive(
    Clone, PartialEq, Eq, Debug, CanonicalSerialize, CanonicalDeserialize, Serialize, Deserialize,
)]
pub struct NonRevokedCommitment<E: Pairing> {
    #[serde_as(as = "ArkObjectBytes")]
    pub T: E::G1Affine,
    #[serde_as(as = "ArkObjectBytes")]
    pub R1: E::G1Affine,
    #[serde_as(as = "ArkObjectBytes")]
    pub R2: E::G1Affine,
}

#[derive(Clone, PartialEq, Eq, Debug)]
pub enum Commitment<E: Pairing> {
    Sign(SignCommitment<E>),
    NonRevoked(NonRevokedCommitment<E>),
}

impl<E: Pairing> Commitment<E> {
    pub fn kind(&self) -> CommitmentKind {
        match self {
            Self::Sign(_) => CommitmentKind::Sign,
            Self::NonRevoked(_) => CommitmentKind::NonRevoked,
        }
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum CommitmentKind {
    Sign = 0,
    NonRevoked = 1,
}

impl TryFrom<u8> for CommitmentKind {
    type Error = EpidError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Sign),
            1 => Ok(Self::NonRevoked),
            _ => Err(EpidError::MalformedSignerMessage),
        }
    }
}

/// Handle to a pending commitment inside a secret signer. It is not `Clone` and
/// [`SecretSigner::respond`] takes it by value so a commitment is answered at most once.
#[derive(PartialEq, Eq, Debug)]
pub struct CommitmentState {
    id: u64,
    kind: CommitmentKind,
}

impl CommitmentState {
    /// For use by [`SecretSigner`] implementations only
    pub fn new(id: u64, kind: CommitmentKind) -> Self {
        Self { id, kind }
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn kind(&self) -> CommitmentKind {
        self.kind
    }
}

pub trait SecretSigner<E: Pairing> {
    /// Create a join request `F = h1*f` with a proof of knowledge of `f` bound to the challenge
    fn join(&mut self, challenge: &JoinChallenge) -> Result<JoinRequest<E>, EpidError>;

    fn commit(
        &mut self,
        request: CommitRequest<E>,
    ) -> Result<(Commitment<E>, CommitmentState), EpidError>;

    /// Answer the challenge for a pending commitment. Returns 1 response for a signature commitment
    /// and 2 for a non-revoked commitment. Consumes the state even on failure.
    fn respond(
        &mut self,
        state: CommitmentState,
        challenge: &E::ScalarField,
    ) -> Result<SchnorrResponse<E::G1Affine>, EpidError>;

    /// How many commitments the signer keeps pending before it drops the oldest. `None` when there
    /// is no bound.
    fn max_pending_commitments(&self) -> Option<usize> {
        None
    }
}

impl<E: Pairing, S: SecretSigner<E> + ?Sized> SecretSigner<E> for &mut S {
    fn join(&mut self, challenge: &JoinChallenge) -> Result<JoinRequest<E>, EpidError> {
        (**self).join(challenge)
    }

    fn commit(
        &mut self,
        request: CommitRequest<E>,
    ) -> Result<(Commitment<E>, CommitmentState), EpidError> {
        (**self).commit(request)
    }

    fn respond(
        &mut self,
        state: CommitmentState,
        challenge: &E::ScalarField,
    ) -> Result<SchnorrResponse<E::G1Affine>, EpidError> {
        (**self).respond(state, challenge)
    }

    fn max_pending_commitments(&self) -> Option<usize> {
        (**self).max_pending_commitments()
    }
}

#[derive(Zeroize, ZeroizeOnDrop)]
struct PendingCommitment<E: Pairing> {
    #[zeroize(skip)]
    kind: CommitmentKind,
    commitment: SchnorrCommitment<E::G1Affine>,
    witnesses: Vec<E::ScalarField>,
}

/// Secret signer keeping `f` in process memory
pub struct InProcessSecretSigner<E: Pairing, R: RngCore> {
    rng: R,
    h1: E::G1Affine,
    secret: Option<MemberSecret<E::ScalarField>>,
    pending: BTreeMap<u64, PendingCommitment<E>>,
    next_id: u64,
    max_pending: usize,
}

impl<E: Pairing, R: RngCore> InProcessSecretSigner<E, R> {
    /// Signer for a group with public key element `h1`, without a secret yet
    pub fn new(rng: R, h1: E::G1Affine) -> Self {
        Self {
            rng,
            h1,
            secret: None,
            pending: BTreeMap::new(),
            next_id: 0,
            max_pending: DEFAULT_MAX_PENDING_COMMITMENTS,
        }
    }

    pub fn with_secret(rng: R, h1: E::G1Affine, secret: MemberSecret<E::ScalarField>) -> Self {
        let mut signer = Self::new(rng, h1);
        signer.secret = Some(secret);
        signer
    }

    /// At most `max_pending` commitments are kept. When full, the oldest one is dropped and its
    /// state can no longer be answered.
    pub fn with_max_pending(mut self, max_pending: usize) -> Self {
        self.max_pending = max_pending.max(1);
        self
    }

    /// Generate a fresh secret, replacing any existing one
    pub fn generate_secret(&mut self) -> Result<(), EpidError> {
        let secret = MemberSecret::new(&mut self.rng)?;
        self.provision_secret(secret);
        Ok(())
    }

    /// Replace the secret. Pending commitments are for the old secret and are discarded.
    pub fn provision_secret(&mut self, secret: MemberSecret<E::ScalarField>) {
        self.pending.clear();
        self.secret = Some(secret);
    }

    pub fn has_secret(&self) -> bool {
        self.secret.is_some()
    }

    pub fn pending_commitments(&self) -> usize {
        self.pending.len()
    }

    fn secret(&self) -> Result<&MemberSecret<E::ScalarField>, EpidError> {
        self.secret.as_ref().ok_or(EpidError::SecretUnavailable)
    }

    fn store(&mut self, pending: PendingCommitment<E>) -> CommitmentState {
        while self.pending.len() >= self.max_pending {
            self.pending.pop_first();
        }
        let id = self.next_id;
        self.next_id += 1;
        let kind = pending.kind;
        self.pending.insert(id, pending);
        CommitmentState::new(id, kind)
    }

    fn commit_sign(
        &mut self,
        base: Option<E::G1Affine>,
    ) -> Result<(SignCommitment<E>, PendingCommitment<E>), EpidError> {
        let f = self.secret()?.0;
        let B = match base {
            Some(B) if B.is_zero() => return Err(EpidError::InvalidCommitRequest),
            Some(B) => B,
            None => (self.h1 * random_nonzero_scalar::<E::ScalarField, _>(&mut self.rng)?)
                .into_affine(),
        };
        let rf = random_nonzero_scalar(&mut self.rng)?;
        let commitment = SchnorrCommitment::new(&[B], vec![rf]);
        let sign = SignCommitment {
            B,
            K: (B * f).into_affine(),
            R1: commitment.t,
            R_h1: (self.h1 * rf).into_affine(),
        };
        Ok((
            sign,
            PendingCommitment {
                kind: CommitmentKind::Sign,
                commitment,
                witnesses: vec![f],
            },
        ))
    }

    fn commit_non_revoked(
        &mut self,
        B: E::G1Affine,
        K: E::G1Affine,
        entry: &SigRlEntry<E>,
    ) -> Result<(NonRevokedCommitment<E>, PendingCommitment<E>), EpidError> {
        let f = self.secret()?.0;
        // Only prove non-revocation for a (B, K) this signer produced
        if B.is_zero() || (B * f).into_affine() != K || !entry.is_valid() {
            return Err(EpidError::InvalidCommitRequest);
        }
        let mu = random_nonzero_scalar::<E::ScalarField, _>(&mut self.rng)?;
        let nu = -(f * mu);
        let T = (entry.K * mu + entry.B * nu).into_affine();
        if T.is_zero() {
            return Err(EpidError::MemberRevokedInSigRl);
        }
        let r_mu = random_nonzero_scalar::<E::ScalarField, _>(&mut self.rng)?;
        let r_nu = random_nonzero_scalar::<E::ScalarField, _>(&mut self.rng)?;
        let commitment = SchnorrCommitment::new(&[K, B], vec![r_mu, r_nu]);
        let non_revoked = NonRevokedCommitment {
            T,
            R1: commitment.t,
            R2: (entry.K * r_mu + entry.B * r_nu).into_affine(),
        };
        Ok((
            non_revoked,
            PendingCommitment {
                kind: CommitmentKind::NonRevoked,
                commitment,
                witnesses: vec![mu, nu],
            },
        ))
    }
}

impl<E: Pairing, R: RngCore> SecretSigner<E> for InProcessSecretSigner<E, R> {
    fn join(&mut self, challenge: &JoinChallenge) -> Result<JoinRequest<E>, EpidError> {
        let secret = self.secret.as_ref().ok_or(EpidError::SecretUnavailable)?;
        JoinRequest::new(&mut self.rng, secret, &self.h1, challenge)
    }

    fn commit(
        &mut self,
        request: CommitRequest<E>,
    ) -> Result<(Commitment<E>, CommitmentState), EpidError> {
        match request {
            CommitRequest::Sign { base } => {
                let (sign, pending) = self.commit_sign(base)?;
                Ok((Commitment::Sign(sign), self.store(pending)))
            }
            CommitRequest::NonRevoked { B, K, entry } => {
                let (non_revoked, pending) = self.commit_non_revoked(B, K, &entry)?;
                Ok((Commitment::NonRevoked(non_revoked), self.store(pending)))
            }
        }
    }

    fn respond(
        &mut self,
        state: CommitmentState,
        challenge: &E::ScalarField,
    ) -> Result<SchnorrResponse<E::G1Affine>, EpidError> {
        let pending = self
            .pending
            .remove(&state.id)
            .ok_or(EpidError::StateAlreadyConsumed)?;
        if pending.kind != state.kind {
            return Err(EpidError::CommitmentKindMismatch);
        }
        Ok(pending
            .commitment
            .response(&pending.witnesses, challenge)?)
    }

    fn max_pending_commitments(&self) -> Option<usize> {
        Some(self.max_pending)
    }
}

/// Commit for a signature and unwrap the expected commitment kind
pub(crate) fn commit_sign<E: Pairing, S: SecretSigner<E>>(
    signer: &mut S,
    base: Option<E::G1Affine>,
) -> Result<(SignCommitment<E>, CommitmentState), EpidError> {
    match signer.commit(CommitRequest::Sign { base })? {
        (Commitment::Sign(c), state) => {
            if base.map_or(false, |b| b != c.B) || c.K.is_zero() {
                return Err(EpidError::InvalidCommitRequest);
            }
            Ok((c, state))
        }
        _ => Err(EpidError::CommitmentKindMismatch),
    }
}

pub(crate) fn commit_non_revoked<E: Pairing, S: SecretSigner<E>>(
    signer: &mut S,
    B: E::G1Affine,
    K: E::G1Affine,
    entry: SigRlEntry<E>,
) -> Result<(NonRevokedCommitment<E>, CommitmentState), EpidError> {
    match signer.commit(CommitRequest::NonRevoked { B, K, entry })? {
        (Commitment::NonRevoked(c), state) => Ok((c, state)),
        _ => Err(EpidError::CommitmentKindMismatch),
    }
}
