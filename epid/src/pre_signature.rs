//! Pre-signatures are the message independent part of a signature, computed ahead of time so that
//! signing itself is cheap. Each one holds fresh randomness and a pending commitment inside the
//! secret signer, so it must be used for at most one signature. [`PreSignature`] is neither `Clone`
//! nor `Copy` and is consumed when used.

use crate::{
    common::random_nonzero_scalars,
    credential::{MemberPrecomputation, SigningKey},
    error::EpidError,
    secret_signer::{commit_sign, CommitmentState, SecretSigner, SignCommitment},
};
use ark_ec::{
    pairing::{Pairing, PairingOutput},
    CurveGroup,
};
use ark_ff::PrimeField;
use ark_std::{
    cfg_into_iter, collections::VecDeque, end_timer, rand::RngCore, start_timer, vec::Vec,
};
use zeroize::{Zeroize, ZeroizeOnDrop};

#[cfg(feature = "parallel")]
use rayon::prelude::*;

/// Randomness of a pre-signature, `a, b = a*x, rx, ra, rb`
#[derive(Clone, PartialEq, Eq, Debug, Zeroize, ZeroizeOnDrop)]
pub(crate) struct PreSignatureSecrets<F: PrimeField> {
    pub(crate) a: F,
    pub(crate) b: F,
    pub(crate) rx: F,
    pub(crate) ra: F,
    pub(crate) rb: F,
}

impl<F: PrimeField> PreSignatureSecrets<F> {
    fn new<R: RngCore>(rng: &mut R, x: &F) -> Result<Self, EpidError> {
        let mut r = random_nonzero_scalars::<F, _>(rng, 4)?;
        let secrets = Self {
            a: r[0],
            b: r[0] * x,
            rx: r[1],
            ra: r[2],
            rb: r[3],
        };
        r.zeroize();
        Ok(secrets)
    }

    /// `e(A, g2)*(-rx) + e(h2, g2)*(rb - a*rx) + e(h2, w)*ra`
    fn pairing_commitment<E: Pairing<ScalarField = F>>(
        &self,
        precomp: &MemberPrecomputation<E>,
    ) -> PairingOutput<E> {
        precomp.ea2 * (-self.rx)
            + precomp.e22 * (self.rb - self.a * self.rx)
            + precomp.e2w * self.ra
    }
}

pub struct PreSignature<E: Pairing> {
    pub B: E::G1Affine,
    pub K: E::G1Affine,
    /// `A + h2*a`
    pub T: E::G1Affine,
    pub R1: E::G1Affine,
    pub R2: PairingOutput<E>,
    /// `R2` without the secret signer's contribution `e(h1, g2)*rf`
    pub(crate) R2_host: PairingOutput<E>,
    pub(crate) secrets: PreSignatureSecrets<E::ScalarField>,
    pub(crate) state: CommitmentState,
}

impl<E: Pairing> PreSignature<E> {
    /// Compute one pre-signature with a random base
    pub fn compute<R: RngCore, S: SecretSigner<E>>(
        rng: &mut R,
        key: &SigningKey<E>,
        signer: &mut S,
    ) -> Result<Self, EpidError> {
        let secrets = PreSignatureSecrets::new(rng, &key.credential.x)?;
        let (commitment, state) = commit_sign(signer, None)?;
        Ok(Self::assemble(key, secrets, commitment, state))
    }

    fn assemble(
        key: &SigningKey<E>,
        secrets: PreSignatureSecrets<E::ScalarField>,
        commitment: SignCommitment<E>,
        state: CommitmentState,
    ) -> Self {
        let T = (key.credential.A + key.gpk.h2 * secrets.a).into_affine();
        let R2_host = secrets.pairing_commitment(&key.precomp);
        let R2 = R2_host + E::pairing(commitment.R_h1, key.params.g2);
        Self {
            B: commitment.B,
            K: commitment.K,
            T,
            R1: commitment.R1,
            R2,
            R2_host,
            secrets,
            state,
        }
    }

    /// Replace the random base by `base`. The signer commitment made for the random base is abandoned
    /// and a new one is requested. The host randomness is kept as it was never revealed.
    pub fn rebase<S: SecretSigner<E>>(
        self,
        base: E::G1Affine,
        key: &SigningKey<E>,
        signer: &mut S,
    ) -> Result<Self, EpidError> {
        let (commitment, state) = commit_sign(signer, Some(base))?;
        let R2 = self.R2_host + E::pairing(commitment.R_h1, key.params.g2);
        Ok(Self {
            B: commitment.B,
            K: commitment.K,
            T: self.T,
            R1: commitment.R1,
            R2,
            R2_host: self.R2_host,
            secrets: self.secrets,
            state,
        })
    }
}

/// Commitments a signature needs besides the one of its pre-signature, one for a basename and one
/// for the non-revoked proof being created
pub const SIGNING_RESERVED_COMMITMENTS: usize = 2;

/// Most pre-signatures whose commitments `signer` keeps alive while still being able to sign
pub fn max_pool_capacity<E: Pairing, S: SecretSigner<E>>(signer: &S) -> usize {
    signer
        .max_pending_commitments()
        .map_or(usize::MAX, |m| m.saturating_sub(SIGNING_RESERVED_COMMITMENTS))
}

/// FIFO pool of pre-signatures, bounded by its capacity
pub struct PreSignaturePool<E: Pairing> {
    capacity: usize,
    pre_signatures: VecDeque<PreSignature<E>>,
}

impl<E: Pairing> PreSignaturePool<E> {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            pre_signatures: VecDeque::with_capacity(capacity),
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Shrinking below the current count drops the oldest pre-signatures. Their commitments are left
    /// to the signer, which evicts the oldest first, so they go before any pooled one.
    pub fn set_capacity(&mut self, capacity: usize) {
        self.capacity = capacity;
        let surplus = self.pre_signatures.len().saturating_sub(capacity);
        self.pre_signatures.drain(..surplus);
    }

    pub fn count(&self) -> usize {
        self.pre_signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pre_signatures.is_empty()
    }

    /// Take the oldest pre-signature out of the pool
    pub fn take_one(&mut self) -> Result<PreSignature<E>, EpidError> {
        self.pre_signatures
            .pop_front()
            .ok_or(EpidError::PreSignaturePoolEmpty)
    }

    /// Add pre-signatures until the pool holds `target`. Returns the number added. `target` can't
    /// exceed the capacity nor [`max_pool_capacity`] of `signer`. On error the pool is left as it was.
    pub fn refill<R: RngCore, S: SecretSigner<E>>(
        &mut self,
        rng: &mut R,
        target: usize,
        key: &SigningKey<E>,
        signer: &mut S,
    ) -> Result<usize, EpidError> {
        if target > self.capacity {
            return Err(EpidError::PoolCapacityExceeded(target, self.capacity));
        }
        let limit = max_pool_capacity::<E, _>(&*signer);
        if target > limit {
            return Err(EpidError::PoolCapacityExceeded(target, limit));
        }
        let needed = target.saturating_sub(self.count());
        if needed == 0 {
            return Ok(0);
        }
        let timer = start_timer!(|| "Refill pre-signatures");
        // The signer is used serially, the pairings and scalar multiplications are independent
        let mut committed = Vec::with_capacity(needed);
        for _ in 0..needed {
            let secrets = PreSignatureSecrets::new(rng, &key.credential.x)?;
            let (commitment, state) = commit_sign(signer, None)?;
            committed.push((secrets, commitment, state));
        }
        let fresh = cfg_into_iter!(committed)
            .map(|(secrets, commitment, state)| {
                PreSignature::assemble(key, secrets, commitment, state)
            })
            .collect::<Vec<_>>();
        self.pre_signatures.extend(fresh);
        end_timer!(timer);
        Ok(needed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{common::HashAlg, test_support::TestGroup};
    use ark_bls12_381::{Bls12_381, Fr};
    use ark_std::rand::{rngs::StdRng, SeedableRng};

    #[test]
    fn pre_signature_is_consistent() {
        let mut rng = StdRng::seed_from_u64(0u64);
        let group = TestGroup::new(&mut rng, HashAlg::Sha256);
        let (key, mut signer) = group.signing_key(&mut rng);

        let pre = PreSignature::<Bls12_381>::compute(&mut rng, &key, &mut signer).unwrap();
        assert_eq!(
            pre.T,
            (key.credential.A + key.gpk.h2 * pre.secrets.a).into_affine()
        );
        assert_eq!(pre.secrets.b, pre.secrets.a * key.credential.x);
        assert_ne!(pre.R2, pre.R2_host);

        let base = HashAlg::Sha256.hash_to_curve(b"basename");
        let (T, R2_host, a) = (pre.T, pre.R2_host, pre.secrets.a);
        let rebased = pre.rebase(base, &key, &mut signer).unwrap();
        assert_eq!(rebased.B, base);
        assert_eq!(rebased.T, T);
        assert_eq!(rebased.R2_host, R2_host);
        assert_eq!(rebased.secrets.a, a);
    }

    #[test]
    fn pool_is_fifo_and_bounded() {
        let mut rng = StdRng::seed_from_u64(1u64);
        let group = TestGroup::new(&mut rng, HashAlg::Sha256);
        let (key, mut signer) = group.signing_key(&mut rng);

        let mut pool = PreSignaturePool::<Bls12_381>::new(4);
        assert!(matches!(
            pool.take_one(),
            Err(EpidError::PreSignaturePoolEmpty)
        ));
        assert!(matches!(
            pool.refill(&mut rng, 5, &key, &mut signer),
            Err(EpidError::PoolCapacityExceeded(5, 4))
        ));
        assert_eq!(pool.count(), 0);

        assert_eq!(pool.refill(&mut rng, 2, &key, &mut signer).unwrap(), 2);
        assert_eq!(pool.refill(&mut rng, 4, &key, &mut signer).unwrap(), 2);
        assert_eq!(pool.refill(&mut rng, 3, &key, &mut signer).unwrap(), 0);
        assert_eq!(pool.count(), 4);

        let ids = (0..4)
            .map(|_| pool.take_one().unwrap().state.id())
            .collect::<Vec<_>>();
        let mut sorted = ids.clone();
        sorted.sort();
        assert_eq!(ids, sorted);
        // Every pre-signature was taken exactly once
        sorted.dedup();
        assert_eq!(sorted.len(), 4);
        assert!(pool.is_empty());

        pool.refill(&mut rng, 4, &key, &mut signer).unwrap();
        pool.set_capacity(1);
        assert_eq!(pool.count(), 1);
        assert_eq!(pool.capacity(), 1);
        // The newest one is kept
        assert!(pool.take_one().unwrap().state.id() > ids[3] + 3);
    }

    #[test]
    fn pool_fits_in_signer_window() {
        let mut rng = StdRng::seed_from_u64(2u64);
        let group = TestGroup::new(&mut rng, HashAlg::Sha256);
        let (key, signer) = group.signing_key(&mut rng);
        let mut signer = signer.with_max_pending(6);
        assert_eq!(max_pool_capacity::<Bls12_381, _>(&signer), 4);

        let mut pool = PreSignaturePool::<Bls12_381>::new(10);
        assert!(matches!(
            pool.refill(&mut rng, 5, &key, &mut signer),
            Err(EpidError::PoolCapacityExceeded(5, 4))
        ));
        assert_eq!(pool.count(), 0);
        assert_eq!(pool.refill(&mut rng, 4, &key, &mut signer).unwrap(), 4);

        // A basename and one more commitment on top of a full pool keep every pool state alive
        let base = HashAlg::Sha256.hash_to_curve(b"basename");
        let rebased = pool
            .take_one()
            .unwrap()
            .rebase(base, &key, &mut signer)
            .unwrap();
        let (_, extra) = commit_sign::<Bls12_381, _>(&mut signer, None).unwrap();
        assert_eq!(signer.pending_commitments(), 6);
        signer.respond(rebased.state, &Fr::from(1u64)).unwrap();
        signer.respond(extra, &Fr::from(2u64)).unwrap();
        while let Ok(pre) = pool.take_one() {
            signer.respond(pre.state, &Fr::from(3u64)).unwrap();
        }
    }
}
