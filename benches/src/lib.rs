use ark_bls12_381::Bls12_381;
use ark_std::{rand::RngCore, UniformRand};
use epid::prelude::{GroupId, SigRl, SigRlEntry};
use test_utils::G1;

/// Signature revocation list sizes to benchmark with
pub const SIG_RL_SIZES: [usize; 4] = [0, 10, 50, 100];

/// Signature revocation list with `size` entries of unknown signers
pub fn random_sig_rl<R: RngCore>(rng: &mut R, gid: GroupId, size: usize) -> SigRl<Bls12_381> {
    SigRl {
        gid,
        version: 1,
        entries: (0..size)
            .map(|_| SigRlEntry {
                B: G1::rand(rng),
                K: G1::rand(rng),
            })
            .collect(),
    }
}
