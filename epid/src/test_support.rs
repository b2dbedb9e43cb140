//! Issuer simulation for unit tests. `test_utils::issuer` does the same for the integration tests
//! but can't be used here, it links its own build of this crate and so different types.

use crate::{
    common::{random_nonce, Epid2Params, GroupId, GroupPublicKey, HashAlg},
    credential::{JoinChallenge, JoinRequest, MemberCredential, SigningKey},
    member::{Member, MemberConfig},
    secret_signer::{InProcessSecretSigner, SecretSigner},
};
use ark_bls12_381::{Bls12_381, Fr, G1Affine};
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::Field;
use ark_std::{
    rand::{rngs::StdRng, RngCore, SeedableRng},
    UniformRand,
};
use blake2::Blake2b512;

pub(crate) type TestSigner = InProcessSecretSigner<Bls12_381, StdRng>;

pub(crate) struct TestGroup {
    pub params: Epid2Params<Bls12_381>,
    pub gpk: GroupPublicKey<Bls12_381>,
    gamma: Fr,
}

impl TestGroup {
    pub fn new<R: RngCore>(rng: &mut R, hash_alg: HashAlg) -> Self {
        Self::with_core(rng, hash_alg, 1)
    }

    pub fn with_core<R: RngCore>(rng: &mut R, hash_alg: HashAlg, core: u32) -> Self {
        let params = Epid2Params::<Bls12_381>::new::<Blake2b512>(b"test");
        let gamma = Fr::rand(rng);
        let gpk = GroupPublicKey {
            gid: GroupId::new(hash_alg, core),
            h1: G1Affine::rand(rng),
            h2: G1Affine::rand(rng),
            w: (params.g2 * gamma).into_affine(),
        };
        Self { params, gpk, gamma }
    }

    pub fn issue<R: RngCore>(
        &self,
        rng: &mut R,
        request: &JoinRequest<Bls12_381>,
        challenge: &JoinChallenge,
    ) -> MemberCredential<Bls12_381> {
        request.verify(&self.gpk.h1, challenge).unwrap();
        let x = Fr::rand(rng);
        let A = ((self.params.g1.into_group() + request.F) * (x + self.gamma).inverse().unwrap())
            .into_affine();
        MemberCredential {
            gid: self.gpk.gid,
            A,
            x,
        }
    }

    pub fn challenge<R: RngCore>(&self, rng: &mut R) -> JoinChallenge {
        JoinChallenge {
            gid: self.gpk.gid,
            hash_alg: self.gpk.gid.hash_alg().unwrap(),
            issuer_nonce: random_nonce(rng).unwrap().to_vec(),
        }
    }

    /// Run the join protocol with `signer` and return the issued credential
    pub fn join<R: RngCore, S: SecretSigner<Bls12_381>>(
        &self,
        rng: &mut R,
        signer: &mut S,
    ) -> MemberCredential<Bls12_381> {
        let challenge = self.challenge(rng);
        let request = signer.join(&challenge).unwrap();
        self.issue(rng, &request, &challenge)
    }

    /// In-process signer with a fresh secret
    pub fn new_signer<R: RngCore>(&self, rng: &mut R) -> TestSigner {
        let mut signer = TestSigner::new(StdRng::seed_from_u64(rng.next_u64()), self.gpk.h1);
        signer.generate_secret().unwrap();
        signer
    }

    pub fn signing_key<R: RngCore>(&self, rng: &mut R) -> (SigningKey<Bls12_381>, TestSigner) {
        let mut signer = self.new_signer(rng);
        let credential = self.join(rng, &mut signer);
        let key = SigningKey::new(self.params.clone(), self.gpk.clone(), credential);
        (key, signer)
    }

    pub fn member<R: RngCore>(
        &self,
        rng: &mut R,
        config: MemberConfig,
    ) -> Member<Bls12_381, TestSigner> {
        let mut signer = self.new_signer(rng);
        let credential = self.join(rng, &mut signer);
        Member::provision(
            rng,
            self.params.clone(),
            self.gpk.clone(),
            credential,
            signer,
            config,
        )
        .unwrap()
    }
}
