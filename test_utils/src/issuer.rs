use crate::{Fr, G1};
use ark_bls12_381::Bls12_381;
use ark_ec::{AffineRepr, CurveGroup};
use ark_ff::Field;
use ark_std::{
    rand::{rngs::StdRng, RngCore, SeedableRng},
    UniformRand,
};
use blake2::Blake2b512;
use epid::prelude::{
    Epid2Params, EpidError, GroupId, GroupPublicKey, HashAlg, InProcessSecretSigner,
    JoinChallenge, JoinRequest, Member, MemberConfig, MemberCredential, MemberSecret,
    SecretSigner, Verifier, VerifierConfig,
};

pub type TestSigner = InProcessSecretSigner<Bls12_381, StdRng>;
pub type TestMember = Member<Bls12_381, TestSigner>;

/// Issuer of a single group, holding `gamma`
pub struct Issuer {
    pub params: Epid2Params<Bls12_381>,
    pub gpk: GroupPublicKey<Bls12_381>,
    gamma: Fr,
}

impl Issuer {
    pub fn new<R: RngCore>(rng: &mut R, hash_alg: HashAlg, core: u32) -> Self {
        let params = Epid2Params::<Bls12_381>::new::<Blake2b512>(b"test");
        let gamma = Fr::rand(rng);
        let gpk = GroupPublicKey {
            gid: GroupId::new(hash_alg, core),
            h1: G1::rand(rng),
            h2: G1::rand(rng),
            w: (params.g2 * gamma).into_affine(),
        };
        Self { params, gpk, gamma }
    }

    pub fn challenge<R: RngCore>(&self, rng: &mut R) -> JoinChallenge {
        let mut issuer_nonce = vec![0; 32];
        rng.fill_bytes(&mut issuer_nonce);
        JoinChallenge {
            gid: self.gpk.gid,
            hash_alg: self.gpk.gid.hash_alg().unwrap(),
            issuer_nonce,
        }
    }

    /// Check the join request and create a credential `A = (g1 + F)/(x + gamma)` for it
    pub fn issue<R: RngCore>(
        &self,
        rng: &mut R,
        request: &JoinRequest<Bls12_381>,
        challenge: &JoinChallenge,
    ) -> Result<MemberCredential<Bls12_381>, EpidError> {
        request.verify(&self.gpk.h1, challenge)?;
        let x = Fr::rand(rng);
        let A = ((self.params.g1.into_group() + request.F) * (x + self.gamma).inverse().unwrap())
            .into_affine();
        Ok(MemberCredential {
            gid: self.gpk.gid,
            A,
            x,
        })
    }

    pub fn join<R: RngCore, S: SecretSigner<Bls12_381>>(
        &self,
        rng: &mut R,
        signer: &mut S,
    ) -> MemberCredential<Bls12_381> {
        let challenge = self.challenge(rng);
        let request = signer.join(&challenge).unwrap();
        self.issue(rng, &request, &challenge).unwrap()
    }

    /// In-process signer holding `secret`
    pub fn signer<R: RngCore>(&self, rng: &mut R, secret: MemberSecret<Fr>) -> TestSigner {
        TestSigner::with_secret(StdRng::seed_from_u64(rng.next_u64()), self.gpk.h1, secret)
    }

    /// Join a new member and also return its secret `f`, as if it leaked
    pub fn member_with_secret<R: RngCore>(
        &self,
        rng: &mut R,
        config: MemberConfig,
    ) -> (TestMember, Fr) {
        let secret = MemberSecret::<Fr>::new(rng).unwrap();
        let f = secret.0;
        let mut signer = self.signer(rng, secret);
        let credential = self.join(rng, &mut signer);
        let member = Member::provision(
            rng,
            self.params.clone(),
            self.gpk.clone(),
            credential,
            signer,
            config,
        )
        .unwrap();
        (member, f)
    }

    pub fn member<R: RngCore>(&self, rng: &mut R, config: MemberConfig) -> TestMember {
        self.member_with_secret(rng, config).0
    }

    pub fn verifier(&self, config: VerifierConfig) -> Verifier<Bls12_381> {
        Verifier::new(self.params.clone(), self.gpk.clone(), None, config).unwrap()
    }
}
