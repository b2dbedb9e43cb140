//! A group member: holds the credential and the host side of signing, and drives a
//! [`SecretSigner`] for everything that involves the member secret.
//!
//! Signing takes `&mut self`, so one member can't be used by two signing operations at once.
//! Wrap it in a lock to share it between threads.

use crate::{
    common::{random_nonce, Epid2Params, GroupId, GroupPublicKey, HashAlg},
    credential::{JoinChallenge, MemberCredential, SigningKey},
    error::EpidError,
    pre_signature::{max_pool_capacity, PreSignature, PreSignaturePool},
    revocation::SigRl,
    secret_signer::{commit_non_revoked, SecretSigner},
    signature::{
        non_revoked_challenge, signature_challenge, BasicSignature, NonRevokedProof, Signature,
    },
};
use ark_ec::pairing::Pairing;
use ark_std::{collections::BTreeSet, end_timer, rand::RngCore, start_timer, vec::Vec};
use serde::{Deserialize, Serialize};

pub const DEFAULT_MAX_BASENAMES: usize = 64;
pub const DEFAULT_PRE_SIGNATURE_CAPACITY: usize = 16;
pub const DEFAULT_MAX_SIG_RL_ENTRIES: usize = 1 << 16;

#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MemberConfig {
    /// Overrides the hash algorithm encoded in the group id
    pub hash_alg: Option<HashAlg>,
    pub max_basenames: usize,
    pub pre_signature_capacity: usize,
    /// Compute a pre-signature while signing when the pool is empty instead of failing
    pub allow_synchronous_pre_signature: bool,
    pub max_sig_rl_entries: usize,
}

impl Default for MemberConfig {
    fn default() -> Self {
        Self {
            hash_alg: None,
            max_basenames: DEFAULT_MAX_BASENAMES,
            pre_signature_capacity: DEFAULT_PRE_SIGNATURE_CAPACITY,
            allow_synchronous_pre_signature: true,
            max_sig_rl_entries: DEFAULT_MAX_SIG_RL_ENTRIES,
        }
    }
}

pub struct Member<E: Pairing, S: SecretSigner<E>> {
    config: MemberConfig,
    hash_alg: HashAlg,
    key: SigningKey<E>,
    signer: S,
    pool: PreSignaturePool<E>,
    basenames: BTreeSet<Vec<u8>>,
}

impl<E: Pairing, S: SecretSigner<E>> Member<E, S> {
    /// Create a member from an issued credential. The credential is checked against the secret held
    /// by `signer`, which reports `F = h1*f` through a join request bound to a fresh nonce.
    pub fn provision<R: RngCore>(
        rng: &mut R,
        params: Epid2Params<E>,
        gpk: GroupPublicKey<E>,
        credential: MemberCredential<E>,
        mut signer: S,
        config: MemberConfig,
    ) -> Result<Self, EpidError> {
        if !params.is_valid() || !gpk.is_valid() {
            return Err(EpidError::InvalidGroupPublicKey);
        }
        if credential.gid != gpk.gid {
            return Err(EpidError::GroupIdMismatch);
        }
        let hash_alg = match config.hash_alg {
            Some(h) => h,
            None => gpk.gid.hash_alg()?,
        };
        let challenge = JoinChallenge {
            gid: gpk.gid,
            hash_alg,
            issuer_nonce: random_nonce(rng)?.to_vec(),
        };
        let request = signer.join(&challenge)?;
        request
            .verify(&gpk.h1, &challenge)
            .map_err(|_| EpidError::InvalidCredential)?;
        credential.verify(&request.F, &params, &gpk)?;
        let limit = max_pool_capacity::<E, _>(&signer);
        if config.pre_signature_capacity > limit {
            return Err(EpidError::PoolCapacityExceeded(
                config.pre_signature_capacity,
                limit,
            ));
        }

        let pool = PreSignaturePool::new(config.pre_signature_capacity);
        Ok(Self {
            hash_alg,
            key: SigningKey::new(params, gpk, credential),
            signer,
            pool,
            basenames: BTreeSet::new(),
            config,
        })
    }

    /// Allow signing with `basename`. Registering a registered basename again has no effect.
    pub fn register_basename(&mut self, basename: &[u8]) -> Result<(), EpidError> {
        if self.basenames.contains(basename) {
            return Ok(());
        }
        if self.basenames.len() >= self.config.max_basenames {
            return Err(EpidError::TooManyBasenames(self.config.max_basenames));
        }
        self.basenames.insert(basename.to_vec());
        Ok(())
    }

    pub fn clear_basenames(&mut self) {
        self.basenames.clear();
    }

    pub fn is_basename_registered(&self, basename: &[u8]) -> bool {
        self.basenames.contains(basename)
    }

    /// Fill the pre-signature pool up to `target`. Returns how many were computed.
    pub fn refill_pre_signatures<R: RngCore>(
        &mut self,
        rng: &mut R,
        target: usize,
    ) -> Result<usize, EpidError> {
        self.pool.refill(rng, target, &self.key, &mut self.signer)
    }

    pub fn pre_signature_count(&self) -> usize {
        self.pool.count()
    }

    /// The capacity can't exceed the number of commitments the secret signer keeps pending, less
    /// the ones needed while signing
    pub fn set_pre_signature_capacity(&mut self, capacity: usize) -> Result<(), EpidError> {
        let limit = max_pool_capacity::<E, _>(&self.signer);
        if capacity > limit {
            return Err(EpidError::PoolCapacityExceeded(capacity, limit));
        }
        self.config.pre_signature_capacity = capacity;
        self.pool.set_capacity(capacity);
        Ok(())
    }

    /// Sign `message`. With a basename, signatures of this member under the same basename are
    /// linkable. With a signature revocation list, the signature proves for each entry that it was
    /// not created by this member. Consumes one pre-signature.
    pub fn sign<R: RngCore>(
        &mut self,
        rng: &mut R,
        message: &[u8],
        basename: Option<&[u8]>,
        sig_rl: Option<&SigRl<E>>,
    ) -> Result<Signature<E>, EpidError> {
        if let Some(bsn) = basename {
            if !self.basenames.contains(bsn) {
                return Err(EpidError::BasenameNotRegistered);
            }
        }
        if let Some(rl) = sig_rl {
            if rl.gid != self.key.gpk.gid {
                return Err(EpidError::GroupIdMismatch);
            }
            if rl.entries.len() > self.config.max_sig_rl_entries {
                return Err(EpidError::RevocationListTooLarge(
                    rl.entries.len(),
                    self.config.max_sig_rl_entries,
                ));
            }
            if !rl.is_valid() {
                return Err(EpidError::InvalidRevocationList);
            }
        }

        let timer = start_timer!(|| "Sign");
        let pre_sig = self.take_pre_signature(rng)?;
        let pre_sig = match basename {
            Some(bsn) => {
                let base = self.hash_alg.hash_to_curve::<E::G1Affine>(bsn);
                pre_sig.rebase(base, &self.key, &mut self.signer)?
            }
            None => pre_sig,
        };

        let c = signature_challenge(
            self.hash_alg,
            &self.key.params,
            &self.key.gpk,
            &pre_sig.B,
            &pre_sig.K,
            &pre_sig.T,
            &pre_sig.R1,
            &pre_sig.R2,
            message,
        )?;
        let x = self.key.credential.x;
        let secrets = &pre_sig.secrets;
        let sx = secrets.rx + c * x;
        let sa = secrets.ra + c * secrets.a;
        let sb = secrets.rb + c * secrets.b;
        let sf = *self.signer.respond(pre_sig.state, &c)?.get_response(0)?;
        let basic = BasicSignature {
            B: pre_sig.B,
            K: pre_sig.K,
            T: pre_sig.T,
            c,
            sx,
            sf,
            sa,
            sb,
        };

        let (sig_rl_version, non_revoked_proofs) = match sig_rl {
            Some(rl) => (rl.version, self.prove_not_revoked(&basic, rl, message)?),
            None => (0, Vec::new()),
        };
        end_timer!(timer);
        Ok(Signature {
            basic,
            sig_rl_version,
            non_revoked_proofs,
        })
    }

    fn take_pre_signature<R: RngCore>(
        &mut self,
        rng: &mut R,
    ) -> Result<PreSignature<E>, EpidError> {
        match self.pool.take_one() {
            Ok(p) => Ok(p),
            Err(_) if self.config.allow_synchronous_pre_signature => {
                PreSignature::compute(rng, &self.key, &mut self.signer)
            }
            Err(_) => Err(EpidError::OutOfPreSignatures),
        }
    }

    fn prove_not_revoked(
        &mut self,
        basic: &BasicSignature<E>,
        rl: &SigRl<E>,
        message: &[u8],
    ) -> Result<Vec<NonRevokedProof<E>>, EpidError> {
        let timer = start_timer!(|| "Non-revoked proofs");
        let mut proofs = Vec::with_capacity(rl.entries.len());
        for entry in &rl.entries {
            let (commitment, state) =
                commit_non_revoked(&mut self.signer, basic.B, basic.K, entry.clone())?;
            let c = non_revoked_challenge(
                self.hash_alg,
                &self.key.params,
                &basic.B,
                &basic.K,
                entry,
                &commitment.T,
                &commitment.R1,
                &commitment.R2,
                message,
            )?;
            let resp = self.signer.respond(state, &c)?;
            proofs.push(NonRevokedProof {
                T: commitment.T,
                c,
                smu: *resp.get_response(0)?,
                snu: *resp.get_response(1)?,
            });
        }
        end_timer!(timer);
        Ok(proofs)
    }

    pub fn group_id(&self) -> GroupId {
        self.key.gpk.gid
    }

    pub fn hash_alg(&self) -> HashAlg {
        self.hash_alg
    }

    pub fn signing_key(&self) -> &SigningKey<E> {
        &self.key
    }

    pub fn signer(&self) -> &S {
        &self.signer
    }

    pub fn signer_mut(&mut self) -> &mut S {
        &mut self.signer
    }
}
