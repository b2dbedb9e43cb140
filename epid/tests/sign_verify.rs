use ark_bls12_381::Bls12_381;
use ark_ff::PrimeField;
use ark_serialize::{CanonicalDeserialize, CanonicalSerialize};
use ark_std::rand::{prelude::StdRng, Error, RngCore, SeedableRng};
use core::num::NonZeroU32;
use epid::{
    prelude::{
        signatures_linked, BasicSignature, EpidError, GroupPublicKey, HashAlg, JoinRequest, LoopbackTransport,
        Member, MemberConfig, MemberCredential, Rejection, RemoteSecretSigner, SecretSigner,
        Signature, SignerTransport, SigRl, SigRlEntry, VerifierConfig, VerifierPrecomp,
    },
    secret_signer::CommitRequest,
};
use test_utils::{issuer::Issuer, test_serialization, Fr};

/// Random source whose every request fails
struct FailingRng;

impl RngCore for FailingRng {
    fn next_u32(&mut self) -> u32 {
        0
    }

    fn next_u64(&mut self) -> u64 {
        0
    }

    fn fill_bytes(&mut self, dest: &mut [u8]) {
        dest.fill(0)
    }

    fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), Error> {
        Err(Error::from(NonZeroU32::new(Error::CUSTOM_START).unwrap()))
    }
}

#[test]
fn sign_and_verify() {
    let mut rng = StdRng::seed_from_u64(0u64);
    for hash_alg in [
        HashAlg::Sha256,
        HashAlg::Sha384,
        HashAlg::Sha512,
        HashAlg::Sha512_256,
    ] {
        let issuer = Issuer::new(&mut rng, hash_alg, 1);
        let mut member = issuer.member(&mut rng, MemberConfig::default());
        let verifier = issuer.verifier(VerifierConfig::default());
        assert_eq!(member.hash_alg(), hash_alg);
        assert_eq!(verifier.hash_alg(), hash_alg);

        let msg = b"test message";
        let sig = member.sign(&mut rng, msg, None, None).unwrap();
        verifier.verify(&sig, msg).unwrap();
        assert_eq!(
            verifier.verify(&sig, b"test messagf"),
            Err(Rejection::InvalidProof)
        );

        let empty = member.sign(&mut rng, b"", None, None).unwrap();
        verifier.verify(&empty, b"").unwrap();
    }
}

fn flip_low_bit(s: &Fr) -> Fr {
    let mut bigint = s.into_bigint();
    bigint.0[0] ^= 1;
    Fr::from_bigint(bigint).unwrap()
}

#[test]
fn tampered_signature_is_rejected() {
    let mut rng = StdRng::seed_from_u64(1u64);
    let issuer = Issuer::new(&mut rng, HashAlg::Sha256, 1);
    let mut member = issuer.member(&mut rng, MemberConfig::default());
    let verifier = issuer.verifier(VerifierConfig::default());
    let msg = b"test message";
    let sig = member.sign(&mut rng, msg, None, None).unwrap();

    // Flip one bit in every byte of the encoding, walking through the bit positions. A flipped
    // encoding either doesn't decode or doesn't verify.
    let mut bytes = vec![];
    sig.basic.serialize_compressed(&mut bytes).unwrap();
    let mut decoded = 0;
    for i in 0..bytes.len() {
        let mut flipped = bytes.clone();
        flipped[i] ^= 1 << (i % 8);
        if let Ok(basic) = BasicSignature::<Bls12_381>::deserialize_compressed(&flipped[..]) {
            assert_ne!(basic, sig.basic);
            let tampered = Signature {
                basic,
                ..sig.clone()
            };
            assert!(verifier.verify(&tampered, msg).is_err());
            decoded += 1;
        }
    }
    assert!(decoded > 0);

    // Lowest bit of every response and of the challenge
    let tampers: [fn(&mut Signature<Bls12_381>); 6] = [
        |s| s.basic.sx = flip_low_bit(&s.basic.sx),
        |s| s.basic.sf = flip_low_bit(&s.basic.sf),
        |s| s.basic.sa = flip_low_bit(&s.basic.sa),
        |s| s.basic.sb = flip_low_bit(&s.basic.sb),
        |s| s.basic.c = flip_low_bit(&s.basic.c),
        |s| s.basic.K = s.basic.B,
    ];
    for tamper in tampers {
        let mut tampered = sig.clone();
        tamper(&mut tampered);
        assert_eq!(
            verifier.verify(&tampered, msg),
            Err(Rejection::InvalidProof)
        );
    }

    // Signature of another group
    let other = Issuer::new(&mut rng, HashAlg::Sha256, 2);
    let other_verifier = other.verifier(VerifierConfig::default());
    assert_eq!(
        other_verifier.verify(&sig, msg),
        Err(Rejection::InvalidProof)
    );
}

#[test]
fn linkability() {
    let mut rng = StdRng::seed_from_u64(2u64);
    let issuer = Issuer::new(&mut rng, HashAlg::Sha256, 1);
    let mut member_1 = issuer.member(&mut rng, MemberConfig::default());
    let mut member_2 = issuer.member(&mut rng, MemberConfig::default());
    let bsn = &b"service basename"[..];
    member_1.register_basename(bsn).unwrap();
    member_2.register_basename(bsn).unwrap();
    let verifier = issuer.verifier(VerifierConfig {
        basename: Some(bsn.to_vec()),
        ..VerifierConfig::default()
    });

    // Without a basename no revealed value repeats between two signatures of one member
    let sig_1 = member_1.sign(&mut rng, b"msg", None, None).unwrap();
    let sig_2 = member_1.sign(&mut rng, b"msg", None, None).unwrap();
    assert_fresh(&sig_1, &sig_2);
    assert_ne!(sig_1.basic.B, sig_2.basic.B);
    assert_ne!(sig_1.basic.K, sig_2.basic.K);
    assert!(!signatures_linked(&sig_1, &sig_2));

    let sig_1 = member_1.sign(&mut rng, b"msg 1", Some(bsn), None).unwrap();
    let sig_2 = member_1.sign(&mut rng, b"msg 2", Some(bsn), None).unwrap();
    let sig_3 = member_2.sign(&mut rng, b"msg 1", Some(bsn), None).unwrap();
    verifier.verify(&sig_1, b"msg 1").unwrap();
    verifier.verify(&sig_2, b"msg 2").unwrap();
    verifier.verify(&sig_3, b"msg 1").unwrap();
    assert!(signatures_linked(&sig_1, &sig_2));
    assert!(!signatures_linked(&sig_1, &sig_3));
    assert_eq!(sig_1.basic.B, sig_3.basic.B);
    // Linked signatures only share B and K
    assert_eq!(sig_1.basic.K, sig_2.basic.K);
    assert_fresh(&sig_1, &sig_2);
    assert_fresh(&sig_1, &sig_3);
}

/// Every revealed value other than the base `B` and the pseudonym `K` differs
fn assert_fresh(sig_1: &Signature<Bls12_381>, sig_2: &Signature<Bls12_381>) {
    let (a, b) = (&sig_1.basic, &sig_2.basic);
    assert_ne!(a.T, b.T);
    assert_ne!(a.c, b.c);
    assert_ne!(a.sx, b.sx);
    assert_ne!(a.sf, b.sf);
    assert_ne!(a.sa, b.sa);
    assert_ne!(a.sb, b.sb);
}

#[test]
fn pre_signatures_are_used_once() {
    let mut rng = StdRng::seed_from_u64(3u64);
    let issuer = Issuer::new(&mut rng, HashAlg::Sha256, 1);
    let mut member = issuer.member(
        &mut rng,
        MemberConfig {
            allow_synchronous_pre_signature: false,
            ..MemberConfig::default()
        },
    );
    let verifier = issuer.verifier(VerifierConfig::default());

    assert_eq!(member.refill_pre_signatures(&mut rng, 4).unwrap(), 4);
    assert_eq!(member.signer().pending_commitments(), 4);
    let mut sigs = vec![];
    for i in 0..4 {
        let msg = [i as u8];
        let sig = member.sign(&mut rng, &msg, None, None).unwrap();
        verifier.verify(&sig, &msg).unwrap();
        sigs.push(sig);
    }
    assert!(matches!(
        member.sign(&mut rng, b"fifth", None, None),
        Err(EpidError::OutOfPreSignatures)
    ));
    assert_eq!(member.pre_signature_count(), 0);
    assert_eq!(member.signer().pending_commitments(), 0);
    for i in 0..4 {
        for j in i + 1..4 {
            assert_ne!(sigs[i].basic.B, sigs[j].basic.B);
            assert_ne!(sigs[i].basic.T, sigs[j].basic.T);
        }
    }

    // With synchronous computation allowed the pool is only a speedup
    let mut member = issuer.member(&mut rng, MemberConfig::default());
    assert_eq!(member.pre_signature_count(), 0);
    let sig = member.sign(&mut rng, b"msg", None, None).unwrap();
    verifier.verify(&sig, b"msg").unwrap();
}

#[test]
fn entropy_failure_is_reported() {
    let mut rng = StdRng::seed_from_u64(4u64);
    let issuer = Issuer::new(&mut rng, HashAlg::Sha256, 1);
    let mut member = issuer.member(&mut rng, MemberConfig::default());

    assert!(matches!(
        member.sign(&mut FailingRng, b"msg", None, None),
        Err(EpidError::InsufficientEntropy)
    ));
    assert!(matches!(
        member.refill_pre_signatures(&mut FailingRng, 2),
        Err(EpidError::InsufficientEntropy)
    ));
    assert_eq!(member.pre_signature_count(), 0);

    // A secret signer with a failing random source can't commit
    let mut signer = epid::prelude::InProcessSecretSigner::<Bls12_381, _>::new(
        FailingRng,
        issuer.gpk.h1,
    );
    assert!(matches!(
        signer.generate_secret(),
        Err(EpidError::InsufficientEntropy)
    ));
    assert!(matches!(
        signer.commit(CommitRequest::Sign { base: None }),
        Err(EpidError::SecretUnavailable)
    ));

    member.sign(&mut rng, b"msg", None, None).unwrap();
}

/// Transport that drops every request
struct BrokenTransport;

impl SignerTransport for BrokenTransport {
    fn exchange(&mut self, _request: &[u8]) -> Result<Vec<u8>, EpidError> {
        Err(EpidError::Transport(0))
    }
}

#[test]
fn remote_secret_signer() {
    let mut rng = StdRng::seed_from_u64(5u64);
    let issuer = Issuer::new(&mut rng, HashAlg::Sha256, 1);
    let secret = epid::prelude::MemberSecret::<Fr>::new(&mut rng).unwrap();
    let local = issuer.signer(&mut rng, secret);
    let mut remote = RemoteSecretSigner::<Bls12_381, _>::new(LoopbackTransport::new(local));
    let credential = issuer.join(&mut rng, &mut remote);

    let mut sig_rl_source = issuer.member(&mut rng, MemberConfig::default());
    let revoked = sig_rl_source.sign(&mut rng, b"m", None, None).unwrap();
    let sig_rl = SigRl {
        gid: issuer.gpk.gid,
        version: 1,
        entries: vec![SigRlEntry::from(&revoked.basic)],
    };

    let mut member = Member::provision(
        &mut rng,
        issuer.params.clone(),
        issuer.gpk.clone(),
        credential,
        remote,
        MemberConfig::default(),
    )
    .unwrap();
    let bsn = &b"bsn"[..];
    member.register_basename(bsn).unwrap();
    member.refill_pre_signatures(&mut rng, 2).unwrap();

    let mut verifier = issuer.verifier(VerifierConfig::default());
    verifier.set_sig_rl(sig_rl.clone()).unwrap();
    let sig = member.sign(&mut rng, b"msg", None, Some(&sig_rl)).unwrap();
    verifier.verify(&sig, b"msg").unwrap();
    let sig = member.sign(&mut rng, b"msg", Some(bsn), Some(&sig_rl)).unwrap();
    verifier.verify(&sig, b"msg").unwrap();

    let mut broken = RemoteSecretSigner::<Bls12_381, _>::new(BrokenTransport);
    assert!(matches!(
        broken.commit(CommitRequest::Sign { base: None }),
        Err(EpidError::Transport(0))
    ));
    assert!(matches!(
        broken.join(&issuer.challenge(&mut rng)),
        Err(EpidError::Transport(0))
    ));
}

#[test]
fn serialization() {
    let mut rng = StdRng::seed_from_u64(6u64);
    let issuer = Issuer::new(&mut rng, HashAlg::Sha384, 1);
    let mut member = issuer.member(&mut rng, MemberConfig::default());
    let mut revoked = issuer.member(&mut rng, MemberConfig::default());
    let verifier = issuer.verifier(VerifierConfig::default());

    let gpk = issuer.gpk.clone();
    test_serialization!(GroupPublicKey<Bls12_381>, gpk);

    let precomp = verifier.precomp().clone();
    test_serialization!(VerifierPrecomp<Bls12_381>, precomp);

    let credential = member.signing_key().credential.clone();
    test_serialization!(MemberCredential<Bls12_381>, credential);

    let challenge = issuer.challenge(&mut rng);
    let request = member.signer_mut().join(&challenge).unwrap();
    test_serialization!(JoinRequest<Bls12_381>, request);

    let revoked_sig = revoked.sign(&mut rng, b"m", None, None).unwrap();
    let sig_rl = SigRl {
        gid: issuer.gpk.gid,
        version: 2,
        entries: vec![SigRlEntry::from(&revoked_sig.basic)],
    };
    test_serialization!(SigRl<Bls12_381>, sig_rl);

    let sig = member.sign(&mut rng, b"msg", None, Some(&sig_rl)).unwrap();
    test_serialization!(Signature<Bls12_381>, sig);

    let config = MemberConfig {
        hash_alg: Some(HashAlg::Sha512),
        ..MemberConfig::default()
    };
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(serde_json::from_str::<MemberConfig>(&json).unwrap(), config);
}

#[test]
fn hash_alg_override() {
    let mut rng = StdRng::seed_from_u64(7u64);
    let issuer = Issuer::new(&mut rng, HashAlg::Sha256, 1);
    let mut member = issuer.member(
        &mut rng,
        MemberConfig {
            hash_alg: Some(HashAlg::Sha512),
            ..MemberConfig::default()
        },
    );
    let sig = member.sign(&mut rng, b"msg", None, None).unwrap();

    let verifier = issuer.verifier(VerifierConfig::default());
    assert_eq!(verifier.verify(&sig, b"msg"), Err(Rejection::InvalidProof));
    let verifier = issuer.verifier(VerifierConfig {
        hash_alg: Some(HashAlg::Sha512),
        ..VerifierConfig::default()
    });
    verifier.verify(&sig, b"msg").unwrap();
}
