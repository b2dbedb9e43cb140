use ark_std::rand::{rngs::StdRng, SeedableRng};
use benches::{random_sig_rl, SIG_RL_SIZES};
use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use epid::prelude::{HashAlg, MemberConfig, VerifierConfig};
use test_utils::issuer::Issuer;

fn pre_signature_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0u64);
    let issuer = Issuer::new(&mut rng, HashAlg::Sha256, 1);
    let mut member = issuer.member(&mut rng, MemberConfig::default());

    let mut group = c.benchmark_group("EPID pre-signatures");
    for count in [1, 4, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, &count| {
            b.iter(|| {
                member.set_pre_signature_capacity(0).unwrap();
                member.set_pre_signature_capacity(count).unwrap();
                member
                    .refill_pre_signatures(&mut rng, black_box(count))
                    .unwrap()
            });
        });
    }
    group.finish();
}

fn sign_verify_benchmark(c: &mut Criterion) {
    let mut rng = StdRng::seed_from_u64(0u64);
    let issuer = Issuer::new(&mut rng, HashAlg::Sha256, 1);
    let mut member = issuer.member(&mut rng, MemberConfig::default());
    let bsn = &b"benchmark basename"[..];
    member.register_basename(bsn).unwrap();
    let message = b"benchmark message";

    let sig_rls = SIG_RL_SIZES
        .iter()
        .map(|s| random_sig_rl(&mut rng, issuer.gpk.gid, *s))
        .collect::<Vec<_>>();

    let mut sign_group = c.benchmark_group("EPID signing");
    for (i, size) in SIG_RL_SIZES.iter().enumerate() {
        sign_group.bench_with_input(BenchmarkId::from_parameter(*size), &i, |b, &i| {
            b.iter(|| {
                member
                    .sign(
                        &mut rng,
                        black_box(message),
                        None,
                        Some(black_box(&sig_rls[i])),
                    )
                    .unwrap()
            });
        });
    }
    sign_group.finish();

    c.bench_function("EPID signing with basename", |b| {
        b.iter(|| {
            member
                .sign(&mut rng, black_box(message), Some(bsn), None)
                .unwrap()
        })
    });

    let mut verify_group = c.benchmark_group("EPID verifying");
    for (i, size) in SIG_RL_SIZES.iter().enumerate() {
        let mut verifier = issuer.verifier(VerifierConfig::default());
        verifier.set_sig_rl(sig_rls[i].clone()).unwrap();
        let sig = member
            .sign(&mut rng, message, None, Some(&sig_rls[i]))
            .unwrap();
        verify_group.bench_with_input(BenchmarkId::from_parameter(*size), &i, |b, _| {
            b.iter(|| verifier.verify(black_box(&sig), black_box(message)).unwrap());
        });
    }
    verify_group.finish();
}

criterion_group!(benches, pre_signature_benchmark, sign_verify_benchmark);
criterion_main!(benches);
