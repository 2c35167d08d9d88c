use burrow_crypto::{ChaChaFactory, Encryptor, EncryptorFactory, KdfParams, NoneEncryptor, RotnFactory};
use burrow_storage::{decode_page, encode_page, LEAF_SPLIT_BYTES};
use burrow_types::SecretKey;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use std::hint::black_box;
use std::sync::Arc;

fn leaf_like_page(len: usize) -> Vec<u8> {
    b"abcdefghij0123456789".iter().copied().cycle().take(len).collect()
}

fn encryptors() -> Vec<(&'static str, Arc<dyn Encryptor>)> {
    let chacha = ChaChaFactory::with_params(KdfParams {
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
    })
    .customize("bench", Some(&SecretKey::new("ABC")))
    .expect("chacha20 instance");
    vec![
        ("none", Arc::new(NoneEncryptor) as Arc<dyn Encryptor>),
        ("rotn", RotnFactory.customize("11", None).expect("rotn instance")),
        ("chacha20", chacha),
    ]
}

fn bench_page_codec(c: &mut Criterion) {
    let mut group = c.benchmark_group("page_codec");

    for page_len in [4096_usize, LEAF_SPLIT_BYTES] {
        let page = leaf_like_page(page_len);
        group.throughput(Throughput::Bytes(page_len as u64));

        for (name, encryptor) in encryptors() {
            let frame = encode_page(&page, encryptor.as_ref()).expect("encode");

            group.bench_with_input(
                BenchmarkId::new(format!("encode_{name}"), page_len),
                &page_len,
                |b, _| {
                    b.iter(|| encode_page(black_box(&page), encryptor.as_ref()).expect("encode"));
                },
            );

            group.bench_with_input(
                BenchmarkId::new(format!("decode_{name}"), page_len),
                &page_len,
                |b, _| {
                    b.iter(|| decode_page(black_box(&frame), encryptor.as_ref()).expect("decode"));
                },
            );
        }
    }

    group.finish();
}

criterion_group!(benches, bench_page_codec);
criterion_main!(benches);
