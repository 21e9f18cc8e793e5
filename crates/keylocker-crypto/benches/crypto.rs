use keylocker_crypto::{decrypt, encrypt, VaultKey};

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[divan::bench(args = [256, 4096, 65536])]
fn bench_encrypt(bencher: divan::Bencher, size: usize) {
    let key = VaultKey::from_bytes([0xABu8; 32]);
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| encrypt(divan::black_box(&key), divan::black_box(&data)).unwrap());
}

#[divan::bench(args = [256, 4096, 65536])]
fn bench_decrypt(bencher: divan::Bencher, size: usize) {
    let key = VaultKey::from_bytes([0xABu8; 32]);
    let data = make_data(size);
    let encrypted = encrypt(&key, &data).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| decrypt(divan::black_box(&key), divan::black_box(&encrypted)).unwrap());
}

fn main() {
    divan::main();
}
