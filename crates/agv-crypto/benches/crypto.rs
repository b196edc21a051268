use agv_core::FileObject;
use agv_crypto::{checksum, KdfParams, PackageCipher};
use secrecy::SecretString;

// Low-cost KDF so the numbers reflect AES-GCM and hashing, not key stretching
const BENCH_KDF: KdfParams = KdfParams::Pbkdf2Sha256 { iterations: 1_000 };

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_checksum(bencher: divan::Bencher, size: usize) {
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| checksum(divan::black_box(&data)));
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_encrypt_package(bencher: divan::Bencher, size: usize) {
    let cipher = PackageCipher::new(BENCH_KDF);
    let passphrase = SecretString::from("bench-passphrase");
    let file = FileObject::new("bench.pdf", "application/pdf", make_data(size));
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            cipher
                .encrypt(divan::black_box(&file), &passphrase)
                .unwrap()
        });
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_decrypt_package(bencher: divan::Bencher, size: usize) {
    let cipher = PackageCipher::new(BENCH_KDF);
    let passphrase = SecretString::from("bench-passphrase");
    let file = FileObject::new("bench.pdf", "application/pdf", make_data(size));
    let package = cipher.encrypt(&file, &passphrase).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            cipher
                .decrypt(divan::black_box(&package), &passphrase)
                .unwrap()
        });
}

fn main() {
    divan::main();
}
