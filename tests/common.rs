#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::{env, fs};

use native_codecs::native::{self, LoaderConfig, Platform, LIBRARY_DIR_ENV};
use native_codecs::{Algorithm, NativeError};
use rand::rngs::StdRng;
use rand::{Rng as _, SeedableRng as _};

const SYSTEM_LIBRARY_DIRS: &[&str] = &[
    "/usr/lib/x86_64-linux-gnu",
    "/usr/lib/aarch64-linux-gnu",
    "/lib/x86_64-linux-gnu",
    "/lib/aarch64-linux-gnu",
    "/usr/lib64",
    "/usr/lib",
    "/usr/local/lib",
    "/opt/homebrew/lib",
];

/// File names a system install of `name` may use, most specific first.
fn system_file_names(name: &str) -> Vec<String> {
    vec![
        format!("lib{name}.so.1"),
        format!("lib{name}.so"),
        format!("lib{name}.1.dylib"),
        format!("lib{name}.dylib"),
    ]
}

fn find_system_library(name: &str) -> Option<PathBuf> {
    SYSTEM_LIBRARY_DIRS.iter().find_map(|dir| {
        system_file_names(name)
            .into_iter()
            .map(|file| Path::new(dir).join(file))
            .find(|path| path.is_file())
    })
}

/// Copies every codec library found on the system into a resource root laid
/// out the way the loader expects.
fn stage_system_libraries() -> PathBuf {
    let root = env::temp_dir().join(format!("native-codecs-tests-{}", std::process::id()));
    let platform = Platform::current();
    for &algorithm in Algorithm::ALL {
        let name = algorithm.library_name();
        let Some(source) = find_system_library(name) else {
            continue;
        };
        let target = LoaderConfig::new(&root).resource_path(name);
        fs::create_dir_all(target.parent().unwrap()).unwrap();
        // `fs::copy` follows the versioned symlinks to the real object
        fs::copy(&source, &target).unwrap();
        log::info!("staged {} for {platform} from {}", name, source.display());
    }
    root
}

/// Points the loader at the staged libraries. Safe to call from every test.
pub fn init() -> &'static Path {
    static ROOT: OnceLock<PathBuf> = OnceLock::new();
    ROOT.get_or_init(|| {
        let _ = env_logger::builder().is_test(true).try_init();
        let root = match env::var_os(LIBRARY_DIR_ENV) {
            Some(dir) => PathBuf::from(dir),
            None => stage_system_libraries(),
        };
        let _ = native::configure(LoaderConfig::new(&root));
        root
    })
}

/// True when the libraries come from an explicit `NATIVE_CODECS_LIBRARY_DIR`
/// rather than whatever the system happens to have installed.
pub fn libraries_required() -> bool {
    env::var_os(LIBRARY_DIR_ENV).is_some()
}

/// Skips a missing codec on a bare system, fails when it was asked for.
fn report_unavailable(algorithm: Algorithm, error: &NativeError) {
    assert!(
        !libraries_required(),
        "{algorithm} is missing from {LIBRARY_DIR_ENV}: {error}"
    );
    eprintln!("skipping {algorithm}: {error}");
}

/// Enabled algorithms whose native library could be loaded.
pub fn available_algorithms() -> Vec<Algorithm> {
    init();
    Algorithm::ALL
        .iter()
        .copied()
        .filter(|&algorithm| match algorithm.verify_available() {
            Ok(()) => true,
            Err(e) => {
                report_unavailable(algorithm, &e);
                false
            }
        })
        .collect()
}

/// Runs `test` only if `algorithm` is usable on this machine.
pub fn with_algorithm(algorithm: Algorithm, test: impl FnOnce()) {
    init();
    match algorithm.verify_available() {
        Ok(()) => test(),
        Err(e) => report_unavailable(algorithm, &e),
    }
}

pub fn test_input_sizes() -> Vec<usize> {
    vec![0, 1, 15, 256, 4096, 65536, 1 << 20]
}

pub fn random_bytes(n: usize, seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut data = vec![0u8; n];
    rng.fill(&mut data[..]);
    data
}

pub fn get_test_cases(n: usize) -> Vec<Vec<u8>> {
    let mut rng = StdRng::seed_from_u64(14);

    vec![
        // Zeroes
        vec![0u8; n],
        // Same non-zero
        vec![0x41u8; n],
        // Repeating text
        b"the quick brown fox jumps over the lazy dog. "
            .iter()
            .copied()
            .cycle()
            .take(n)
            .collect(),
        // Ascending bytes
        (0..n).map(|i| i as u8).collect(),
        // Small alphabet
        (0..n).map(|_| rng.random_range(b'a'..=b'd')).collect(),
        // Random bytes
        random_bytes(n, 42),
        // Random run lengths
        {
            let mut data = Vec::with_capacity(n);
            while data.len() < n {
                let byte: u8 = rng.random();
                let run = rng.random_range(1..64).min(n - data.len());
                data.extend(std::iter::repeat_n(byte, run));
            }
            data
        },
    ]
}
