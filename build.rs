use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::Path;

/// Hash every file under `static/` so asset URLs change whenever their content does.
fn hash_dir(dir: &Path, hasher: &mut DefaultHasher) {
    let Ok(read) = fs::read_dir(dir) else {
        return;
    };
    let mut entries: Vec<_> = read.filter_map(|e| e.ok()).collect();
    entries.sort_by_key(|e| e.file_name());

    for entry in entries {
        let path = entry.path();
        if path.is_dir() {
            hash_dir(&path, hasher);
        } else if let Ok(contents) = fs::read(&path) {
            entry.file_name().to_string_lossy().hash(hasher);
            contents.hash(hasher);
        }
    }
}

fn main() {
    println!("cargo:rerun-if-changed=static/");
    println!("cargo:rerun-if-changed=migrations/");

    let mut hasher = DefaultHasher::new();
    hash_dir(Path::new("static"), &mut hasher);

    let hash = format!("{:016x}", hasher.finish());
    println!("cargo:rustc-env=STATIC_HASH={}", &hash[..8]);
}
