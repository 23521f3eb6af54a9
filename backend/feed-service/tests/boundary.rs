use std::fs;
use std::path::{Path, PathBuf};

fn collect_rs_files(root: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        if let Ok(read_dir) = fs::read_dir(&dir) {
            for entry in read_dir.flatten() {
                let path = entry.path();
                if path.is_dir() {
                    stack.push(path);
                } else if path.extension().map(|e| e == "rs").unwrap_or(false) {
                    files.push(path);
                }
            }
        }
    }
    files
}

/// Searches the non-test part of a source file
fn file_contains(path: &Path, needle: &str) -> bool {
    fs::read_to_string(path)
        .map(|c| {
            let code = c.split("#[cfg(test)]").next().unwrap_or("");
            code.contains(needle)
        })
        .unwrap_or(false)
}

fn offenders(needles: &[&str]) -> Vec<String> {
    let src_root = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src");
    let mut offenders = Vec::new();
    for file in collect_rs_files(&src_root) {
        let path_str = file.to_string_lossy();
        if path_str.contains("/target/") {
            continue;
        }
        if needles.iter().any(|needle| file_contains(&file, needle)) {
            offenders.push(path_str.to_string());
        }
    }
    offenders
}

#[test]
fn feed_service_never_writes_timelines() {
    let offenders = offenders(&[".prepend(", "LPUSH", "LTRIM", "LREM"]);

    if !offenders.is_empty() {
        panic!(
            "Timelines are written by feed-worker only. Offenders: {:?}",
            offenders
        );
    }
}

#[test]
fn feed_service_does_not_consume_events() {
    let offenders = offenders(&["rdkafka", "StreamConsumer", "event_schema"]);

    if !offenders.is_empty() {
        panic!(
            "Feed service must not consume post events directly. Offenders: {:?}",
            offenders
        );
    }
}
