// tests/change_filter.rs

use std::path::{Path, PathBuf};

use assetwatch::fs::FileSystem;
use assetwatch::fs::mock::MockFileSystem;
use assetwatch::pipeline::change_filter::{ChangeFilter, should_process};
use assetwatch::pipeline::fingerprint::{Observed, file_hash_or_missing, hash_bytes};
use assetwatch::pipeline::record::Dependency;
use assetwatch::pipeline::sources::expand_glob;
use assetwatch::pipeline::state::{FilterEntry, MemoryFilterStore};
use assetwatch::types::CompareMode;

fn p(s: &str) -> PathBuf {
    PathBuf::from(s)
}

fn filter() -> ChangeFilter {
    ChangeFilter::new(Box::new(MemoryFilterStore::new()))
}

/// Every dependency file as it is now, as if the stages had just read it.
fn observe_now(fs: &MockFileSystem, deps: &[Dependency]) -> Observed {
    let mut observed = Observed::new();
    for dep in deps {
        match dep {
            Dependency::File(path) => {
                observed.insert(path.clone(), file_hash_or_missing(fs, path));
            }
            Dependency::Glob { base, pattern } => {
                for path in expand_glob(fs, base, pattern).unwrap() {
                    let hash = file_hash_or_missing(fs, &path);
                    observed.insert(path, hash);
                }
            }
        }
    }
    observed
}

fn record(
    f: &mut ChangeFilter,
    fs: &MockFileSystem,
    src: &Path,
    dst: &Path,
    source_bytes: &[u8],
    deps: &[Dependency],
) {
    let observed = observe_now(fs, deps);
    let entry = FilterEntry::capture(fs, dst, source_bytes, deps, &observed).unwrap();
    f.record(src, dst, entry);
}

#[test]
fn missing_target_is_always_processed() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/a.html", "a");

    for mode in [CompareMode::Mtime, CompareMode::Content] {
        assert!(should_process(&fs, &p("/proj/src/a.html"), &p("/proj/build/a.html"), mode).unwrap());
    }
}

#[test]
fn mtime_mode_processes_only_newer_sources() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/a.css", "body {}");
    fs.add_file("/proj/build/a.css", "body {}");

    let (src, dst) = (p("/proj/src/a.css"), p("/proj/build/a.css"));
    assert!(!should_process(&fs, &src, &dst, CompareMode::Mtime).unwrap());

    // Saved again after the target was written.
    fs.add_file("/proj/src/a.css", "body {}");
    assert!(should_process(&fs, &src, &dst, CompareMode::Mtime).unwrap());
}

#[test]
fn equal_mtimes_are_up_to_date() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/a.css", "x");
    fs.add_file("/proj/build/a.css", "x");
    let at = fs.modified(&p("/proj/build/a.css")).unwrap();
    fs.set_modified("/proj/src/a.css", at);

    assert!(!should_process(&fs, &p("/proj/src/a.css"), &p("/proj/build/a.css"), CompareMode::Mtime).unwrap());
}

#[test]
fn content_mode_compares_bytes_not_times() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/build/a.html", "<p>same</p>");
    // Source written later, identical bytes.
    fs.add_file("/proj/src/a.html", "<p>same</p>");

    let (src, dst) = (p("/proj/src/a.html"), p("/proj/build/a.html"));
    assert!(!should_process(&fs, &src, &dst, CompareMode::Content).unwrap());

    fs.add_file("/proj/src/a.html", "<p>changed</p>");
    assert!(should_process(&fs, &src, &dst, CompareMode::Content).unwrap());
}

#[test]
fn checking_never_writes() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/a.html", "a");
    fs.add_file("/proj/build/a.html", "b");

    let f = filter();
    f.check(&fs, &p("/proj/src/a.html"), &p("/proj/build/a.html"), CompareMode::Content)
        .unwrap();
    should_process(&fs, &p("/proj/src/a.html"), &p("/proj/build/a.html"), CompareMode::Mtime).unwrap();

    assert!(fs.writes().is_empty());
}

#[test]
fn recorded_pair_is_skipped_until_a_dependency_changes() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/index.html", "@@include('blocks/nav.html')");
    fs.add_file("/proj/src/blocks/nav.html", "<nav></nav>");
    fs.write(&p("/proj/build/index.html"), b"<nav></nav>").unwrap();

    let (src, dst) = (p("/proj/src/index.html"), p("/proj/build/index.html"));
    let deps = vec![Dependency::File(p("/proj/src/blocks/nav.html"))];

    let mut f = filter();
    // Output differs from the source, so without state content mode rebuilds.
    assert!(f.check(&fs, &src, &dst, CompareMode::Content).unwrap());

    let source_bytes = fs.read(&src).unwrap();
    record(&mut f, &fs, &src, &dst, &source_bytes, &deps);
    assert!(!f.check(&fs, &src, &dst, CompareMode::Content).unwrap());

    fs.add_file("/proj/src/blocks/nav.html", "<nav>new</nav>");
    assert!(f.check(&fs, &src, &dst, CompareMode::Content).unwrap());
}

#[test]
fn deleted_dependency_invalidates_the_output() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/main.scss", "@import 'vars';");
    fs.add_file("/proj/src/_vars.scss", "$a: 1;");
    fs.write(&p("/proj/build/main.css"), b"").unwrap();

    let (src, dst) = (p("/proj/src/main.scss"), p("/proj/build/main.css"));
    let mut f = filter();
    record(&mut f, &fs, &src, &dst, &fs.read(&src).unwrap(), &[Dependency::File(p("/proj/src/_vars.scss"))]);
    assert!(!f.check(&fs, &src, &dst, CompareMode::Mtime).unwrap());

    fs.remove_file("/proj/src/_vars.scss");
    assert!(f.check(&fs, &src, &dst, CompareMode::Mtime).unwrap());
}

#[test]
fn new_file_matching_a_glob_dependency_invalidates_the_output() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/scss/main.scss", "@import \"blocks/*.scss\";");
    fs.add_file("/proj/src/scss/blocks/_a.scss", ".a {}");
    fs.write(&p("/proj/build/css/main.css"), b".a {}").unwrap();

    let (src, dst) = (p("/proj/src/scss/main.scss"), p("/proj/build/css/main.css"));
    let deps = vec![Dependency::Glob {
        base: p("/proj/src/scss"),
        pattern: "blocks/*.scss".to_string(),
    }];

    let mut f = filter();
    record(&mut f, &fs, &src, &dst, &fs.read(&src).unwrap(), &deps);
    assert!(!f.check(&fs, &src, &dst, CompareMode::Mtime).unwrap());

    fs.add_file("/proj/src/scss/blocks/_b.scss", ".b {}");
    assert!(f.check(&fs, &src, &dst, CompareMode::Mtime).unwrap());
}

#[test]
fn target_touched_outside_the_pipeline_is_rebuilt() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/a.js", "let a;");
    fs.write(&p("/proj/build/a.js"), b"let a;").unwrap();

    let (src, dst) = (p("/proj/src/a.js"), p("/proj/build/a.js"));
    let mut f = filter();
    record(&mut f, &fs, &src, &dst, b"let a;", &[]);
    assert!(!f.check(&fs, &src, &dst, CompareMode::Mtime).unwrap());

    fs.add_file("/proj/build/a.js", "hand edited");
    assert!(f.check(&fs, &src, &dst, CompareMode::Mtime).unwrap());
}

#[test]
fn forgotten_pair_falls_back_to_plain_comparison() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/a.html", "<p>a</p>");
    fs.write(&p("/proj/build/a.html"), b"<p>expanded</p>").unwrap();

    let (src, dst) = (p("/proj/src/a.html"), p("/proj/build/a.html"));
    let mut f = filter();
    record(&mut f, &fs, &src, &dst, b"<p>a</p>", &[]);
    assert!(!f.check(&fs, &src, &dst, CompareMode::Content).unwrap());

    f.forget(&src, &dst);
    assert!(f.check(&fs, &src, &dst, CompareMode::Content).unwrap());
}

#[test]
fn dependency_edited_after_it_was_read_keeps_the_output_stale() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/index.html", "@@include('nav.html')");
    fs.add_file("/proj/src/nav.html", "<nav>old</nav>");
    let (src, dst) = (p("/proj/src/index.html"), p("/proj/build/index.html"));
    let deps = vec![Dependency::File(p("/proj/src/nav.html"))];

    // The stage read the partial, then it was saved again before the write.
    let observed = observe_now(&fs, &deps);
    fs.add_file("/proj/src/nav.html", "<nav>new</nav>");
    fs.write(&dst, b"<nav>old</nav>").unwrap();

    let mut f = filter();
    let entry = FilterEntry::capture(&fs, &dst, &fs.read(&src).unwrap(), &deps, &observed).unwrap();
    f.record(&src, &dst, entry);

    assert!(f.check(&fs, &src, &dst, CompareMode::Content).unwrap());
}

#[test]
fn glob_match_added_during_a_run_keeps_the_output_stale() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/scss/main.scss", "@import \"blocks/*.scss\";");
    fs.add_file("/proj/src/scss/blocks/_a.scss", ".a {}");
    let (src, dst) = (p("/proj/src/scss/main.scss"), p("/proj/build/css/main.css"));
    let deps = vec![Dependency::Glob {
        base: p("/proj/src/scss"),
        pattern: "blocks/*.scss".to_string(),
    }];

    let observed = observe_now(&fs, &deps);
    fs.add_file("/proj/src/scss/blocks/_b.scss", ".b {}");
    fs.write(&dst, b".a {}").unwrap();

    let mut f = filter();
    let entry = FilterEntry::capture(&fs, &dst, &fs.read(&src).unwrap(), &deps, &observed).unwrap();
    f.record(&src, &dst, entry);

    assert!(f.check(&fs, &src, &dst, CompareMode::Mtime).unwrap());
}

#[test]
fn unobserved_file_dependency_uses_its_current_contents() {
    let fs = MockFileSystem::new();
    fs.add_file("/proj/src/a.js", "main");
    fs.add_file("/proj/src/lib.js", "lib");
    fs.write(&p("/proj/build/a.js"), b"mainlib").unwrap();
    let (src, dst) = (p("/proj/src/a.js"), p("/proj/build/a.js"));
    let deps = vec![Dependency::File(p("/proj/src/lib.js"))];

    let mut f = filter();
    let entry = FilterEntry::capture(&fs, &dst, b"main", &deps, &Observed::new()).unwrap();
    f.record(&src, &dst, entry);
    assert!(!f.check(&fs, &src, &dst, CompareMode::Mtime).unwrap());

    let mut stale = Observed::new();
    stale.insert(p("/proj/src/lib.js"), hash_bytes(b"older lib"));
    let entry = FilterEntry::capture(&fs, &dst, b"main", &deps, &stale).unwrap();
    f.record(&src, &dst, entry);
    assert!(f.check(&fs, &src, &dst, CompareMode::Mtime).unwrap());
}
