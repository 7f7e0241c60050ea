// tests/task_pipeline.rs

use std::path::PathBuf;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use assetwatch::errors::AssetwatchError;
use assetwatch::fs::mock::MockFileSystem;
use assetwatch::fs::{FileSystem, RealFileSystem};
use assetwatch::pipeline::change_filter::ChangeFilter;
use assetwatch::pipeline::record::FileRecord;
use assetwatch::pipeline::sources::SourceSet;
use assetwatch::pipeline::stage::{Stage, StageContext, StageFuture};
use assetwatch::pipeline::stages::{CommandStage, IncludeBase, IncludeStage, RenameStage};
use assetwatch::pipeline::state::{FileFilterStore, MemoryFilterStore, STATE_FILE_PATH};
use assetwatch::pipeline::task::{CleanTask, PipelineTask, Task, TaskContext};
use assetwatch::types::CompareMode;
use assetwatch_test_utils::builders::MockProject;
use assetwatch_test_utils::init_tracing;
use assetwatch_test_utils::sink::RecordingSink;

fn copy_task(pattern: &str, dest: &str) -> PipelineTask {
    let sources = SourceSet::new(&[pattern.to_string()], &[]).unwrap();
    PipelineTask::new("images:dev", sources, dest, Vec::new())
}

fn images() -> MockProject {
    MockProject::new()
        .file("src/img/logo.svg", "<svg/>")
        .file("src/img/icons/a.png", "png-a")
        .file("src/img/icons/b.png", "png-b")
}

#[tokio::test]
async fn copy_only_task_mirrors_the_source_tree() {
    init_tracing();
    let project = images();
    let ctx = project.context();

    let report = copy_task("src/img/**/*", "build/img").run(&ctx).await.unwrap();

    assert_eq!(report.matched, 3);
    assert_eq!(report.processed, 3);
    assert_eq!(
        report.written,
        vec![
            project.path("build/img/icons/a.png"),
            project.path("build/img/icons/b.png"),
            project.path("build/img/logo.svg"),
        ]
    );
    assert_eq!(project.read("build/img/icons/a.png"), "png-a");
}

#[tokio::test]
async fn rerun_without_changes_is_a_no_op() {
    let project = images();
    let ctx = project.context();
    let task = copy_task("src/img/**/*", "build/img");

    task.run(&ctx).await.unwrap();
    project.fs.clear_writes();
    let report = task.run(&ctx).await.unwrap();

    assert_eq!(report.skipped, 3);
    assert_eq!(report.processed, 0);
    assert!(report.written.is_empty());
    assert!(project.fs.writes().is_empty());
}

#[tokio::test]
async fn only_the_touched_source_is_rewritten() {
    let project = images();
    let ctx = project.context();
    let task = copy_task("src/img/**/*", "build/img");
    task.run(&ctx).await.unwrap();
    project.fs.clear_writes();

    project.write("src/img/icons/b.png", "png-b2");
    let report = task.run(&ctx).await.unwrap();

    assert_eq!(report.processed, 1);
    assert_eq!(project.fs.writes(), vec![project.path("build/img/icons/b.png")]);
    assert_eq!(project.read("build/img/icons/b.png"), "png-b2");
}

#[tokio::test]
async fn deleted_sources_leave_their_outputs_in_place() {
    let project = images();
    let ctx = project.context();
    let task = copy_task("src/img/**/*", "build/img");
    task.run(&ctx).await.unwrap();

    project.fs.remove_file(project.path("src/img/logo.svg"));
    let report = task.run(&ctx).await.unwrap();

    assert_eq!(report.matched, 2);
    assert!(project.exists("build/img/logo.svg"));
}

#[tokio::test]
async fn pre_existing_newer_targets_are_skipped_without_state() {
    let project = MockProject::new()
        .file("src/fonts/a.woff2", "font")
        .file("build/fonts/a.woff2", "font");
    let ctx = project.context();

    let report = copy_task("src/fonts/**/*", "build/fonts").run(&ctx).await.unwrap();

    assert_eq!(report.skipped, 1);
    assert!(project.fs.writes().is_empty());
}

#[tokio::test]
async fn changed_none_always_processes() {
    let project = images();
    let ctx = project.context();
    let task = copy_task("src/img/**/*", "build/img").with_compare(None);

    task.run(&ctx).await.unwrap();
    let report = task.run(&ctx).await.unwrap();

    assert_eq!(report.processed, 3);
    assert_eq!(report.skipped, 0);
}

#[tokio::test]
async fn unwritable_target_is_a_structural_failure() {
    let project = images();
    project.fs.deny_writes_under(project.path("build"));
    let ctx = project.context();

    let err = copy_task("src/img/**/*", "build/img").run(&ctx).await.unwrap_err();

    match err {
        AssetwatchError::Structural { task, message } => {
            assert_eq!(task, "images:dev");
            assert!(message.contains("Permission denied"), "{message}");
        }
        other => panic!("expected a structural error, got {other:?}"),
    }
    // Structural failures do not go to the alert sink.
    assert!(project.sink.is_empty());
}

#[tokio::test]
async fn empty_match_is_fine_unless_required() {
    let project = MockProject::new();
    let ctx = project.context();

    let report = copy_task("src/files/**/*", "build/files").run(&ctx).await.unwrap();
    assert_eq!(report.matched, 0);

    let err = copy_task("src/files/**/*", "build/files")
        .with_require_match(true)
        .run(&ctx)
        .await
        .unwrap_err();
    assert!(err.to_string().contains("no source files matched"), "{err}");
}

#[tokio::test]
async fn renaming_stage_changes_the_target_and_the_filter_key() {
    let project = MockProject::new().file("src/js/app.js", "let a = 1;");
    let ctx = project.context();
    let sources = SourceSet::new(&["src/js/*.js".to_string()], &[]).unwrap();
    let stages: Vec<Arc<dyn Stage>> = vec![Arc::new(RenameStage::new(None, Some(".min".to_string())))];
    let task = PipelineTask::new("js", sources, "build/js", stages);

    task.run(&ctx).await.unwrap();
    assert_eq!(project.read("build/js/app.min.js"), "let a = 1;");
    assert!(!project.exists("build/js/app.js"));

    let report = task.run(&ctx).await.unwrap();
    assert_eq!(report.skipped, 1);
}

#[tokio::test]
async fn depends_on_globs_invalidate_every_output() {
    let project = MockProject::new()
        .file("src/js/main.js", "import './lib/util.js'")
        .file("src/js/lib/util.js", "export const x = 1;");
    let ctx = project.context();
    let sources = SourceSet::new(&["src/js/*.js".to_string()], &[]).unwrap();
    let task = PipelineTask::new("js", sources, "build/js", Vec::new())
        .with_depends_on(vec!["src/js/**/*.js".to_string()]);

    task.run(&ctx).await.unwrap();
    assert_eq!(task.run(&ctx).await.unwrap().skipped, 1);

    project.write("src/js/lib/util.js", "export const x = 2;");
    assert_eq!(task.run(&ctx).await.unwrap().processed, 1);
}

#[tokio::test]
async fn results_do_not_depend_on_concurrency() {
    let a = images();
    let b = images();

    let one = copy_task("src/img/**/*", "build/img")
        .run(&a.context_with_concurrency(1))
        .await
        .unwrap();
    let many = copy_task("src/img/**/*", "build/img")
        .run(&b.context_with_concurrency(16))
        .await
        .unwrap();

    assert_eq!(one, many);
}

#[tokio::test]
async fn clean_removes_the_directory_and_forces_a_rebuild() {
    let project = images();
    let ctx = project.context();
    let task = copy_task("src/img/**/*", "build/img");
    task.run(&ctx).await.unwrap();

    CleanTask::new("clean:dev", "build").run(&ctx).await.unwrap();
    assert!(!project.exists("build"));

    let report = task.run(&ctx).await.unwrap();
    assert_eq!(report.processed, 3);
}

#[tokio::test]
async fn clean_of_a_missing_directory_succeeds() {
    let project = MockProject::new();
    let ctx = project.context();

    let report = CleanTask::new("clean:dev", "build").run(&ctx).await.unwrap();
    assert_eq!(report.task, "clean:dev");
}

#[tokio::test]
async fn file_backed_state_survives_a_restart() {
    let project = MockProject::new()
        .file("src/html/index.html", "@@include('blocks/nav.html')")
        .file("src/html/blocks/nav.html", "<nav></nav>");
    let fs: Arc<dyn FileSystem> = Arc::new(project.fs.clone());

    let html = || {
        let sources = SourceSet::new(&["src/html/*.html".to_string()], &[]).unwrap();
        let include = assetwatch::pipeline::stages::IncludeStage::new(
            "@@",
            assetwatch::pipeline::stages::IncludeBase::File,
        )
        .unwrap();
        PipelineTask::new("html", sources, "build", vec![Arc::new(include) as Arc<dyn Stage>])
            .with_compare(Some(CompareMode::Content))
    };
    let context = || {
        let store = FileFilterStore::open(&project.root(), Arc::clone(&fs)).unwrap();
        TaskContext::new(
            project.root(),
            Arc::clone(&fs),
            ChangeFilter::new(Box::new(store)),
            Arc::new(RecordingSink::new()),
            4,
        )
    };

    html().run(&context()).await.unwrap();
    assert!(project.exists(STATE_FILE_PATH));

    // A fresh context re-reads the persisted state: expanded output differs
    // from its source, yet nothing is rebuilt.
    let report = html().run(&context()).await.unwrap();
    assert_eq!(report.skipped, 1);
}

#[tokio::test]
async fn memory_state_is_lost_with_the_context() {
    let project = MockProject::new()
        .file("src/html/index.html", "@@include('nav.html')")
        .file("src/html/nav.html", "<nav></nav>");
    let sources = SourceSet::new(&["src/html/index.html".to_string()], &[]).unwrap();
    let include = assetwatch::pipeline::stages::IncludeStage::new(
        "@@",
        assetwatch::pipeline::stages::IncludeBase::File,
    )
    .unwrap();
    let task = PipelineTask::new("html", sources, "build", vec![Arc::new(include) as Arc<dyn Stage>])
        .with_compare(Some(CompareMode::Content));

    task.run(&project.context()).await.unwrap();

    let fresh = TaskContext::new(
        project.root(),
        Arc::new(project.fs.clone()),
        ChangeFilter::new(Box::new(MemoryFilterStore::new())),
        project.sink.clone(),
        4,
    );
    // Falls back to comparing bytes, which differ after expansion.
    assert_eq!(task.run(&fresh).await.unwrap().processed, 1);
}

#[cfg(unix)]
#[tokio::test]
async fn command_stage_pipes_contents_through_the_shell() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    std::fs::create_dir_all(root.join("src/txt")).unwrap();
    std::fs::write(root.join("src/txt/a.txt"), "hello").unwrap();
    std::fs::write(root.join("src/txt/b.txt"), "world").unwrap();

    let sink = Arc::new(RecordingSink::new());
    let ctx = TaskContext::new(
        root.clone(),
        Arc::new(RealFileSystem),
        ChangeFilter::new(Box::new(MemoryFilterStore::new())),
        sink.clone(),
        2,
    );
    let sources = SourceSet::new(&["src/txt/*.txt".to_string()], &[]).unwrap();
    let stages: Vec<Arc<dyn Stage>> = vec![Arc::new(CommandStage::new(
        "tr a-z A-Z",
        Some(".up".to_string()),
    ))];
    let report = PipelineTask::new("upper", sources, "out", stages)
        .run(&ctx)
        .await
        .unwrap();

    assert_eq!(report.processed, 2);
    assert_eq!(std::fs::read_to_string(root.join("out/a.up")).unwrap(), "HELLO");
    assert_eq!(std::fs::read_to_string(root.join("out/b.up")).unwrap(), "WORLD");
    assert!(sink.is_empty());
}

#[cfg(unix)]
#[tokio::test]
async fn failing_command_is_a_per_file_error() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    std::fs::create_dir_all(root.join("src")).unwrap();
    std::fs::write(root.join("src/a.js"), "x").unwrap();

    let sink = Arc::new(RecordingSink::new());
    let ctx = TaskContext::new(
        root.clone(),
        Arc::new(RealFileSystem),
        ChangeFilter::new(Box::new(MemoryFilterStore::new())),
        sink.clone(),
        1,
    );
    let sources = SourceSet::new(&["src/*.js".to_string()], &[]).unwrap();
    let stages: Vec<Arc<dyn Stage>> = vec![Arc::new(CommandStage::new(
        "echo broken >&2; exit 3",
        None,
    ))];
    let report = PipelineTask::new("js", sources, "out", stages)
        .with_error_title("JS")
        .run(&ctx)
        .await
        .unwrap();

    assert_eq!(report.failed, 1);
    assert!(!root.join("out/a.js").exists());
    let alerts = sink.alerts();
    assert_eq!(alerts.len(), 1);
    assert_eq!(alerts[0].title, "JS");
    assert!(alerts[0].message.contains("exited with code 3"), "{}", alerts[0].message);
    assert!(alerts[0].message.contains("broken"));
}

/// Saves a new version of a file once, while the first file is in flight.
struct SaveWhileRunning {
    fs: MockFileSystem,
    path: PathBuf,
    contents: &'static str,
    fired: AtomicBool,
}

impl std::fmt::Debug for SaveWhileRunning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SaveWhileRunning").field("path", &self.path).finish()
    }
}

impl Stage for SaveWhileRunning {
    fn name(&self) -> &str {
        "save_while_running"
    }

    fn apply<'a>(&'a self, _ctx: &'a StageContext, record: FileRecord) -> StageFuture<'a> {
        Box::pin(async move {
            if !self.fired.swap(true, Ordering::SeqCst) {
                self.fs.add_file(&self.path, self.contents);
            }
            Ok(record)
        })
    }
}

#[tokio::test]
async fn partial_saved_during_a_run_is_picked_up_by_the_next_run() {
    let project = MockProject::new()
        .file("src/html/index.html", "<main>@@include('nav.html')</main>")
        .file("src/html/nav.html", "<nav>old</nav>");
    let ctx = project.context();
    let sources = SourceSet::new(&["src/html/index.html".to_string()], &[]).unwrap();
    let stages: Vec<Arc<dyn Stage>> = vec![
        Arc::new(IncludeStage::new("@@", IncludeBase::File).unwrap()),
        Arc::new(SaveWhileRunning {
            fs: project.fs.clone(),
            path: project.path("src/html/nav.html"),
            contents: "<nav>new</nav>",
            fired: AtomicBool::new(false),
        }),
    ];
    let task = PipelineTask::new("html", sources, "build", stages)
        .with_compare(Some(CompareMode::Content));

    task.run(&ctx).await.unwrap();
    assert_eq!(project.read("build/index.html"), "<main><nav>old</nav></main>");

    let report = task.run(&ctx).await.unwrap();
    assert_eq!(report.processed, 1);
    assert_eq!(project.read("build/index.html"), "<main><nav>new</nav></main>");

    assert_eq!(task.run(&ctx).await.unwrap().skipped, 1);
}

#[cfg(unix)]
#[tokio::test]
async fn dependency_edited_while_a_command_runs_is_rebuilt() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path().to_path_buf();
    std::fs::create_dir_all(root.join("src/js/lib")).unwrap();
    std::fs::write(root.join("src/js/main.js"), "main").unwrap();
    std::fs::write(root.join("src/js/lib/dep.js"), "OLD").unwrap();

    let ctx = TaskContext::new(
        root.clone(),
        Arc::new(RealFileSystem),
        ChangeFilter::new(Box::new(MemoryFilterStore::new())),
        Arc::new(RecordingSink::new()),
        1,
    );
    let sources = SourceSet::new(&["src/js/*.js".to_string()], &[]).unwrap();
    let stages: Vec<Arc<dyn Stage>> = vec![Arc::new(CommandStage::new(
        "cat {input} src/js/lib/dep.js; sleep 0.6",
        None,
    ))];
    let task = PipelineTask::new("js", sources, "build/js", stages)
        .with_depends_on(vec!["src/js/**/*.js".to_string()]);

    let dep = root.join("src/js/lib/dep.js");
    let editor = tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(250)).await;
        std::fs::write(dep, "NEW").unwrap();
    });
    let first = task.run(&ctx).await.unwrap();
    editor.await.unwrap();
    assert_eq!(first.processed, 1);
    assert_eq!(std::fs::read_to_string(root.join("build/js/main.js")).unwrap(), "mainOLD");

    let rerun = task.run(&ctx).await.unwrap();
    assert_eq!(rerun.processed, 1);
    assert_eq!(std::fs::read_to_string(root.join("build/js/main.js")).unwrap(), "mainNEW");
}
