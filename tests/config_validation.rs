// tests/config_validation.rs

use std::path::PathBuf;

use assetwatch::config::{ConfigFile, StageConfig, TaskKind, load_and_validate, parse_str};
use assetwatch::errors::AssetwatchError;
use assetwatch::runner::{Entry, Registry};
use assetwatch::types::{ChangedMode, FailurePolicy, RunMode, StateStorageMode};

const SHIPPED: &str = include_str!("../Assetwatch.toml");

fn validate(toml: &str) -> Result<ConfigFile, AssetwatchError> {
    ConfigFile::try_from(parse_str(toml)?)
}

#[test]
fn shipped_config_is_valid_and_mirrors_the_dev_pipeline() {
    let cfg = validate(SHIPPED).unwrap();

    assert_eq!(cfg.config.default_task, "default");
    assert_eq!(cfg.config.debounce_ms, 100);
    assert_eq!(cfg.config.failure_policy, FailurePolicy::FailFast);
    assert_eq!(cfg.config.state_storage, StateStorageMode::Memory);
    assert_eq!(
        cfg.all_names(),
        vec![
            "build", "clean:dev", "default", "files:dev", "fonts:dev", "html:dev", "images:dev",
            "js:dev", "sass:dev",
        ]
    );

    let html = &cfg.task["html:dev"];
    assert_eq!(html.changed, ChangedMode::Content);
    assert_eq!(
        html.stages,
        vec![StageConfig::Include {
            prefix: "@@".to_string(),
            basepath: "@file".to_string(),
        }]
    );
    assert_eq!(html.error_title.as_deref(), Some("HTML"));
    assert_eq!(cfg.task["images:dev"].error_title, None);

    assert_eq!(cfg.task["clean:dev"].kind, TaskKind::Clean);
    assert_eq!(cfg.composite["default"].mode, RunMode::Sequential);
    assert_eq!(cfg.composite["default"].tasks, vec!["clean:dev", "build"]);
    assert_eq!(cfg.composite["build"].mode, RunMode::Parallel);
    assert_eq!(cfg.watch.len(), 6);

    let server = cfg.server.as_ref().unwrap();
    assert_eq!(server.root, PathBuf::from("build"));
    assert_eq!(server.port, 8000);
    assert!(server.live_reload);
}

#[test]
fn shipped_config_builds_a_registry() {
    let cfg = validate(SHIPPED).unwrap();
    let registry = Registry::from_config(&cfg).unwrap();

    match registry.get("build") {
        Some(Entry::Composite { mode, children }) => {
            assert_eq!(*mode, RunMode::Parallel);
            assert_eq!(children.len(), 6);
        }
        other => panic!("unexpected entry {other:?}"),
    }
    assert!(matches!(registry.get("sass:dev"), Some(Entry::Task(_))));
}

#[test]
fn defaults_apply_to_a_minimal_config() {
    let cfg = validate(
        r#"
        [task.default]
        src = ["src/**/*"]
        dest = "build"
        "#,
    )
    .unwrap();

    assert_eq!(cfg.config.root, PathBuf::from("."));
    assert_eq!(cfg.config.concurrency, 8);
    assert!(cfg.server.is_none());
    assert!(cfg.notify.command.is_none());

    let task = &cfg.task["default"];
    assert_eq!(task.kind, TaskKind::Pipeline);
    assert_eq!(task.changed, ChangedMode::Mtime);
    assert!(task.stages.is_empty());
    assert!(!task.require_match);
}

#[test]
fn stages_are_tagged_by_kind() {
    let cfg = validate(
        r#"
        [task.default]
        src = ["src/js/*.js"]
        dest = "build/js"
        changed = "none"
        stages = [
            { kind = "command", cmd = "esbuild {input}", extname = ".js" },
            { kind = "rename", suffix = ".min" },
            { kind = "stylesheet", command = "sass --stdin" },
            { kind = "sass_glob" },
            { kind = "source_map" },
        ]
        "#,
    )
    .unwrap();

    let task = &cfg.task["default"];
    assert_eq!(task.changed, ChangedMode::None);
    assert_eq!(
        task.stages,
        vec![
            StageConfig::Command {
                cmd: "esbuild {input}".to_string(),
                extname: Some(".js".to_string()),
            },
            StageConfig::Rename {
                extname: None,
                suffix: Some(".min".to_string()),
            },
            StageConfig::Stylesheet {
                command: Some("sass --stdin".to_string()),
            },
            StageConfig::SassGlob,
            StageConfig::SourceMap,
        ]
    );
}

#[test]
fn unknown_stage_kind_is_a_parse_error() {
    let err = validate(
        r#"
        [task.default]
        src = ["a"]
        dest = "b"
        stages = [{ kind = "uglify" }]
        "#,
    )
    .unwrap_err();

    assert!(matches!(err, AssetwatchError::TomlError(_)), "{err}");
}

#[test]
fn config_without_tasks_is_rejected() {
    let err = validate("[config]\ndebounce_ms = 10\n").unwrap_err();
    assert!(matches!(err, AssetwatchError::ConfigError(_)));
}

#[test]
fn unknown_default_task_is_rejected() {
    let err = validate(
        r#"
        [config]
        default_task = "nope"

        [task.a]
        src = ["x"]
        dest = "y"
        "#,
    )
    .unwrap_err();

    assert!(err.to_string().contains("nope"), "{err}");
}

#[test]
fn pipeline_without_sources_is_rejected_but_clean_is_not() {
    let err = validate(
        r#"
        [task.default]
        dest = "build"
        "#,
    )
    .unwrap_err();
    assert!(err.to_string().contains("no `src` patterns"), "{err}");

    validate(
        r#"
        [task.default]
        kind = "clean"
        dest = "build"
        "#,
    )
    .unwrap();
}

#[test]
fn invalid_globs_are_rejected() {
    let err = validate(
        r#"
        [task.default]
        src = ["src/[a-"]
        dest = "build"
        "#,
    )
    .unwrap_err();

    assert!(matches!(err, AssetwatchError::ConfigError(_)), "{err}");
}

#[test]
fn composite_sharing_a_task_name_is_a_duplicate() {
    let err = validate(
        r#"
        [task.default]
        src = ["a"]
        dest = "b"

        [composite.default]
        tasks = ["default"]
        "#,
    )
    .unwrap_err();

    assert!(matches!(err, AssetwatchError::DuplicateTask(name) if name == "default"));
}

#[test]
fn composite_cycles_are_rejected() {
    let err = validate(
        r#"
        [task.leaf]
        src = ["a"]
        dest = "b"

        [composite.default]
        tasks = ["x"]

        [composite.x]
        mode = "parallel"
        tasks = ["leaf", "y"]

        [composite.y]
        tasks = ["default"]
        "#,
    )
    .unwrap_err();

    assert!(matches!(err, AssetwatchError::CompositeCycle(_)), "{err}");
}

#[test]
fn clean_task_below_a_parallel_composite_is_rejected() {
    let err = validate(
        r#"
        [task.clean]
        kind = "clean"
        dest = "build"

        [task.html]
        src = ["src/*.html"]
        dest = "build"

        [composite.default]
        tasks = ["everything"]

        [composite.everything]
        mode = "parallel"
        tasks = ["html", "reset"]

        [composite.reset]
        tasks = ["clean"]
        "#,
    )
    .unwrap_err();

    assert!(matches!(err, AssetwatchError::ConfigError(_)), "{err}");
    assert!(err.to_string().contains("'everything'"), "{err}");
    assert!(err.to_string().contains("'clean'"), "{err}");
}

#[test]
fn watch_binding_that_cleans_is_rejected() {
    let err = validate(
        r#"
        [task.clean]
        kind = "clean"
        dest = "build"

        [task.html]
        src = ["src/*.html"]
        dest = "build"

        [composite.default]
        tasks = ["clean", "html"]

        [[watch]]
        paths = ["src/*.html"]
        tasks = ["default"]
        "#,
    )
    .unwrap_err();

    assert!(matches!(err, AssetwatchError::ConfigError(_)), "{err}");
    assert!(err.to_string().contains("#1"), "{err}");
}

#[test]
fn clean_task_in_a_sequential_composite_is_accepted() {
    let cfg = validate(
        r#"
        [task.clean]
        kind = "clean"
        dest = "build"

        [task.html]
        src = ["src/*.html"]
        dest = "build"

        [composite.default]
        tasks = ["clean", "html"]
        "#,
    )
    .unwrap();

    assert_eq!(cfg.composite["default"].mode, RunMode::Sequential);
}

#[test]
fn composite_with_unknown_child_is_rejected() {
    let err = validate(
        r#"
        [task.a]
        src = ["a"]
        dest = "b"

        [composite.default]
        tasks = ["a", "ghost"]
        "#,
    )
    .unwrap_err();

    assert!(err.to_string().contains("ghost"), "{err}");
}

#[test]
fn watch_binding_to_unknown_task_is_rejected() {
    let err = validate(
        r#"
        [task.default]
        src = ["a"]
        dest = "b"

        [[watch]]
        paths = ["src/**/*"]
        tasks = ["missing"]
        "#,
    )
    .unwrap_err();

    assert!(matches!(err, AssetwatchError::TaskNotFound(name) if name == "missing"));
}

#[test]
fn failure_policy_accepts_both_spellings() {
    assert_eq!("fail-fast".parse::<FailurePolicy>(), Ok(FailurePolicy::FailFast));
    assert_eq!("collect_all".parse::<FailurePolicy>(), Ok(FailurePolicy::CollectAll));
    assert!("sometimes".parse::<FailurePolicy>().is_err());
}

#[test]
fn relative_root_resolves_against_the_config_directory() {
    let dir = tempfile::tempdir().unwrap();
    let site = dir.path().join("site");
    std::fs::create_dir_all(&site).unwrap();
    let path = site.join("Assetwatch.toml");
    std::fs::write(
        &path,
        r#"
        [config]
        root = "app"

        [task.default]
        src = ["src/**/*"]
        dest = "build"
        "#,
    )
    .unwrap();

    let cfg = load_and_validate(&path).unwrap();

    assert_eq!(cfg.config.root, site.join("app"));
}
