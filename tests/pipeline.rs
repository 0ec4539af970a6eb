mod common;

use std::sync::Arc;
use std::time::Duration;

use indexmap::IndexMap;
use serde_json::json;

use common::{Scripted, failed, healthy, health_probe, kibana_labels, kibana_probe, spec};
use led::container::ContainerError;
use led::pipeline::{ContainerCreator, CreateOptions, CreateTasks, PipelineError};
use led::poller::PollError;
use led::provenance::{ELASTIC_IMAGE_LABEL, decode_spec};
use led::spec::{ContainerSpec, ContainerSpecInput, Script};
use led::tasks::{State, TaskError};

fn fast() -> CreateOptions {
    CreateOptions {
        poll_interval: Duration::from_millis(1),
        ..Default::default()
    }
}

fn create(spec: ContainerSpec, opts: CreateOptions, executor: &Arc<Scripted>) -> CreateTasks {
    ContainerCreator::new(spec, opts, executor.clone()).create()
}

fn label_of(create_cmd: &str) -> &str {
    let marker = format!("--label {ELASTIC_IMAGE_LABEL}=");
    let start = create_cmd.find(&marker).unwrap() + marker.len();
    create_cmd[start..].split(' ').next().unwrap()
}

fn phase_states(tasks: &CreateTasks) -> Vec<State> {
    vec![
        tasks.image_check.state(),
        tasks.volume_rm.state(),
        tasks.container_rm.state(),
        tasks.container_mk.state(),
        tasks.container_start.state(),
        tasks.elastic_ready.state(),
        tasks.kibana_ready.state(),
        tasks.kso_upload.state(),
        tasks.scripts_upload.state(),
        tasks.sm_upload.state(),
    ]
}

#[tokio::test]
async fn nothing_runs_before_the_caller_yields() {
    let executor = Arc::new(healthy());
    let tasks = create(spec(Default::default()), fast(), &executor);

    assert!(phase_states(&tasks).iter().all(|state| *state == State::Pending));
    assert_eq!(tasks.main.state(), State::Pending);
    assert!(executor.seen().is_empty());

    tasks.main.on_end().await.unwrap();
}

#[tokio::test]
async fn provisions_a_plain_node() {
    let executor = Arc::new(healthy());
    let spec = spec(Default::default());
    let tasks = create(spec.clone(), fast(), &executor);

    let container = tasks.main.on_end().await.unwrap();
    assert_eq!(container.name(), "n1");
    assert_eq!(container.port(), 5000);
    assert_eq!(container.kibana_port(), None);

    assert!(phase_states(&tasks).iter().all(|state| *state == State::Succeeded));
    assert_eq!(tasks.kibana_ready.on_end().await.unwrap(), None);
    assert!(executor.seen().iter().all(|cmd| !cmd.contains(&kibana_probe())));

    let seen = executor.seen();
    let create_cmd = seen.iter().find(|cmd| cmd.starts_with("docker create")).unwrap();
    assert_eq!(decode_spec(label_of(create_cmd)).unwrap(), spec);

    let steps = ["docker image inspect", "docker rm -f n1", "docker create", "docker start n1"];
    let order: Vec<usize> = steps
        .iter()
        .map(|step| seen.iter().position(|cmd| cmd.starts_with(step)).unwrap())
        .collect();
    assert!(order.windows(2).all(|pair| pair[0] < pair[1]));
}

#[tokio::test]
async fn late_subscribers_get_the_outcome() {
    let executor = Arc::new(healthy());
    let tasks = create(spec(Default::default()), fast(), &executor);
    tasks.main.on_end().await.unwrap();

    tasks.image_check.on_start().await.unwrap();
    tasks.image_check.on_end().await.unwrap();
    assert_eq!(tasks.container_mk.on_end().await.unwrap().port(), 5000);
}

#[tokio::test]
async fn missing_container_is_not_an_error() {
    let executor =
        Arc::new(healthy().on("docker rm -f", |_| failed("Error: No such container: n1")));
    let tasks = create(spec(Default::default()), fast(), &executor);

    tasks.main.on_end().await.unwrap();
    assert_eq!(tasks.container_rm.state(), State::Succeeded);
}

#[tokio::test]
async fn other_remove_failures_abort() {
    let executor = Arc::new(healthy().on("docker rm -f", |_| failed("permission denied")));
    let tasks = create(spec(Default::default()), fast(), &executor);

    let err = tasks.main.on_end().await.unwrap_err();
    assert!(matches!(&err, TaskError::Failed(failure) if matches!(**failure, PipelineError::Exec(_))));
    assert_eq!(tasks.container_rm.state(), State::Failed);
    assert_eq!(tasks.container_mk.state(), State::Abandoned);
    assert!(!executor.ran("docker create"));
}

#[tokio::test]
async fn foreign_image_fails_the_first_phase() {
    let executor = Arc::new(healthy().answer("docker image inspect", "null\n"));
    let tasks = create(spec(Default::default()), fast(), &executor);

    // the phase has already failed by the time the run does
    let image_check = tasks.image_check.clone();
    let observed = tokio::spawn({
        let main = tasks.main.clone();
        async move {
            let _ = main.on_end().await;
            image_check.state()
        }
    });

    let phase_err = tasks.image_check.on_end().await.unwrap_err();
    let main_err = tasks.main.on_end().await.unwrap_err();
    match (phase_err, main_err) {
        (TaskError::Failed(phase), TaskError::Failed(main)) => {
            assert!(Arc::ptr_eq(&phase, &main));
            assert!(matches!(*main, PipelineError::ForeignImage(ref image) if image == "led-es"));
        }
        other => panic!("unexpected: {other:?}"),
    }
    assert_eq!(observed.await.unwrap(), State::Failed);

    let states = phase_states(&tasks);
    assert_eq!(states[0], State::Failed);
    assert!(states[1..].iter().all(|state| *state == State::Abandoned));
    assert!(matches!(
        tasks.volume_rm.on_start().await,
        Err(TaskError::Abandoned)
    ));
    assert_eq!(executor.seen().len(), 1);
}

#[tokio::test]
async fn kibana_label_must_match_the_spec() {
    let executor = Arc::new(healthy().on("docker image inspect", |_| Ok(kibana_labels())));
    let tasks = create(spec(Default::default()), fast(), &executor);
    let err = tasks.main.on_end().await.unwrap_err();
    assert!(matches!(err, TaskError::Failed(ref e) if matches!(**e, PipelineError::UnexpectedKibana(_))));

    let executor = Arc::new(healthy());
    let kibana = spec(ContainerSpecInput {
        kibana: true,
        kibana_port: Some(6000),
        ..Default::default()
    });
    let tasks = create(kibana, fast(), &executor);
    let err = tasks.main.on_end().await.unwrap_err();
    assert!(matches!(err, TaskError::Failed(ref e) if matches!(**e, PipelineError::MissingKibana { .. })));
}

#[tokio::test]
async fn kibana_node_waits_for_kibana() {
    let executor = Arc::new(
        healthy()
            .on("docker image inspect", |_| Ok(kibana_labels()))
            .answer(kibana_probe(), "200"),
    );
    let kibana = spec(ContainerSpecInput {
        kibana: true,
        kibana_port: Some(6000),
        ..Default::default()
    });
    let tasks = create(kibana, fast(), &executor);

    let container = tasks.main.on_end().await.unwrap();
    assert_eq!(container.kibana_port(), Some(6000));
    assert_eq!(tasks.kibana_ready.on_end().await.unwrap(), Some(200));
    let seen = executor.seen();
    let create_cmd = seen.iter().find(|cmd| cmd.starts_with("docker create")).unwrap();
    assert!(create_cmd.contains(" -p 6000:5601 "));
}

#[tokio::test]
async fn failed_upload_waits_for_its_siblings() {
    let executor = Arc::new(
        healthy().answer("/_scripts/second'", r#"{"error":{"type":"script_exception"},"status":400}"#),
    );
    let mut scripts = IndexMap::new();
    for (name, source) in [("first", "1"), ("second", "2"), ("third", "3")] {
        scripts.insert(
            name.to_string(),
            Script {
                lang: "painless".to_string(),
                source: source.to_string(),
            },
        );
    }
    let mut index_settings = IndexMap::new();
    index_settings.insert("users".to_string(), json!({ "settings": { "number_of_shards": 1 } }));
    let tasks = create(
        spec(ContainerSpecInput {
            scripts,
            index_settings,
            ..Default::default()
        }),
        fast(),
        &executor,
    );

    let err = tasks.main.on_end().await.unwrap_err();
    match err {
        TaskError::Failed(failure) => match &*failure {
            PipelineError::Upload(upload) => {
                assert_eq!(upload.failures.len(), 1);
                assert_eq!(upload.first().unwrap().name, "second");
            }
            other => panic!("unexpected: {other:?}"),
        },
        other => panic!("unexpected: {other:?}"),
    }

    for name in ["first", "second", "third"] {
        assert!(executor.ran(&format!("'localhost:5000/_scripts/{name}'")));
    }
    assert_eq!(tasks.scripts_upload.state(), State::Failed);
    assert_eq!(tasks.sm_upload.on_end().await.unwrap().len(), 1);
    assert_eq!(tasks.kso_upload.on_end().await.unwrap(), Vec::<serde_json::Value>::new());
}

#[tokio::test(start_paused = true)]
async fn readiness_deadline_fails_the_run() {
    let executor = Arc::new(healthy().answer(health_probe(), r#"{"status":"red"}"#));
    let opts = CreateOptions {
        poll_interval: Duration::from_secs(2),
        ready_deadline: Some(Duration::from_secs(9)),
        ..Default::default()
    };
    let tasks = create(spec(Default::default()), opts, &executor);

    let err = tasks.main.on_end().await.unwrap_err();
    assert!(matches!(
        err,
        TaskError::Failed(ref e) if matches!(
            **e,
            PipelineError::Container(ContainerError::Poll(PollError::DeadlineExceeded { attempts: 5, .. }))
        )
    ));
    assert_eq!(tasks.elastic_ready.state(), State::Failed);
    assert_eq!(tasks.kibana_ready.state(), State::Abandoned);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_an_endless_wait() {
    let executor = Arc::new(healthy().on(health_probe(), |_| failed("connection refused")));
    let opts = CreateOptions {
        poll_interval: Duration::from_secs(2),
        ..Default::default()
    };
    let cancel = opts.cancel.clone();
    let tasks = create(spec(Default::default()), opts, &executor);

    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(30)).await;
        cancel.cancel();
    });

    let err = tasks.main.on_end().await.unwrap_err();
    assert!(matches!(err, TaskError::Failed(ref e) if matches!(**e, PipelineError::Cancelled)));
    assert_eq!(tasks.container_start.state(), State::Succeeded);
    assert_eq!(tasks.elastic_ready.state(), State::Failed);
    assert_eq!(tasks.sm_upload.state(), State::Abandoned);
}

#[tokio::test]
async fn clears_the_volume_dir() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("stale"), "x").unwrap();
    std::fs::create_dir_all(dir.path().join("nodes/0")).unwrap();

    let executor = Arc::new(healthy());
    let opts = CreateOptions {
        clear_volume_dir: true,
        ..fast()
    };
    let tasks = create(
        spec(ContainerSpecInput {
            volume_dir: Some(dir.path().to_path_buf()),
            ..Default::default()
        }),
        opts,
        &executor,
    );

    tasks.main.on_end().await.unwrap();
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 0);
    assert!(executor.ran(&format!(" -v '{}:/usr/share/elasticsearch/data'", dir.path().display())));
}

#[tokio::test]
async fn keeps_the_volume_dir_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let data = dir.path().join("data");
    std::fs::create_dir_all(&data).unwrap();
    std::fs::write(data.join("keep"), "x").unwrap();
    let fresh = dir.path().join("fresh");

    for volume_dir in [data.clone(), fresh.clone()] {
        let executor = Arc::new(healthy());
        let tasks = create(
            spec(ContainerSpecInput {
                volume_dir: Some(volume_dir),
                ..Default::default()
            }),
            fast(),
            &executor,
        );
        tasks.main.on_end().await.unwrap();
    }

    assert!(data.join("keep").exists());
    assert!(fresh.is_dir());
}
