use std::io::Cursor;
use std::sync::Arc;
use std::time::{Duration, Instant};

use scopetrace::domain::LoadError;
use scopetrace::loader::load_from_reader;
use scopetrace::{
    BlockType, DescriptorSpec, LoadState, ProfileLoader, Recorder, RecorderConfig, ThreadId,
};

fn wait_done(loader: &ProfileLoader) {
    let deadline = Instant::now() + Duration::from_secs(10);
    while !loader.done() {
        assert!(Instant::now() < deadline, "load did not finish");
        std::thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_two_threads_record_flush_and_load() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("two_threads.prof");
    let recorder = Arc::new(Recorder::new(RecorderConfig::default().with_output_path(&path)));

    let outer = recorder.register(DescriptorSpec::new("outer", file!(), line!())).unwrap();
    let inner = recorder.register(DescriptorSpec::new("inner", file!(), line!())).unwrap();
    let mark = recorder.register(DescriptorSpec::new("mark", file!(), line!()).event()).unwrap();

    let workers: Vec<_> = (0..2)
        .map(|_| {
            let recorder = Arc::clone(&recorder);
            std::thread::spawn(move || {
                let _outer = recorder.scope(outer);
                for _ in 0..3 {
                    let _inner = recorder.scope(inner);
                    recorder.event(mark);
                }
            })
        })
        .collect();
    for worker in workers {
        worker.join().expect("worker panicked");
    }

    let summary = recorder.flush().expect("Failed to write profile");
    assert_eq!(summary.descriptors, 3);
    assert_eq!(summary.blocks, 2 * (1 + 3 + 3));

    let mut loader = ProfileLoader::new();
    loader.load_file(&path).expect("Failed to start load");
    wait_done(&loader);
    assert_eq!(loader.state(), LoadState::Done);
    let profile = loader.get().expect("Failed to load profile");

    assert_eq!(profile.source(), Some(path.as_path()));
    let outer_roots: Vec<_> = profile
        .trees()
        .values()
        .flatten()
        .filter(|root| profile.block_name(&root.block) == "outer")
        .collect();
    assert_eq!(outer_roots.len(), 2);

    for root in outer_roots {
        assert_eq!(root.children.len(), 3);
        for child in &root.children {
            assert_eq!(profile.block_name(&child.block), "inner");
            assert!(child.block.begin >= root.block.begin);
            assert!(child.block.end <= root.block.end);
            assert_eq!(child.children.len(), 1);
            assert_eq!(child.children[0].block.block_type, BlockType::Event);
        }
    }
}

#[test]
fn test_disabled_recorder_writes_empty_block_section() {
    let recorder = Recorder::new(RecorderConfig::default().with_enabled(false));
    let id = recorder.register(DescriptorSpec::new("idle", file!(), line!())).unwrap();
    {
        let _guard = recorder.scope(id);
        recorder.event(id);
    }
    recorder.end_block();

    let mut out = Vec::new();
    let summary = recorder.write_to(&mut out).expect("Failed to write");
    assert_eq!(summary.blocks, 0);

    let profile = load_from_reader(Cursor::new(out)).expect("Failed to load");
    assert_eq!(profile.descriptors().len(), 1);
    assert!(profile.blocks().is_empty());
    assert!(profile.tree(ThreadId(1)).is_empty());
}

#[test]
fn test_corrupt_file_is_reported_and_loader_recovers() {
    let dir = tempfile::tempdir().expect("Failed to create temp dir");
    let path = dir.path().join("corrupt.prof");

    let recorder = Recorder::new(RecorderConfig::default());
    let id = recorder.register(DescriptorSpec::new("work", file!(), line!())).unwrap();
    drop(recorder.scope(id));
    let mut bytes = Vec::new();
    recorder.write_to(&mut bytes).expect("Failed to write");

    let good = bytes.clone();
    bytes.truncate(bytes.len() - 4);
    std::fs::write(&path, &bytes).expect("Failed to write corrupt file");

    let mut loader = ProfileLoader::new();
    loader.load_file(&path).expect("Failed to start load");
    wait_done(&loader);
    assert_eq!(loader.state(), LoadState::Failed);
    let err = loader.get().unwrap_err();
    assert!(matches!(err, LoadError::Truncated { .. }));
    assert!(err.is_corrupt_data());

    assert_eq!(loader.state(), LoadState::Idle);
    let total = good.len() as u64;
    loader.load_reader(Cursor::new(good), Some(total)).expect("Failed to start load");
    wait_done(&loader);
    assert_eq!(loader.progress(), total);
    assert_eq!(loader.get().expect("Failed to load").blocks().len(), 1);
}
