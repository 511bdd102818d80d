//! Pipeline scenarios through the public API

use classweave::bridge::{PrivilegedBridge, PrivilegedDefiner};
use classweave::cache::{CacheAdapter, CacheEntry, ClassCache, MemoryCache};
use classweave::config::DumpMode;
use classweave::delegate::Delegate;
use classweave::dump::DumpSink;
use classweave::flags::{TransformerFlags, WriterFlags};
use classweave::identifier::Identifier;
use classweave::pass::Pass;
use classweave::pipeline::PipelineOptions;
use classweave::unit::{markers, Annotated, Annotation, ClassHeader, ClassNode, Code, Insn};
use classweave::unit::{Method, UnitCodec, UnitName, ValueKind, WireCodec};
use classweave::WeaveError;
use classweave::{Outcome, Pipeline, Registry, WeaveResult};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier, Mutex};
use std::thread;

/// Renames method `run` and counts invocations
struct Rename {
    id: Identifier,
    calls: AtomicUsize,
}

impl Rename {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            id: Identifier::new("scenario", "rename"),
            calls: AtomicUsize::new(0),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Pass for Rename {
    fn name(&self) -> &Identifier {
        &self.id
    }

    fn origin(&self) -> &str {
        "scenario."
    }

    fn applies(&self, name: &str, _transformed_name: &str) -> bool {
        name != "pkg.A"
    }

    fn apply(&self, node: &mut ClassNode, flags: &mut TransformerFlags) -> WeaveResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        flags.request_maxs();
        let Some(method) = node.find_method_mut("run", "()V") else {
            return Ok(false);
        };
        method.name = "ran".to_string();
        Ok(true)
    }
}

#[derive(Default)]
struct CountingDelegate(AtomicUsize);

impl Delegate for CountingDelegate {
    fn transform(&self, _unit: &UnitName, bytes: Option<Vec<u8>>) -> WeaveResult<Option<Vec<u8>>> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(bytes)
    }
}

#[derive(Default)]
struct Definer(Mutex<Vec<Vec<u8>>>);

impl PrivilegedDefiner for Definer {
    fn define(&self, _unit: &UnitName, bytes: &[u8]) -> WeaveResult<()> {
        self.0.lock().unwrap().push(bytes.to_vec());
        Ok(())
    }
}

#[derive(Default)]
struct Dumps(Mutex<Vec<(String, Vec<u8>)>>);

impl DumpSink for Dumps {
    fn submit(&self, name: &str, bytes: Vec<u8>) {
        self.0.lock().unwrap().push((name.to_string(), bytes));
    }
}

fn unit(internal: &str, privileged: bool) -> Vec<u8> {
    let mut node = ClassNode::new(ClassHeader::new(internal));
    if privileged {
        node.header
            .annotations
            .push(Annotation::marker(markers::FORCE_PRIVILEGED, false));
    }
    node.body.methods.push(Method::new(
        "run",
        "()V",
        Some(Code::new(vec![Insn::Nop, Insn::Return(None)])),
    ));
    WireCodec.write(&node, WriterFlags::empty()).unwrap()
}

struct Harness {
    pipeline: Pipeline,
    cache: Arc<MemoryCache>,
    delegate: Arc<CountingDelegate>,
    definer: Arc<Definer>,
    dumps: Arc<Dumps>,
}

fn harness(early: &[Arc<dyn Pass>], normal: &[Arc<dyn Pass>]) -> Harness {
    let mut registry = Registry::new();
    for pass in early {
        registry.register_early(pass.clone()).unwrap();
    }
    for pass in normal {
        registry.register_normal(pass.clone()).unwrap();
    }
    registry.freeze();

    let cache = Arc::new(MemoryCache::new());
    let delegate = Arc::new(CountingDelegate::default());
    let definer = Arc::new(Definer::default());
    let dumps = Arc::new(Dumps::default());
    let pipeline = Pipeline::new(Arc::new(registry), PrivilegedBridge::new(definer.clone()))
        .unwrap()
        .with_delegate(delegate.clone())
        .with_cache(CacheAdapter::new(cache.clone()))
        .with_dump(dumps.clone())
        .with_options(PipelineOptions {
            dump_mode: DumpMode::On,
            protected_prefixes: Vec::new(),
            rewrite_inline: true,
        });

    Harness {
        pipeline,
        cache,
        delegate,
        definer,
        dumps,
    }
}

#[test]
fn untouched_unit_is_returned_and_cached_as_is() {
    let h = harness(&[], &[]);
    let b1 = unit("pkg/A", false);

    let out = h.pipeline.transform(&UnitName::new("pkg.A"), Some(&b1)).unwrap();
    assert_eq!(out, Outcome::Bytes(b1.clone()));
    assert_eq!(h.cache.get_entry(&b1).unwrap(), Some(CacheEntry::Unchanged));
    assert!(h.dumps.0.lock().unwrap().is_empty());
}

#[test]
fn cached_result_is_shared_across_names() {
    let rename = Rename::new();
    let h = harness(&[rename.clone()], &[]);
    let b2 = unit("pkg/B", false);

    let first = h.pipeline.transform(&UnitName::new("pkg.B"), Some(&b2)).unwrap();
    assert_ne!(first, Outcome::Bytes(b2.clone()));

    let second = h.pipeline.transform(&UnitName::new("pkg.C"), Some(&b2)).unwrap();
    assert_eq!(second, first);
    assert_eq!(rename.calls(), 1);
}

#[test]
fn seen_name_always_short_circuits() {
    let rename = Rename::new();
    let h = harness(&[], &[rename.clone()]);
    let name = UnitName::new("pkg.Once");

    h.pipeline.transform(&name, Some(&unit("pkg/Once", false))).unwrap();
    assert_eq!(rename.calls(), 1);

    for internal in ["pkg/Other", "pkg/Third"] {
        let bytes = unit(internal, false);
        let out = h.pipeline.transform(&name, Some(&bytes)).unwrap();
        assert_eq!(out, Outcome::Bytes(bytes));
    }
    assert_eq!(rename.calls(), 1);
    assert_eq!(h.delegate.0.load(Ordering::SeqCst), 3);
}

#[test]
fn changed_unit_is_dumped_exactly_once() {
    let rename = Rename::new();
    let h = harness(&[], &[rename]);
    let input = unit("pkg/D", false);

    let out = h
        .pipeline
        .transform(&UnitName::new("pkg.D"), Some(&input))
        .unwrap()
        .into_bytes()
        .unwrap();
    assert_ne!(out, input);

    let dumps = h.dumps.0.lock().unwrap();
    assert_eq!(dumps.len(), 1);
    assert_eq!(dumps[0], ("pkg.D".to_string(), out));
}

#[test]
fn racing_callers_run_the_pipeline_once() {
    const THREADS: usize = 12;
    let rename = Rename::new();
    let h = harness(&[], &[rename.clone()]);
    let bytes = unit("pkg/Race", false);
    let barrier = Barrier::new(THREADS);

    let outcomes: Vec<Outcome> = thread::scope(|s| {
        let handles: Vec<_> = (0..THREADS)
            .map(|_| {
                s.spawn(|| {
                    barrier.wait();
                    h.pipeline
                        .transform(&UnitName::new("pkg.Race"), Some(&bytes))
                        .unwrap()
                })
            })
            .collect();
        handles.into_iter().map(|t| t.join().unwrap()).collect()
    });

    assert_eq!(rename.calls(), 1);
    // One unit through the normal path, the rest short-circuited
    assert_eq!(h.delegate.0.load(Ordering::SeqCst), THREADS);
    let untouched = outcomes
        .iter()
        .filter(|o| **o == Outcome::Bytes(bytes.clone()))
        .count();
    assert_eq!(untouched, THREADS - 1);
}

#[test]
fn identical_content_under_many_names_computes_once() {
    const THREADS: usize = 8;
    let rename = Rename::new();
    let h = harness(&[rename.clone()], &[]);
    let bytes = unit("pkg/Shared", false);
    let barrier = Barrier::new(THREADS);

    thread::scope(|s| {
        for i in 0..THREADS {
            let (h, bytes, barrier) = (&h, &bytes, &barrier);
            s.spawn(move || {
                barrier.wait();
                let name = UnitName::new(format!("pkg.Shared{i}"));
                h.pipeline.transform(&name, Some(bytes)).unwrap();
            });
        }
    });

    assert_eq!(rename.calls(), 1);
    assert_eq!(h.cache.len(), 1);
}

#[test]
fn privileged_unit_is_defined_not_returned() {
    let h = harness(&[], &[]);
    let out = h
        .pipeline
        .transform(&UnitName::new("pkg.Hot"), Some(&unit("pkg/Hot", true)))
        .unwrap();
    assert_eq!(out, Outcome::Consumed);

    let defined = h.definer.0.lock().unwrap();
    assert_eq!(defined.len(), 1);
    let header = WireCodec.read_header(&defined[0]).unwrap();
    assert!(!header.has_annotation(markers::FORCE_PRIVILEGED));
}

#[test]
fn out_of_range_local_fails_the_unit_when_maxs_are_recomputed() {
    let rename = Rename::new();
    let h = harness(&[], &[rename.clone()]);
    let mut node = ClassNode::new(ClassHeader::new("pkg/Wide"));
    node.body.methods.push(Method::new(
        "run",
        "()V",
        Some(Code::new(vec![
            Insn::Load {
                kind: ValueKind::Long,
                slot: u16::MAX,
            },
            Insn::Return(None),
        ])),
    ));
    let bytes = WireCodec.write(&node, WriterFlags::empty()).unwrap();

    let err = h
        .pipeline
        .transform(&UnitName::new("pkg.Wide"), Some(&bytes))
        .unwrap_err();
    assert!(matches!(err, WeaveError::Malformed(_)));
    assert_eq!(rename.calls(), 1);
    assert!(h.cache.is_empty());
    assert!(h.dumps.0.lock().unwrap().is_empty());
}

#[test]
fn late_registration_is_rejected() {
    let mut registry = Registry::new();
    registry.register_normal(Rename::new()).unwrap();
    registry.freeze();

    let err = registry.register_normal(Rename::new()).unwrap_err();
    assert!(err.is_contract_violation());
    assert_eq!(registry.normal_passes().len(), 1);
}
