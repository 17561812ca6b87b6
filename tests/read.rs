use std::path::{Path, PathBuf};
use std::sync::Arc;

use h5lite::engine::ObjectType;
use h5lite::engine::memory::{MemoryDataset, MemoryGroup, MemorySpace};
use h5lite::{Container, Error, MemoryEngine, ObjectKind, ShapeClass};

fn data_dir() -> PathBuf {
    env_logger::try_init().ok();
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests").join("data")
}

fn open(name: &str) -> Container<MemoryEngine> {
    Container::open(MemoryEngine::new(), data_dir().join(name)).expect("fixture should open")
}

/// Only the file token is open and no string buffers are outstanding.
fn assert_released(container: &Container<MemoryEngine>) {
    assert_eq!(container.engine().open_tokens(), 1);
    assert_eq!(container.engine().outstanding_strings(), 0);
}

#[test]
fn test_round_trip_ints() {
    let container = open("basic.json");
    let data = container
        .read::<i32>("/g/ints")
        .expect("read ints")
        .expect("ints exist");
    assert_eq!(data.values(), &[1, 2, 3, 4, 5, 6]);
    assert_eq!(data.path(), "/g/ints");
    assert_eq!(data.change_time(), Some(1_700_000_100));
    assert_eq!(data.to_string(), "/g/ints");
    assert_released(&container);
}

#[test]
fn test_shape_classes() {
    let container = open("basic.json");

    let scalar = container.read::<i64>("/shapes/scalar").unwrap().unwrap();
    assert_eq!(scalar.values(), &[7]);

    let null = container.read::<u8>("/shapes/null").unwrap().unwrap();
    assert!(null.is_empty());

    let zero = container.read::<u16>("/shapes/zero_dim").unwrap().unwrap();
    assert!(zero.is_empty());

    let rank0 = container.read::<i32>("/shapes/rank0").unwrap().unwrap();
    assert!(rank0.is_empty());

    let shape = container.shape("/g/ints").unwrap().unwrap();
    assert_eq!(shape.class(), ShapeClass::Simple);
    assert_eq!(shape.extents(), &[3, 2]);
    assert_eq!(shape.element_count(), 6);

    let shape = container.shape("/shapes/zero_dim").unwrap().unwrap();
    assert_eq!(shape.rank(), 3);
    assert_eq!(shape.element_count(), 0);

    // A simple dataspace reporting rank 0 is sized as one empty dimension.
    let shape = container.shape("/shapes/rank0").unwrap().unwrap();
    assert_eq!(shape.class(), ShapeClass::Simple);
    assert_eq!(shape.rank(), 1);
    assert_eq!(shape.extents(), &[0]);
    assert_eq!(shape.element_count(), 0);

    let shape = container.shape("/shapes/scalar").unwrap().unwrap();
    assert_eq!(shape.class(), ShapeClass::Scalar);
    assert_eq!(shape.rank(), 0);
    assert_eq!(shape.element_count(), 1);

    assert_eq!(container.shape("/shapes/missing").unwrap(), None);
    assert_released(&container);
}

#[test]
fn test_unsupported_shape() {
    let container = open("basic.json");
    assert!(matches!(
        container.read::<u8>("/shapes/odd"),
        Err(Error::UnsupportedShape { ref path, class: 7 }) if path == "/shapes/odd"
    ));
    assert!(matches!(
        container.shape("/shapes/odd"),
        Err(Error::UnsupportedShape { class: 7, .. })
    ));
    assert_released(&container);
}

#[test]
fn test_overflowing_shape() {
    let extents = vec![u64::MAX, 2];
    let root = MemoryGroup::new().with(
        "huge",
        MemoryDataset::new(MemorySpace::Simple { dims: extents.clone() }, Vec::<u8>::new()),
    );
    let engine = Arc::new(MemoryEngine::new().with_container("huge.h5", root));
    let container = Container::open(Arc::clone(&engine), "huge.h5").unwrap();
    assert!(matches!(
        container.shape("/huge"),
        Err(Error::ShapeOverflow { ref path, extents: ref found }) if path == "/huge" && *found == extents
    ));
    assert!(matches!(
        container.read::<u8>("/huge"),
        Err(Error::ShapeOverflow { .. })
    ));
    assert_eq!(engine.open_tokens(), 1);
}

#[test]
fn test_missing_datasets_are_absent() {
    let container = open("basic.json");
    assert_eq!(container.read::<i32>("/g/nope").unwrap(), None);
    assert_eq!(container.read::<f64>("/nope/deeper").unwrap(), None);
    assert_eq!(container.read_text("/g/nope").unwrap(), None);
    assert_eq!(container.read_text_data("/nope").unwrap(), None);
    assert_eq!(container.metadata("/g/nope").unwrap(), None);
    // A group is not a dataset.
    assert_eq!(container.read::<i32>("/g").unwrap(), None);
    assert_released(&container);
}

#[test]
fn test_element_type_mismatch() {
    let container = open("basic.json");
    // Same width: the bytes are reinterpreted, not rejected.
    let floats = container.read::<f32>("/g/ints").unwrap().unwrap();
    assert_eq!(floats.len(), 6);
    assert_eq!(floats.values()[0].to_bits(), 1);

    // Different width: the transfer is refused and everything is released.
    assert!(matches!(
        container.read::<i64>("/g/ints"),
        Err(Error::TransferSize {
            expected: 24,
            actual: 48
        })
    ));
    assert!(matches!(
        container.read::<u8>("/g/label"),
        Err(Error::TransferSize { .. })
    ));
    assert_released(&container);
}

#[test]
fn test_text() {
    let container = open("basic.json");
    assert_eq!(container.read_text("/g/label").unwrap().as_deref(), Some("hello"));
    assert_eq!(container.read_text("/text/ascii").unwrap().as_deref(), Some("plain"));
    assert_eq!(container.read_text("/text/fixed").unwrap().as_deref(), Some("abc"));
    assert_eq!(container.read_text("/text/padded").unwrap().as_deref(), Some("hi"));

    let label = container.read_text_data("/g/label").unwrap().unwrap();
    assert_eq!(label.value().chars().count(), 5);
    assert_eq!(label.change_time(), None);

    let empty = container.read_text_data("/text/empty").unwrap().unwrap();
    assert_eq!(empty.value(), "");
    assert_eq!(empty.change_time(), Some(1_600_000_000));
    assert_released(&container);
}

#[test]
fn test_text_errors() {
    let container = open("basic.json");
    assert!(matches!(
        container.read_text("/text/latin1"),
        Err(Error::UnsupportedEncoding { charset: 2, .. })
    ));
    assert!(matches!(
        container.read_text("/text/many"),
        Err(Error::TextNotScalar { elements: 2, .. })
    ));
    assert!(matches!(
        container.read_text("/g/ints"),
        Err(Error::NotText { ref path }) if path == "/g/ints"
    ));
    assert_released(&container);
}

#[test]
fn test_list_children() {
    let container = open("basic.json");
    let children = container.children("/g").unwrap();
    let listed: Vec<_> = children
        .iter()
        .map(|child| (child.name().to_owned(), child.kind()))
        .collect();
    assert_eq!(
        listed,
        [
            ("child_group".to_owned(), ObjectKind::Group),
            ("child_ds".to_owned(), ObjectKind::Dataset),
            ("ints".to_owned(), ObjectKind::Dataset),
            ("label".to_owned(), ObjectKind::Dataset),
        ]
    );
    assert_eq!(children[1].path(), "/g/child_ds");
    assert_eq!(children[0].to_string(), "child_group · GROUP");
    assert_eq!(children[1].to_string(), "child_ds · DATASET");
    assert!(children[0].is_group());
    assert!(children[2].is_dataset());

    let again: Vec<_> = container
        .children("/g")
        .unwrap()
        .iter()
        .map(|child| (child.name().to_owned(), child.kind()))
        .collect();
    assert_eq!(listed, again);

    let root: Vec<_> = container
        .children("/")
        .unwrap()
        .iter()
        .map(|child| child.path().to_owned())
        .collect();
    assert_eq!(root, ["/g", "/shapes", "/text"]);
    assert_released(&container);
}

#[test]
fn test_listing_keeps_stored_order() {
    let root = MemoryGroup::new().with(
        "g",
        MemoryGroup::new()
            .with("child_group", MemoryGroup::new())
            .with("child_ds", MemoryDataset::vector(vec![1u8, 2])),
    );
    let container = Container::open(MemoryEngine::new().with_container("order.h5", root), "order.h5").unwrap();
    let listed: Vec<_> = container
        .children("/g")
        .unwrap()
        .iter()
        .map(|child| (child.name().to_owned(), child.kind()))
        .collect();
    assert_eq!(
        listed,
        [
            ("child_group".to_owned(), ObjectKind::Group),
            ("child_ds".to_owned(), ObjectKind::Dataset),
        ]
    );
}

#[test]
fn test_children_navigation() {
    let container = open("basic.json");
    let children = container.children("/g").unwrap();
    let group = children
        .iter()
        .find(|child| child.name() == "child_group")
        .unwrap();
    let nested = group.children().unwrap();
    assert_eq!(nested.len(), 1);
    assert_eq!(nested[0].path(), "/g/child_group/leaf");
    assert_eq!(nested[0].read::<f64>().unwrap().unwrap().values(), &[2.5]);

    let label = children.iter().find(|child| child.name() == "label").unwrap();
    assert_eq!(label.read_text().unwrap().as_deref(), Some("hello"));
    assert!(std::ptr::eq(label.container(), &container));
}

#[test]
fn test_group_not_found() {
    let container = open("basic.json");
    assert!(matches!(
        container.children("/missing"),
        Err(Error::GroupNotFound { ref path }) if path == "/missing"
    ));
    assert!(matches!(
        container.children("/g/ints"),
        Err(Error::GroupNotFound { .. })
    ));
}

#[test]
fn test_walk() {
    let container = open("basic.json");
    let nodes = container.walk("/").unwrap();
    assert_eq!(nodes.len(), 19);
    assert_eq!(
        nodes[..4],
        [
            ("/g".to_owned(), ObjectKind::Group),
            ("/g/child_group".to_owned(), ObjectKind::Group),
            ("/g/child_group/leaf".to_owned(), ObjectKind::Dataset),
            ("/g/child_ds".to_owned(), ObjectKind::Dataset),
        ]
    );
    assert_eq!(nodes.last().unwrap().0, "/text/empty");
    assert_released(&container);
}

#[test]
fn test_metadata() {
    let container = open("basic.json");
    let meta = container.metadata("/g").unwrap().unwrap();
    assert_eq!(meta.kind, ObjectKind::Group);
    assert_eq!(meta.change_time(), Some(1_700_000_000));

    let meta = container.metadata("/g/label").unwrap().unwrap();
    assert_eq!(meta.kind, ObjectKind::Dataset);
    assert_eq!(meta.ctime, 0);
    assert_eq!(meta.change_time(), None);
}

#[test]
fn test_unknown_object_kinds() {
    let container = open("kinds.json");
    assert!(matches!(
        container.children("/"),
        Err(Error::UnknownObjectKind {
            ref path,
            object_type: ObjectType::NamedDatatype
        }) if path == "/dtype"
    ));
    assert!(matches!(
        container.metadata("/mystery"),
        Err(Error::UnknownObjectKind {
            object_type: ObjectType::Unknown(5),
            ..
        })
    ));
    let plain = container.metadata("/plain").unwrap().unwrap();
    assert_eq!(plain.kind, ObjectKind::Group);
    assert_eq!(plain.change_time(), Some(9));
    assert_eq!(container.children("/plain").unwrap().len(), 0);
}

#[test]
fn test_close_twice() {
    let engine = Arc::new(MemoryEngine::new());
    let mut container = Container::open(Arc::clone(&engine), data_dir().join("basic.json")).unwrap();
    assert!(engine.errors_silenced());
    let data = container.read::<i32>("/g/ints").unwrap().unwrap();
    let text = container.read_text("/g/label").unwrap().unwrap();

    container.close().unwrap();
    container.close().unwrap();
    assert!(!container.is_open());
    assert_eq!(engine.open_tokens(), 0);
    assert_eq!(data.values(), &[1, 2, 3, 4, 5, 6]);
    assert_eq!(text, "hello");
    assert!(matches!(
        container.read::<i32>("/g/ints"),
        Err(Error::NotOpen { ref name }) if name == "basic.json"
    ));
    assert_eq!(container.to_string(), "basic.json | NULL");
    drop(container);
    assert_eq!(engine.open_tokens(), 0);
}

#[test]
fn test_drop_releases_everything() {
    let engine = Arc::new(MemoryEngine::new());
    {
        let container = Container::open(Arc::clone(&engine), data_dir().join("basic.json")).unwrap();
        container.walk("/").unwrap();
        container.read_text("/text/latin1").unwrap_err();
        assert_eq!(engine.open_tokens(), 1);
    }
    assert_eq!(engine.open_tokens(), 0);
    assert_eq!(engine.outstanding_strings(), 0);
}

#[test]
fn test_failed_open() {
    let missing = data_dir().join("missing.json");
    assert!(matches!(
        Container::open(MemoryEngine::new(), &missing),
        Err(Error::OpenFailed { ref path }) if *path == missing
    ));

    let container = Container::open_lenient(MemoryEngine::new(), &missing).unwrap();
    assert!(!container.is_open());
    assert_eq!(container.id(), None);
    assert_eq!(container.to_string(), "missing.json | NULL");
    assert!(matches!(
        container.children("/"),
        Err(Error::NotOpen { .. })
    ));
    assert!(matches!(
        container.read_text("/g/label"),
        Err(Error::NotOpen { .. })
    ));

    // A manifest that fails validation cannot be opened either.
    assert!(matches!(
        Container::open(MemoryEngine::new(), data_dir().join("mismatched.json")),
        Err(Error::OpenFailed { .. })
    ));
    assert!(matches!(
        MemoryEngine::load_manifest(data_dir().join("mismatched.json")),
        Err(Error::General(_))
    ));
    assert!(matches!(
        MemoryEngine::load_manifest(&missing),
        Err(Error::Io(_))
    ));
}

#[test]
fn test_registered_container() {
    let root = MemoryGroup::new().with(
        "run",
        MemoryGroup::new()
            .with("samples", MemoryDataset::vector(vec![0.25f64, 0.5, 0.75]).with_ctime(11))
            .with(
                "grid",
                MemoryDataset::new(MemorySpace::Simple { dims: vec![2, 2] }, vec![1u16, 2, 3, 4]),
            )
            .with("name", MemoryDataset::text("trial")),
    );
    let engine = MemoryEngine::new().with_container("virtual.h5", root);
    let container = Container::open(engine, "virtual.h5").unwrap();
    assert_eq!(container.name(), "virtual.h5");
    assert_eq!(container.to_string(), format!("virtual.h5 | {}", container.id().unwrap()));

    let samples = container.read::<f64>("/run/samples").unwrap().unwrap();
    assert_eq!(samples.values(), &[0.25, 0.5, 0.75]);
    assert_eq!(samples.change_time(), Some(11));
    assert_eq!(
        container.read::<u16>("/run/grid").unwrap().unwrap().into_values(),
        vec![1, 2, 3, 4]
    );
    assert_eq!(container.read_text("/run/name").unwrap().as_deref(), Some("trial"));
}

#[test]
fn test_serialize_results() {
    let container = open("basic.json");
    let data = container.read::<i32>("/g/ints").unwrap().unwrap();
    assert_eq!(
        serde_json::to_value(&data).unwrap(),
        serde_json::json!({
            "path": "/g/ints",
            "change_time": 1_700_000_100,
            "values": [1, 2, 3, 4, 5, 6],
        })
    );
    let text = container.read_text_data("/g/label").unwrap().unwrap();
    assert_eq!(
        serde_json::to_value(&text).unwrap(),
        serde_json::json!({ "path": "/g/label", "change_time": null, "value": "hello" })
    );
    assert_eq!(
        serde_json::to_value(ObjectKind::Group).unwrap(),
        serde_json::json!("group")
    );
}
