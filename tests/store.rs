use esm4_store::esm4::store::{Insertion, RecordStore};
use esm4_store::esm4::types::formid::FormIdMap;
use esm4_store::esm4::types::models::RecordFlags;
use esm4_store::{BaseObject, Esm4Error, FormId, RecordType};

fn object(id: u32, editor_id: &str, model: &str) -> BaseObject {
    BaseObject {
        form_id: FormId(id),
        editor_id: editor_id.to_string(),
        flags: RecordFlags(0),
        record_type: RecordType::Stat,
        full_name: None,
        model: Some(model.to_string()),
        sub_records: Vec::new(),
    }
}

fn deleted(id: u32) -> BaseObject {
    let mut record = object(id, "", "");
    record.flags = RecordFlags(RecordFlags::DELETED);
    record
}

fn ids(store: &RecordStore<BaseObject>) -> Vec<u32> {
    store.list_identifiers().iter().map(|id| id.0).collect()
}

#[test]
fn later_file_insert_replaces_in_place() {
    let mut store = RecordStore::new();
    assert_eq!(store.insert_from_file(object(1, "Rock", "a.nif")), Insertion::Added);
    assert_eq!(store.insert_from_file(object(2, "Tree", "b.nif")), Insertion::Added);
    assert_eq!(store.insert_from_file(object(1, "RockPatched", "c.nif")), Insertion::Replaced);

    let rock = store.get(FormId(1)).unwrap();
    assert_eq!(rock.editor_id, "RockPatched");
    assert_eq!(rock.model.as_deref(), Some("c.nif"));
    assert_eq!(ids(&store), vec![1, 2], "position of the first insertion is kept");
    assert_eq!(store.len(), 2);
}

#[test]
fn deleted_record_removes_instead_of_storing_a_tombstone() {
    let mut store = RecordStore::new();
    store.insert_from_file(object(1, "Rock", "a.nif"));
    store.insert_from_file(object(2, "Tree", "b.nif"));

    assert_eq!(store.insert_from_file(deleted(1)), Insertion::Removed);
    assert!(store.try_get(FormId(1)).is_none());
    assert!(!store.contains(FormId(1)));
    assert_eq!(ids(&store), vec![2]);
    assert_eq!(store.static_len(), 1);

    assert_eq!(store.insert_from_file(deleted(9)), Insertion::IgnoredDeletion);
    assert_eq!(ids(&store), vec![2]);
}

#[test]
fn deleted_flag_is_detected() {
    assert!(RecordStore::is_record_deleted(&deleted(1)));
    assert!(!RecordStore::is_record_deleted(&object(1, "Rock", "a.nif")));
}

#[test]
fn get_of_missing_record_is_an_error_and_try_get_is_not() {
    let store: RecordStore<BaseObject> = RecordStore::new();
    assert!(store.try_get(FormId(7)).is_none());
    assert!(matches!(store.get(FormId(7)), Err(Esm4Error::RecordNotFound(FormId(7)))));
}

#[test]
fn runtime_layer_shadows_file_layer() {
    let mut store = RecordStore::new();
    store.insert_from_file(object(1, "Rock", "a.nif"));
    assert!(store.insert_runtime(object(1, "RockEdited", "edit.nif")).is_none());
    store.insert_runtime(object(0xFF00_0001, "Spawned", "s.nif"));

    assert_eq!(store.get(FormId(1)).unwrap().editor_id, "RockEdited");
    assert!(store.is_runtime(FormId(1)));
    assert_eq!(ids(&store), vec![1, 0xFF00_0001], "shadowing adds no second entry");

    let erased = store.erase_runtime(FormId(1)).unwrap();
    assert_eq!(erased.editor_id, "RockEdited");
    assert_eq!(store.get(FormId(1)).unwrap().editor_id, "Rock");
    assert_eq!(ids(&store), vec![1, 0xFF00_0001]);
}

#[test]
fn erase_runtime_rebuilds_the_dynamic_suffix() {
    let mut store = RecordStore::new();
    store.insert_from_file(object(1, "A", ""));
    store.insert_from_file(object(2, "B", ""));
    for seq in 1..=4 {
        store.insert_runtime(object(0xFF00_0000 | seq, "", ""));
    }
    assert_eq!(ids(&store), vec![1, 2, 0xFF00_0001, 0xFF00_0002, 0xFF00_0003, 0xFF00_0004]);

    store.erase_runtime(FormId(0xFF00_0002));
    assert_eq!(ids(&store), vec![1, 2, 0xFF00_0001, 0xFF00_0003, 0xFF00_0004]);

    store.erase_runtime(FormId(0xFF00_0004));
    store.insert_runtime(object(0xFF00_0002, "", ""));
    assert_eq!(ids(&store), vec![1, 2, 0xFF00_0001, 0xFF00_0003, 0xFF00_0002]);
    assert!(store.erase_runtime(FormId(0xFF00_0009)).is_none());
    assert_eq!(store.static_len(), 2);
}

#[test]
fn lookups_do_not_disturb_ordering() {
    let mut store = RecordStore::new();
    for id in [30, 10, 20] {
        store.insert_from_file(object(id, "", ""));
    }
    let before = ids(&store);
    for id in [10, 20, 30, 40] {
        let _ = store.try_get(FormId(id));
        let _ = store.get(FormId(id));
    }
    assert_eq!(ids(&store), before);
    assert_eq!(before, vec![30, 10, 20], "insertion order, not identifier order");
}

#[test]
fn update_rejects_identifier_changes() {
    let mut store = RecordStore::new();
    store.insert_from_file(object(1, "Rock", "a.nif"));

    store
        .update(FormId(1), |r| r.model = Some("b.nif".to_string()))
        .unwrap();
    assert_eq!(store.get(FormId(1)).unwrap().model.as_deref(), Some("b.nif"));

    let err = store.update(FormId(1), |r| r.form_id = FormId(2)).unwrap_err();
    assert!(matches!(
        err,
        Esm4Error::FormIdMutation {
            expected: FormId(1),
            found: FormId(2)
        }
    ));
    assert_eq!(store.get(FormId(1)).unwrap().model.as_deref(), Some("b.nif"));
    assert!(store.try_get(FormId(2)).is_none());

    assert!(matches!(
        store.update(FormId(5), |_| {}),
        Err(Esm4Error::RecordNotFound(FormId(5)))
    ));
}

#[test]
fn master_indices_are_substituted_on_adjustment() {
    // Masters [M1, M2] sit at global indices 2 and 5; the plugin itself at 6.
    let map = FormIdMap::new(vec![2, 5], 6);
    assert_eq!(map.adjust(0x0100_0ABC), FormId(0x0500_0ABC));
    assert_eq!(map.adjust(0x0000_0ABC), FormId(0x0200_0ABC));
    assert_eq!(map.adjust(0x0200_0ABC), FormId(0x0600_0ABC));
    assert_eq!(map.adjust(0x0700_0ABC), FormId(0x0600_0ABC));
    assert_eq!(map.adjust(0), FormId::NULL);
}

#[test]
fn form_ids_print_and_parse_as_eight_hex_digits() {
    let id = FormId(0x0001_2345);
    assert_eq!(id.to_string(), "00012345");
    assert_eq!("00012345".parse::<FormId>().unwrap(), id);
    assert_eq!("0x12345".parse::<FormId>().unwrap(), id);
    assert!("xyz".parse::<FormId>().is_err());
    assert!("123456789".parse::<FormId>().is_err());
    assert_eq!(id.file_index(), 0);
    assert_eq!(FormId(0x0500_0ABC).file_index(), 5);
    assert_eq!(FormId(0x0500_0ABC).sequence(), 0xABC);
}
