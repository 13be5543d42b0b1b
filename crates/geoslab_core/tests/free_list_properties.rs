//! Integration tests for the range free-list contract.

use geoslab_core::{AllocError, FreeList, SlotSpan};

fn free_spans(list: &FreeList) -> Vec<SlotSpan> {
    list.slots().filter(|s| !s.used).collect()
}

#[test]
fn scenario_two_allocations_fill_the_list() {
    let mut list = FreeList::new(100).unwrap();

    let first = list.alloc(30).unwrap();
    assert_eq!((first.start(), first.count()), (0, 30));
    assert_eq!(
        free_spans(&list),
        vec![SlotSpan { start: 30, count: 70, used: false }]
    );

    let second = list.alloc(70).unwrap();
    assert_eq!((second.start(), second.count()), (30, 70));

    let used: Vec<SlotSpan> = list.slots().filter(|s| s.used).collect();
    assert_eq!(used.len(), 2);
    assert_eq!(used.iter().map(|s| s.count).sum::<u32>(), 100);
    assert!(free_spans(&list).is_empty());
}

#[test]
fn exhausted_list_reports_largest_free() {
    let mut list = FreeList::new(16).unwrap();
    let _keep = list.alloc(10).unwrap();

    match list.alloc(7) {
        Err(AllocError::OutOfMemory { requested, largest_free }) => {
            assert_eq!(requested, 7);
            assert_eq!(largest_free, 6);
        }
        other => panic!("expected OutOfMemory, got {other:?}"),
    }

    assert!(list.alloc(6).is_ok());
    assert_eq!(list.largest_free(), 0);
}

#[test]
fn freed_hole_is_reused_before_tail() {
    let mut list = FreeList::new(64).unwrap();
    let a = list.alloc(8).unwrap();
    let b = list.alloc(8).unwrap();
    let _c = list.alloc(8).unwrap();

    list.free(b).unwrap();
    let d = list.alloc(4).unwrap();
    assert_eq!(d.start(), 8);

    list.free(a).unwrap();
    // [0,8) free, [8,12) used, [12,16) free, [16,24) used, [24,64) free
    let spans: Vec<(u32, u32, bool)> = list.slots().map(|s| (s.start, s.count, s.used)).collect();
    assert_eq!(
        spans,
        vec![(0, 8, false), (8, 4, true), (12, 4, false), (16, 8, true), (24, 40, false)]
    );
}
